//! Hybrid retrieval — embedding similarity plus keyword boosting.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::RetrievalError;
use crate::knowledge::embedding::{EmbeddingProvider, cosine_similarity};
use crate::knowledge::index::{KnowledgeBase, KnowledgeDocument};

/// Additive score boost applied when any of a document's keywords appears in
/// the query. Document-local; never affects other documents' scores.
pub const KEYWORD_BOOST: f32 = 0.15;

/// A retrieval result: the best-matching document and its boosted score.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub document: KnowledgeDocument,
    pub score: f32,
}

/// Search seam for the decision engine.
///
/// The production implementation is [`RetrievalEngine`]; tests substitute
/// stubs to drive exact scores through the decision logic.
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    async fn search(
        &self,
        query: &str,
        threshold: f32,
    ) -> Result<Option<SearchHit>, RetrievalError>;
}

/// Hybrid search over the knowledge base.
///
/// The embedding matrix is built lazily on first search and exactly once:
/// concurrent first callers are collapsed by the `OnceCell` so the build
/// never runs twice.
pub struct RetrievalEngine {
    kb: KnowledgeBase,
    embedder: Arc<dyn EmbeddingProvider>,
    index: OnceCell<Vec<Vec<f32>>>,
}

impl RetrievalEngine {
    pub fn new(kb: KnowledgeBase, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            kb,
            embedder,
            index: OnceCell::new(),
        }
    }

    /// Embedding matrix, one row per document, built on first use.
    async fn index(&self) -> Result<&Vec<Vec<f32>>, RetrievalError> {
        self.index
            .get_or_try_init(|| async {
                let texts = self.kb.texts();
                let vectors = self.embedder.embed_batch(&texts).await?;
                if vectors.len() != texts.len() {
                    return Err(RetrievalError::IndexBuild(format!(
                        "embedded {} of {} documents",
                        vectors.len(),
                        texts.len()
                    )));
                }
                tracing::info!(documents = texts.len(), "Knowledge index built");
                Ok(vectors)
            })
            .await
    }
}

#[async_trait]
impl KnowledgeRetriever for RetrievalEngine {
    async fn search(
        &self,
        query: &str,
        threshold: f32,
    ) -> Result<Option<SearchHit>, RetrievalError> {
        if self.kb.is_empty() {
            return Ok(None);
        }

        let index = self.index().await?;
        let query_vec = self.embedder.embed(query).await?;
        let query_lower = query.to_lowercase();

        // Stable argmax over boosted scores: strict > keeps the first
        // document on ties.
        let mut best: Option<(usize, f32)> = None;
        for (idx, (doc, doc_vec)) in self.kb.documents().iter().zip(index.iter()).enumerate() {
            let mut score = cosine_similarity(&query_vec, doc_vec);
            if doc.matches_query(&query_lower) {
                score += KEYWORD_BOOST;
            }
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((idx, score)),
            }
        }

        let (best_idx, best_score) = match best {
            Some(b) => b,
            None => return Ok(None),
        };

        debug!(
            query = query,
            doc_id = self.kb.documents()[best_idx].id,
            score = best_score,
            "Hybrid search best match"
        );

        // A score of zero means no similarity and no keyword overlap — never
        // a match, whatever the threshold.
        if best_score >= threshold && best_score > 0.0 {
            Ok(Some(SearchHit {
                document: self.kb.documents()[best_idx].clone(),
                score: best_score,
            }))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::knowledge::embedding::UnavailableEmbedder;
    use crate::knowledge::index::KnowledgeDocument;

    /// Maps exact texts to fixed vectors; unknown text embeds to the zero
    /// vector (cosine 0 against everything).
    struct StaticEmbedder {
        entries: Vec<(String, Vec<f32>)>,
        batch_calls: AtomicUsize,
    }

    impl StaticEmbedder {
        fn new(entries: &[(&str, &[f32])]) -> Self {
            Self {
                entries: entries
                    .iter()
                    .map(|(t, v)| (t.to_string(), v.to_vec()))
                    .collect(),
                batch_calls: AtomicUsize::new(0),
            }
        }

        fn lookup(&self, text: &str) -> Vec<f32> {
            self.entries
                .iter()
                .find(|(t, _)| t == text)
                .map(|(_, v)| v.clone())
                .unwrap_or_else(|| vec![0.0, 0.0])
        }
    }

    #[async_trait]
    impl EmbeddingProvider for StaticEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
            Ok(self.lookup(text))
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
            self.batch_calls.fetch_add(1, Ordering::SeqCst);
            Ok(texts.iter().map(|t| self.lookup(t)).collect())
        }
    }

    fn doc(id: i64, text: &str, keywords: &[&str]) -> KnowledgeDocument {
        KnowledgeDocument {
            id,
            text: text.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            category: "test".into(),
        }
    }

    fn engine(docs: Vec<KnowledgeDocument>, embedder: StaticEmbedder) -> RetrievalEngine {
        RetrievalEngine::new(
            KnowledgeBase::from_documents(docs).unwrap(),
            Arc::new(embedder),
        )
    }

    #[tokio::test]
    async fn empty_kb_returns_nothing() {
        let engine = engine(vec![], StaticEmbedder::new(&[]));
        let hit = engine.search("anything", 0.0).await.unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn similarity_match_above_threshold() {
        let embedder = StaticEmbedder::new(&[
            ("password reset steps", &[1.0, 0.0]),
            ("how do I reset things", &[1.0, 0.0]),
        ]);
        let engine = engine(vec![doc(1, "password reset steps", &[])], embedder);

        let hit = engine
            .search("how do I reset things", 0.5)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(hit.document.id, 1);
        assert!((hit.score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn keyword_boost_never_decreases_score() {
        // Same similarity either way; the keyword variant must score exactly
        // KEYWORD_BOOST higher and only for the matching document.
        let embedder = StaticEmbedder::new(&[
            ("doc one", &[1.0, 0.0]),
            ("doc two", &[0.0, 1.0]),
            ("plain query", &[1.0, 0.0]),
            ("password query", &[1.0, 0.0]),
        ]);
        let engine = engine(
            vec![doc(1, "doc one", &["password"]), doc(2, "doc two", &[])],
            embedder,
        );

        let plain = engine.search("plain query", 0.1).await.unwrap().unwrap();
        let boosted = engine.search("password query", 0.1).await.unwrap().unwrap();

        assert_eq!(plain.document.id, 1);
        assert_eq!(boosted.document.id, 1);
        assert!((boosted.score - plain.score - KEYWORD_BOOST).abs() < 1e-5);
    }

    #[tokio::test]
    async fn zero_signal_query_never_matches() {
        let embedder = StaticEmbedder::new(&[("some doc", &[1.0, 0.0])]);
        let engine = engine(vec![doc(1, "some doc", &["specific"])], embedder);

        // Unknown query embeds to the zero vector and shares no keywords.
        for threshold in [0.0, 0.2, 0.5, 1.0] {
            let hit = engine.search("unrelated", threshold).await.unwrap();
            assert!(hit.is_none(), "threshold {threshold} must not match");
        }
    }

    #[tokio::test]
    async fn ties_resolve_to_first_document() {
        let embedder = StaticEmbedder::new(&[
            ("alpha", &[1.0, 0.0]),
            ("beta", &[1.0, 0.0]),
            ("query", &[1.0, 0.0]),
        ]);
        let engine = engine(vec![doc(10, "alpha", &[]), doc(20, "beta", &[])], embedder);

        let hit = engine.search("query", 0.5).await.unwrap().unwrap();
        assert_eq!(hit.document.id, 10);
    }

    #[tokio::test]
    async fn below_threshold_returns_nothing() {
        let embedder = StaticEmbedder::new(&[
            ("target", &[1.0, 0.0]),
            ("query", &[0.0, 1.0]), // orthogonal: similarity 0
        ]);
        let engine = engine(vec![doc(1, "target", &["tgt"])], embedder);
        let hit = engine.search("query", 0.2).await.unwrap();
        assert!(hit.is_none());
    }

    #[tokio::test]
    async fn index_built_exactly_once() {
        let embedder = Arc::new(StaticEmbedder::new(&[
            ("a", &[1.0, 0.0]),
            ("q", &[1.0, 0.0]),
        ]));
        let engine = RetrievalEngine::new(
            KnowledgeBase::from_documents(vec![doc(1, "a", &[])]).unwrap(),
            Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
        );

        engine.search("q", 0.5).await.unwrap();
        engine.search("q", 0.5).await.unwrap();

        // Two searches, one index build.
        assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unavailable_backend_surfaces_error() {
        let engine = RetrievalEngine::new(
            KnowledgeBase::from_documents(vec![doc(1, "a", &[])]).unwrap(),
            Arc::new(UnavailableEmbedder),
        );
        let result = engine.search("q", 0.2).await;
        assert!(matches!(result, Err(RetrievalError::Unavailable(_))));
    }
}
