//! Embedding provider trait, cosine similarity, and the local ONNX backend.

use async_trait::async_trait;

use crate::error::RetrievalError;

/// Trait for embedding backends.
///
/// Kept deliberately small: the retrieval engine only ever needs a single
/// query vector or one batch over the whole knowledge base.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError>;

    /// Embed a batch of texts, one vector per input, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError>;
}

/// Compute cosine similarity between two embedding vectors.
///
/// Returns a value in `[-1.0, 1.0]`; `0.0` for empty vectors, mismatched
/// lengths, or a zero-norm operand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Embedder that always reports unavailability.
///
/// Used when the crate is built without the `local-embeddings` feature; the
/// pipeline then runs in classification-only degraded mode.
pub struct UnavailableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnavailableEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, RetrievalError> {
        Err(RetrievalError::Unavailable(
            "no embedding backend compiled in".to_string(),
        ))
    }

    async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
        Err(RetrievalError::Unavailable(
            "no embedding backend compiled in".to_string(),
        ))
    }
}

#[cfg(feature = "local-embeddings")]
pub use fast_embedder::FastEmbedder;

#[cfg(feature = "local-embeddings")]
mod fast_embedder {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

    use super::EmbeddingProvider;
    use crate::error::RetrievalError;

    /// Local ONNX embedding backend (all-MiniLM-L6-v2 via fastembed).
    ///
    /// fastembed's `embed` needs exclusive access to the model, so the model
    /// sits behind a mutex and encoding runs on the blocking pool.
    pub struct FastEmbedder {
        model: Arc<Mutex<TextEmbedding>>,
        timeout: Duration,
    }

    impl FastEmbedder {
        /// Load the model. Downloads it on first use, so this can take a while
        /// on a cold cache.
        pub fn new(timeout: Duration) -> Result<Self, RetrievalError> {
            let options = InitOptions::new(EmbeddingModel::AllMiniLML6V2)
                .with_show_download_progress(false);
            let model = TextEmbedding::try_new(options)
                .map_err(|e| RetrievalError::Unavailable(format!("model load failed: {e}")))?;
            tracing::info!("Embedding model loaded (all-MiniLM-L6-v2)");
            Ok(Self {
                model: Arc::new(Mutex::new(model)),
                timeout,
            })
        }

        async fn run_embed(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, RetrievalError> {
            let model = Arc::clone(&self.model);
            let task = tokio::task::spawn_blocking(move || {
                let mut guard = model
                    .lock()
                    .map_err(|_| RetrievalError::Unavailable("model mutex poisoned".into()))?;
                guard
                    .embed(texts, None)
                    .map_err(|e| RetrievalError::Unavailable(format!("encode failed: {e}")))
            });

            match tokio::time::timeout(self.timeout, task).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => Err(RetrievalError::Unavailable(format!(
                    "encode task panicked: {join_err}"
                ))),
                Err(_) => Err(RetrievalError::Unavailable(format!(
                    "encode timed out after {:?}",
                    self.timeout
                ))),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FastEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>, RetrievalError> {
            let mut vectors = self.run_embed(vec![text.to_string()]).await?;
            vectors.pop().ok_or_else(|| {
                RetrievalError::Unavailable("backend returned no vector".to_string())
            })
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RetrievalError> {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            self.run_embed(texts.to_vec()).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_opposite_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert!((cosine_similarity(&a, &b) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[tokio::test]
    async fn unavailable_embedder_reports_unavailability() {
        let embedder = UnavailableEmbedder;
        assert!(matches!(
            embedder.embed("hello").await,
            Err(crate::error::RetrievalError::Unavailable(_))
        ));
        assert!(matches!(
            embedder.embed_batch(&["hello".to_string()]).await,
            Err(crate::error::RetrievalError::Unavailable(_))
        ));
    }
}
