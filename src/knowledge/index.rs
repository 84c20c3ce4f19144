//! Knowledge base documents and loading.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// A single knowledge base record.
///
/// `text` is the field that gets embedded and is returned verbatim when the
/// pipeline answers from the knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeDocument {
    pub id: i64,
    pub text: String,
    pub keywords: Vec<String>,
    pub category: String,
}

impl KnowledgeDocument {
    /// True if any keyword appears as a case-insensitive substring of the
    /// (already lowercased) query.
    pub fn matches_query(&self, query_lower: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| query_lower.contains(&k.to_lowercase()))
    }
}

/// The loaded knowledge base. Immutable after load; loaded once per process.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBase {
    documents: Vec<KnowledgeDocument>,
}

impl KnowledgeBase {
    /// Load from a JSON file: an array of `{id, text, keywords, category}`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::KnowledgeBase {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let documents: Vec<KnowledgeDocument> =
            serde_json::from_str(&raw).map_err(|e| ConfigError::KnowledgeBase {
                path: path.display().to_string(),
                message: format!("invalid JSON: {e}"),
            })?;
        Self::from_documents(documents).map_err(|message| ConfigError::KnowledgeBase {
            path: path.display().to_string(),
            message,
        })
    }

    /// Build from in-memory documents, validating id uniqueness.
    ///
    /// Index position is identity for the embedding matrix, so duplicate ids
    /// are rejected up front rather than corrupting lookups later.
    pub fn from_documents(documents: Vec<KnowledgeDocument>) -> Result<Self, String> {
        let mut seen = std::collections::HashSet::new();
        for doc in &documents {
            if !seen.insert(doc.id) {
                return Err(format!("duplicate knowledge document id {}", doc.id));
            }
        }
        Ok(Self { documents })
    }

    pub fn documents(&self) -> &[KnowledgeDocument] {
        &self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// All document texts, in index order (embedding input).
    pub fn texts(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.text.clone()).collect()
    }
}
