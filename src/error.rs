//! Error types for the triage service.

use std::time::Duration;

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Retrieval error: {0}")]
    Retrieval(#[from] RetrievalError),

    #[error("Classifier error: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Notification error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to load knowledge base from {path}: {message}")]
    KnowledgeBase { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Database-related errors.
///
/// A failure to read or append the session log maps onto `Query` /
/// `Constraint` here; the chat pipeline treats those as fatal for the
/// request — turn ordering is a hard invariant.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: String, id: String },

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Knowledge-retrieval errors.
#[derive(Debug, thiserror::Error)]
pub enum RetrievalError {
    /// The embedding backend failed to load or to encode. Callers degrade to
    /// classification-only behavior rather than treating this as fatal.
    #[error("Embedding backend unavailable: {0}")]
    Unavailable(String),

    #[error("Failed to build the embedding index: {0}")]
    IndexBuild(String),
}

/// Classification errors — the external classifier failed or returned a
/// payload that does not conform to the report schema. Always recoverable via
/// the rule-based fallback.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Classifier call failed: {0}")]
    Service(#[from] LlmError),

    #[error("Classifier returned a schema-invalid payload: {0}")]
    InvalidPayload(String),
}

/// Notification delivery errors. Delivery is best-effort; these are logged
/// and never surface to the chat request.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to build notification email: {0}")]
    Build(String),

    #[error("SMTP send failed: {0}")]
    Send(String),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
