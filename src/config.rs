//! Configuration types.

use std::time::Duration;

/// Service configuration, built from environment variables with defaults.
#[derive(Debug, Clone)]
pub struct TriageConfig {
    /// HTTP bind port.
    pub port: u16,
    /// Path to the SQLite database file.
    pub db_path: String,
    /// Path to the knowledge base JSON file.
    pub knowledge_base_path: String,
    /// Timeout for a single LLM call (decision or classification).
    pub llm_timeout: Duration,
    /// Timeout for a single embedding-backend call.
    pub embed_timeout: Duration,
}

impl TriageConfig {
    /// Build config from environment variables.
    pub fn from_env() -> Self {
        let port: u16 = std::env::var("TRIAGE_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(8000);

        let db_path = std::env::var("TRIAGE_DB_PATH")
            .unwrap_or_else(|_| "./data/support-triage.db".to_string());

        let knowledge_base_path = std::env::var("TRIAGE_KB_PATH")
            .unwrap_or_else(|_| "./data/knowledge_base.json".to_string());

        let llm_timeout_secs: u64 = std::env::var("TRIAGE_LLM_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(20);

        let embed_timeout_secs: u64 = std::env::var("TRIAGE_EMBED_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(10);

        Self {
            port,
            db_path,
            knowledge_base_path,
            llm_timeout: Duration::from_secs(llm_timeout_secs),
            embed_timeout: Duration::from_secs(embed_timeout_secs),
        }
    }
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            port: 8000,
            db_path: "./data/support-triage.db".to_string(),
            knowledge_base_path: "./data/knowledge_base.json".to_string(),
            llm_timeout: Duration::from_secs(20),
            embed_timeout: Duration::from_secs(10),
        }
    }
}
