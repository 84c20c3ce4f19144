use std::sync::Arc;

use support_triage::assignment::AssignmentEngine;
use support_triage::config::TriageConfig;
use support_triage::knowledge::{
    EmbeddingProvider, KnowledgeBase, KnowledgeRetriever, RetrievalEngine, UnavailableEmbedder,
};
use support_triage::llm::{LlmBackend, LlmConfig, create_provider};
use support_triage::notify::{MailerConfig, Notifier};
use support_triage::server::routes;
use support_triage::store::{Database, LibSqlBackend, seed_employees};
use support_triage::triage::{ClassificationEngine, DecisionEngine, TriageService};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider before any TLS usage
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = TriageConfig::from_env();

    // ── LLM provider ────────────────────────────────────────────────────
    let backend = match std::env::var("TRIAGE_LLM_BACKEND").as_deref() {
        Ok("openai") => LlmBackend::OpenAi,
        _ => LlmBackend::Anthropic,
    };
    let key_var = match backend {
        LlmBackend::Anthropic => "ANTHROPIC_API_KEY",
        LlmBackend::OpenAi => "OPENAI_API_KEY",
    };
    let api_key = std::env::var(key_var).unwrap_or_else(|_| {
        eprintln!("Error: {key_var} not set");
        std::process::exit(1);
    });
    let model = std::env::var("TRIAGE_MODEL")
        .unwrap_or_else(|_| "claude-sonnet-4-20250514".to_string());

    let llm = create_provider(&LlmConfig {
        backend,
        api_key: secrecy::SecretString::from(api_key),
        model,
    })?;

    // ── Database ────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(std::path::Path::new(&config.db_path))
            .await
            .unwrap_or_else(|e| {
                eprintln!("Error: Failed to open database at {}: {}", config.db_path, e);
                std::process::exit(1);
            }),
    );
    let seeded = seed_employees(db.as_ref()).await?;
    if seeded > 0 {
        eprintln!("   Seeded {seeded} employees");
    }

    // ── Knowledge base + retrieval ──────────────────────────────────────
    let kb_path = std::path::Path::new(&config.knowledge_base_path);
    let kb = match KnowledgeBase::load(kb_path) {
        Ok(kb) => {
            eprintln!("   Knowledge base: {} documents", kb.len());
            kb
        }
        Err(e) => {
            tracing::warn!(error = %e, "Knowledge base unavailable, starting with empty KB");
            KnowledgeBase::default()
        }
    };

    let embedder: Arc<dyn EmbeddingProvider> = build_embedder(&config);
    let retriever: Arc<dyn KnowledgeRetriever> = Arc::new(RetrievalEngine::new(kb, embedder));

    // ── Notifications ───────────────────────────────────────────────────
    let notifier = MailerConfig::from_env().map(|cfg| {
        eprintln!("   Notifications: enabled (SMTP: {})", cfg.smtp_host);
        Arc::new(Notifier::new(cfg))
    });
    if notifier.is_none() {
        eprintln!("   Notifications: disabled (EMAIL_SMTP_HOST not set)");
    }

    // ── Pipeline ────────────────────────────────────────────────────────
    let service = Arc::new(TriageService::new(
        Arc::clone(&db),
        DecisionEngine::new(llm.clone(), retriever, config.llm_timeout),
        ClassificationEngine::new(llm, config.llm_timeout),
        AssignmentEngine::new(),
        notifier,
    ));

    let app = routes(service);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port)).await?;
    eprintln!("🎧 support-triage v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Chat API: http://0.0.0.0:{}/api/chat", config.port);
    eprintln!("   Issues:   http://0.0.0.0:{}/api/issues", config.port);
    tracing::info!(port = config.port, "Server started");
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(feature = "local-embeddings")]
fn build_embedder(config: &TriageConfig) -> Arc<dyn EmbeddingProvider> {
    use support_triage::knowledge::FastEmbedder;

    match FastEmbedder::new(config.embed_timeout) {
        Ok(embedder) => Arc::new(embedder),
        Err(e) => {
            tracing::warn!(error = %e, "Embedding backend failed to load; retrieval disabled");
            Arc::new(UnavailableEmbedder)
        }
    }
}

#[cfg(not(feature = "local-embeddings"))]
fn build_embedder(_config: &TriageConfig) -> Arc<dyn EmbeddingProvider> {
    tracing::warn!("Built without local-embeddings; retrieval disabled");
    Arc::new(UnavailableEmbedder)
}
