//! HTTP surface — chat endpoint, issue listing, health.

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

use crate::triage::TriageService;
use crate::triage::types::{ClassificationReport, Department, Priority};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TriageService>,
}

/// Build the Axum router.
///
/// CORS is wide open, matching the original deployment behind a separate
/// frontend origin.
pub fn routes(service: Arc<TriageService>) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(chat))
        .route("/api/issues", get(list_issues))
        .route("/api/issues/{id}", get(get_issue))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "support-triage"
    }))
}

// ── Chat ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub session_id: String,
}

/// Escalation report as exposed on the wire.
#[derive(Debug, Serialize)]
pub struct ReportBody {
    pub summary: String,
    pub department: Department,
    pub priority: Priority,
    pub extracted_info: Vec<String>,
}

impl From<&ClassificationReport> for ReportBody {
    fn from(report: &ClassificationReport) -> Self {
        Self {
            summary: report.summary.clone(),
            department: report.department,
            priority: report.priority,
            extracted_info: report.technical_details.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub action: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReportBody>,
}

async fn chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequest>,
) -> impl IntoResponse {
    if body.message.trim().is_empty() || body.session_id.trim().is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({"error": "message and session_id are required"})),
        )
            .into_response();
    }

    info!(session_id = %body.session_id, "Chat message received");

    match state
        .service
        .handle_message(&body.session_id, &body.message)
        .await
    {
        Ok(outcome) => {
            let response = ChatResponse {
                action: outcome.action.as_str().to_string(),
                text: outcome.text.clone(),
                report: outcome.report.as_ref().map(ReportBody::from),
            };
            (StatusCode::OK, Json(serde_json::json!(response))).into_response()
        }
        Err(e) => {
            // Session-history and issue-store failures land here; details go
            // to the log, never to the customer.
            error!(session_id = %body.session_id, error = %e, "Chat turn failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "internal error"})),
            )
                .into_response()
        }
    }
}

// ── Issues ──────────────────────────────────────────────────────────

async fn list_issues(State(state): State<AppState>) -> impl IntoResponse {
    match state.service.list_issues().await {
        Ok(issues) => (StatusCode::OK, Json(serde_json::json!(issues))).into_response(),
        Err(e) => {
            error!(error = %e, "Issue listing failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "internal error"})),
            )
                .into_response()
        }
    }
}

async fn get_issue(State(state): State<AppState>, Path(id): Path<i64>) -> impl IntoResponse {
    match state.service.get_issue(id).await {
        Ok(Some(issue)) => (StatusCode::OK, Json(serde_json::json!(issue))).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "issue not found"})),
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, issue_id = id, "Issue lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": "internal error"})),
            )
                .into_response()
        }
    }
}
