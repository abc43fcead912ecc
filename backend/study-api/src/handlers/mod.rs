use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::{sync::Arc, time::Duration};
use validator::Validate;

use crate::metrics;
use crate::services::{workspace::Workspace, AppState};

pub mod chat;
pub mod documents;
pub mod flashcards;
pub mod quiz;

const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

pub async fn health_check(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let mut status = "healthy";
    let mut dependencies = serde_json::Map::new();

    let assessment_health = check_assessment_service(&state).await;
    if assessment_health.get("status").and_then(|v| v.as_str()) != Some("healthy") {
        // Every remote operation has a local fallback, so the API stays up
        status = "degraded";
    }
    dependencies.insert("assessment".to_string(), json!(assessment_health));

    let workspace = state.workspace().await;

    (
        StatusCode::OK,
        Json(json!({
            "status": status,
            "service": "docstudy-api",
            "version": env!("CARGO_PKG_VERSION"),
            "dependencies": dependencies,
            "document": workspace.as_ref().map(|w| w.document.name.clone()),
        })),
    )
}

async fn check_assessment_service(state: &AppState) -> serde_json::Map<String, serde_json::Value> {
    let mut result = serde_json::Map::new();

    match tokio::time::timeout(PROBE_TIMEOUT, state.service.probe()).await {
        Ok(Ok(())) => {
            result.insert("status".to_string(), json!("healthy"));
            result.insert(
                "message".to_string(),
                json!("Assessment service reachable"),
            );
        }
        Ok(Err(e)) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert("error".to_string(), json!(e.to_string()));
        }
        Err(_) => {
            result.insert("status".to_string(), json!("unhealthy"));
            result.insert(
                "error".to_string(),
                json!(format!(
                    "Assessment service probe timed out after {}s",
                    PROBE_TIMEOUT.as_secs()
                )),
            );
        }
    }

    result
}

pub async fn metrics_handler() -> impl IntoResponse {
    match metrics::render_metrics() {
        Ok(metrics_text) => (StatusCode::OK, metrics_text),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Failed to render metrics: {}", e),
        ),
    }
}

/// The active workspace, or 409 when no document has been uploaded.
pub(crate) async fn require_workspace(
    state: &AppState,
) -> Result<Arc<Workspace>, (StatusCode, String)> {
    state.workspace().await.ok_or_else(|| {
        (
            StatusCode::CONFLICT,
            "No document uploaded. Upload a document first".to_string(),
        )
    })
}

pub(crate) fn validate_request<T: Validate>(req: &T) -> Result<(), (StatusCode, String)> {
    req.validate().map_err(|e| {
        tracing::warn!("Request validation failed: {}", e);
        (StatusCode::BAD_REQUEST, format!("Validation error: {}", e))
    })
}
