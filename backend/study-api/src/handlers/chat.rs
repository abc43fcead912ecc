use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use super::{require_workspace, validate_request};
use crate::{extractors::AppJson, models::requests::ChatRequest, services::AppState};

pub async fn get_history(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let chat = require_workspace(&state).await?.chat.clone();
    Ok(Json(chat.history().await))
}

pub async fn ask_question(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<ChatRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    validate_request(&req)?;
    let chat = require_workspace(&state).await?.chat.clone();

    tracing::info!("Question about the document ({} chars)", req.message.len());
    match chat.ask(&req.message).await {
        Ok(history) => Ok(Json(history)),
        Err(e) => Err((StatusCode::BAD_REQUEST, e.to_string())),
    }
}
