use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use super::{require_workspace, validate_request};
use crate::{
    extractors::AppJson,
    models::requests::{DraftRequest, GenerateFlashCardsRequest},
    services::{workspace::FlashCardSessionController, AppState},
};

async fn flashcard_controller(
    state: &AppState,
) -> Result<Arc<FlashCardSessionController>, (StatusCode, String)> {
    Ok(require_workspace(state).await?.flashcards.clone())
}

pub async fn get_flashcards(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let flashcards = flashcard_controller(&state).await?;
    Ok(Json(flashcards.snapshot().await))
}

pub async fn update_draft(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<DraftRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    validate_request(&req)?;
    let flashcards = flashcard_controller(&state).await?;
    Ok(Json(flashcards.set_draft(req.text).await))
}

pub async fn generate_flashcards(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<GenerateFlashCardsRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    validate_request(&req)?;
    let flashcards = flashcard_controller(&state).await?;

    match flashcards.generate(&req.message, req.card_count).await {
        Ok(snapshot) => Ok(Json(snapshot)),
        Err(e) => Err((StatusCode::BAD_REQUEST, e.to_string())),
    }
}

pub async fn flip_card(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let flashcards = flashcard_controller(&state).await?;
    Ok(Json(flashcards.flip().await))
}

pub async fn next_card(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let flashcards = flashcard_controller(&state).await?;
    Ok(Json(flashcards.next().await))
}

pub async fn previous_card(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let flashcards = flashcard_controller(&state).await?;
    Ok(Json(flashcards.previous().await))
}

pub async fn back_to_requesting(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let flashcards = flashcard_controller(&state).await?;
    Ok(Json(flashcards.back_to_requesting().await))
}
