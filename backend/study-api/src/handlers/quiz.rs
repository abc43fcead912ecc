use axum::{body::Bytes, extract::State, http::StatusCode, response::IntoResponse, Json};
use std::sync::Arc;

use super::{require_workspace, validate_request};
use crate::{
    config::QuizSettings,
    extractors::AppJson,
    models::requests::{AnswerRequest, JumpRequest, StartQuizRequest},
    services::{workspace::QuizSessionController, AppState},
};

async fn quiz_controller(
    state: &AppState,
) -> Result<Arc<QuizSessionController>, (StatusCode, String)> {
    Ok(require_workspace(state).await?.quiz.clone())
}

pub async fn get_quiz(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let quiz = quiz_controller(&state).await?;
    Ok(Json(quiz.snapshot().await))
}

/// Body is optional; missing fields fall back to the configured defaults.
pub async fn start_quiz(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let req: StartQuizRequest = if body.iter().all(u8::is_ascii_whitespace) {
        StartQuizRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| {
            (
                StatusCode::BAD_REQUEST,
                format!("Failed to parse JSON request body: {}", e),
            )
        })?
    };
    validate_request(&req)?;

    let quiz = quiz_controller(&state).await?;
    let defaults = quiz.defaults();
    let settings = QuizSettings {
        question_count: req.question_count.unwrap_or(defaults.question_count),
        difficulty: req.difficulty.unwrap_or(defaults.difficulty),
    };

    tracing::info!(
        "Starting quiz: {} questions, difficulty {}",
        settings.question_count,
        settings.difficulty.as_str()
    );
    Ok(Json(quiz.start(settings).await))
}

pub async fn select_answer(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<AnswerRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let quiz = quiz_controller(&state).await?;
    Ok(Json(quiz.select_answer(req.option).await))
}

pub async fn go_next(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let quiz = quiz_controller(&state).await?;
    Ok(Json(quiz.go_next().await))
}

pub async fn go_previous(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let quiz = quiz_controller(&state).await?;
    Ok(Json(quiz.go_previous().await))
}

pub async fn jump_to(
    State(state): State<Arc<AppState>>,
    AppJson(req): AppJson<JumpRequest>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let quiz = quiz_controller(&state).await?;
    Ok(Json(quiz.jump_to(req.index).await))
}

pub async fn submit_quiz(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    tracing::info!("Submitting quiz");
    let quiz = quiz_controller(&state).await?;
    Ok(Json(quiz.submit().await))
}

pub async fn save_report(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let quiz = quiz_controller(&state).await?;
    Ok(Json(quiz.save_report().await))
}

pub async fn restart_quiz(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let quiz = quiz_controller(&state).await?;
    Ok(Json(quiz.restart().await))
}
