use axum::{
    extract::{Multipart, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

use crate::error::UploadError;
use crate::services::{upload_gate::IncomingDocument, AppState};

const FILE_FIELD: &str = "file";

pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let mut incoming = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| (e.status(), e.body_text()))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .map(|name| name.to_string())
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| {
                (
                    StatusCode::BAD_REQUEST,
                    "Uploaded file has no file name".to_string(),
                )
            })?;
        let media_type = field.content_type().map(|value| value.to_string());
        let bytes = field.bytes().await.map_err(|e| {
            tracing::warn!("Failed to read upload {}: {}", file_name, e);
            (e.status(), e.body_text())
        })?;

        incoming = Some(IncomingDocument {
            file_name,
            media_type,
            bytes: bytes.to_vec(),
        });
        break;
    }

    let incoming = incoming.ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("Missing multipart field '{}'", FILE_FIELD),
        )
    })?;

    tracing::info!("Received document upload: {}", incoming.file_name);

    match state
        .upload_gate
        .accept(&state.config.assessment.identity, incoming)
        .await
    {
        Ok(document) => {
            state.open_workspace(document.clone()).await;
            Ok((StatusCode::CREATED, Json(document)))
        }
        Err(e) => {
            let status = match &e {
                UploadError::UnsupportedType { .. } => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                UploadError::TooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                UploadError::Rejected | UploadError::Service(_) => StatusCode::BAD_GATEWAY,
            };
            if !e.is_validation() {
                tracing::error!("Document upload failed: {}", e);
            }
            Err((status, e.to_string()))
        }
    }
}

pub async fn current_document(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    match state.workspace().await {
        Some(workspace) => Ok((StatusCode::OK, Json(workspace.document.clone()))),
        None => Err((StatusCode::NOT_FOUND, "No document uploaded".to_string())),
    }
}

/// Start over: discards the document and every session built on it.
pub async fn start_over(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    if state.close_workspace().await {
        tracing::info!("Workspace discarded by start over");
    }
    StatusCode::NO_CONTENT
}
