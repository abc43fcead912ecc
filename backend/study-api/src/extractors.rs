use axum::{
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// JSON body extractor whose rejections are JSON 400s rather than axum's
/// plain-text 415/422 responses.
pub struct AppJson<T>(pub T);

impl<T, S> FromRequest<S> for AppJson<T>
where
    T: serde::de::DeserializeOwned + 'static,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(reject(rejection)),
        }
    }
}

fn reject(rejection: JsonRejection) -> Response {
    let message = format!("Failed to parse JSON request body: {}", rejection.body_text());
    tracing::warn!("{}", message);
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "error": message,
            "status": StatusCode::BAD_REQUEST.as_u16()
        })),
    )
        .into_response()
}
