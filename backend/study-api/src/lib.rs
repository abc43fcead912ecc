use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;

pub use config::Config;
pub use services::AppState;

/// Multipart framing on top of the largest accepted document.
const MULTIPART_OVERHEAD_BYTES: u64 = 64 * 1024;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = cors_layer(app_state.config.cors_origin.as_deref());

    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/metrics", get(handlers::metrics_handler))
        .nest("/api/documents", document_routes(&app_state))
        .nest("/api/quiz", quiz_routes())
        .nest("/api/flashcards", flashcard_routes())
        .route(
            "/api/chat",
            get(handlers::chat::get_history).post(handlers::chat::ask_question),
        )
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

fn cors_layer(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.map(HeaderValue::from_str) {
        Some(Ok(value)) => AllowOrigin::exact(value),
        Some(Err(e)) => {
            tracing::warn!("Ignoring invalid CORS origin: {}", e);
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_origin(allow_origin)
}

fn document_routes(app_state: &AppState) -> Router<Arc<AppState>> {
    let body_limit = app_state
        .config
        .upload
        .max_bytes
        .saturating_add(MULTIPART_OVERHEAD_BYTES);

    Router::new()
        .route(
            "/",
            post(handlers::documents::upload_document)
                .layer(DefaultBodyLimit::max(body_limit as usize)),
        )
        .route(
            "/current",
            get(handlers::documents::current_document).delete(handlers::documents::start_over),
        )
}

fn quiz_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::quiz::get_quiz))
        .route("/start", post(handlers::quiz::start_quiz))
        .route("/answer", post(handlers::quiz::select_answer))
        .route("/next", post(handlers::quiz::go_next))
        .route("/previous", post(handlers::quiz::go_previous))
        .route("/jump", post(handlers::quiz::jump_to))
        .route("/submit", post(handlers::quiz::submit_quiz))
        .route("/report", post(handlers::quiz::save_report))
        .route("/restart", post(handlers::quiz::restart_quiz))
}

fn flashcard_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::flashcards::get_flashcards))
        .route("/draft", put(handlers::flashcards::update_draft))
        .route("/generate", post(handlers::flashcards::generate_flashcards))
        .route("/flip", post(handlers::flashcards::flip_card))
        .route("/next", post(handlers::flashcards::next_card))
        .route("/previous", post(handlers::flashcards::previous_card))
        .route("/back", post(handlers::flashcards::back_to_requesting))
}
