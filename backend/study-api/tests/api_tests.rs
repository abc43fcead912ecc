use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

use docstudy_api::{
    error::ServiceError,
    models::{EvaluationResult, FlashCard, OptionKey},
};

mod common;

use common::ScriptedService;

#[tokio::test]
async fn test_health_reports_degraded_when_service_unreachable() {
    let service = ScriptedService::new();
    service.fail_probe();
    let (app, _) = common::create_test_app(service);

    let (status, body) = common::send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["dependencies"]["assessment"]["status"], "unhealthy");
}

#[tokio::test]
async fn test_health_ok() {
    let (app, _) = common::create_test_app(ScriptedService::new());
    let (status, body) = common::send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body["document"].is_null());
}

#[tokio::test]
async fn test_session_routes_need_a_document() {
    let (app, _) = common::create_test_app(ScriptedService::new());

    for (method, uri) in [
        ("GET", "/api/quiz"),
        ("POST", "/api/quiz/start"),
        ("GET", "/api/flashcards"),
        ("GET", "/api/chat"),
    ] {
        let (status, _) = common::send(&app, method, uri, None).await;
        assert_eq!(status, StatusCode::CONFLICT, "{} {}", method, uri);
    }

    let (status, _) = common::send(&app, "GET", "/api/documents/current", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_upload_validation_never_calls_ingestion() {
    let service = ScriptedService::new();
    let (app, state) = common::create_test_app(service.clone());

    let status = common::upload(&app, "photo.png", "image/png", b"\x89PNG").await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(service.calls("upload_document"), 0);
    assert!(state.workspace().await.is_none());
}

#[tokio::test]
async fn test_oversized_upload_is_rejected() {
    let service = ScriptedService::new();
    let mut config = common::test_config();
    config.upload.max_bytes = 1024;
    let (app, _) = common::create_test_app_with_config(service.clone(), config);

    let status = common::upload(&app, "big.pdf", "application/pdf", &[0u8; 2048]).await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(service.calls("upload_document"), 0);
}

#[tokio::test]
async fn test_ingestion_failure_is_bad_gateway() {
    let service = ScriptedService::new();
    service.push_upload(Err(ServiceError::Transport("refused".to_string())));
    let (app, _) = common::create_test_app(service);

    let status = common::upload(&app, "notes.pdf", "application/pdf", b"%PDF-1.4").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_upload_then_quiz_flow() {
    let service = ScriptedService::new();
    service.push_quiz(Ok(common::questions(&[OptionKey::A, OptionKey::B])));
    service.push_evaluation(Ok(EvaluationResult {
        total_questions: 2,
        correct_count: 2,
        wrong_answers: Vec::new(),
    }));
    service.push_report(Ok("reports/student/1.pdf".to_string()));
    let (app, _) = common::create_test_app(service.clone());

    let status = common::upload(&app, "notes.pdf", "application/pdf", b"%PDF-1.4").await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, document) = common::send(&app, "GET", "/api/documents/current", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(document["name"], "notes.pdf");
    assert_eq!(document["mediaType"], "application/pdf");

    let (status, quiz) = common::send(
        &app,
        "POST",
        "/api/quiz/start",
        Some(json!({"questionCount": 2, "difficulty": "easy"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quiz["status"], "presenting");
    assert!(quiz["questions"][0].get("correctOptionKey").is_none());

    common::send(&app, "POST", "/api/quiz/answer", Some(json!({"option": "A"}))).await;
    let (_, quiz) = common::send(&app, "POST", "/api/quiz/next", None).await;
    assert_eq!(quiz["currentIndex"], 1);

    // Incomplete submission is a no-op
    let (status, quiz) = common::send(&app, "POST", "/api/quiz/submit", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(quiz["status"], "presenting");

    common::send(&app, "POST", "/api/quiz/answer", Some(json!({"option": "B"}))).await;
    let (_, quiz) = common::send(&app, "POST", "/api/quiz/submit", None).await;
    assert_eq!(quiz["status"], "analysis_ready");
    assert_eq!(quiz["evaluation"]["percentage"], 100);
    assert_eq!(quiz["questions"][1]["correctOptionKey"], "B");

    let (_, quiz) = common::send(&app, "POST", "/api/quiz/report", None).await;
    assert_eq!(quiz["status"], "report_saved");
    assert_eq!(quiz["storageLocation"], "reports/student/1.pdf");
    assert_eq!(service.calls("analyze_mistakes"), 0);
}

#[tokio::test]
async fn test_invalid_quiz_parameters_are_rejected() {
    let service = ScriptedService::new();
    let (app, _) = common::create_test_app(service.clone());
    common::upload(&app, "notes.txt", "text/plain", b"cells").await;

    let (status, _) = common::send(
        &app,
        "POST",
        "/api/quiz/start",
        Some(json!({"questionCount": 50})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(service.calls("generate_quiz"), 0);

    let (status, body) =
        common::send(&app, "POST", "/api/quiz/answer", Some(json!({"option": "Z"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_flashcards_and_chat_over_http() {
    let service = ScriptedService::new();
    service.push_flashcards(Ok(vec![FlashCard {
        front: "Osmosis".to_string(),
        back: "Movement of water across a membrane".to_string(),
    }]));
    service.push_answer(Ok("It is about cell biology.".to_string()));
    let (app, _) = common::create_test_app(service);
    common::upload(&app, "cells.docx", "application/octet-stream", b"PK").await;

    let (status, _) = common::send(
        &app,
        "POST",
        "/api/flashcards/generate",
        Some(json!({"message": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, deck) = common::send(
        &app,
        "POST",
        "/api/flashcards/generate",
        Some(json!({"message": "Key terms", "cardCount": 5})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deck["mode"], "browsing");
    assert_eq!(deck["position"], "1 / 1");

    let (_, deck) = common::send(&app, "POST", "/api/flashcards/flip", None).await;
    assert_eq!(deck["deck"]["isFlipped"], true);

    let (_, deck) = common::send(&app, "POST", "/api/flashcards/back", None).await;
    assert_eq!(deck["mode"], "requesting");
    assert_eq!(deck["chat"].as_array().unwrap().len(), 1);

    let (status, history) = common::send(
        &app,
        "POST",
        "/api/chat",
        Some(json!({"message": "What is this about?"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history[1]["text"], "It is about cell biology.");
    assert_eq!(history[1]["sender"], "system");
}

#[tokio::test]
async fn test_start_over_discards_sessions() {
    let service = ScriptedService::new();
    let (app, state) = common::create_test_app(service);
    common::upload(&app, "notes.pdf", "application/pdf", b"%PDF").await;
    assert!(state.workspace().await.is_some());

    let (status, _) = common::send(&app, "DELETE", "/api/documents/current", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(state.workspace().await.is_none());

    let (status, _) = common::send(&app, "GET", "/api/quiz", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_trace_id_is_echoed() {
    let (app, _) = common::create_test_app(ScriptedService::new());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .header("x-trace-id", "trace-123")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.headers()["x-trace-id"], "trace-123");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_http_counters() {
    let (app, _) = common::create_test_app(ScriptedService::new());
    common::send(&app, "GET", "/health", None).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8_lossy(&body);
    assert!(text.contains("http_requests_total"));
    assert!(text.contains("path=\"/health\""));
}
