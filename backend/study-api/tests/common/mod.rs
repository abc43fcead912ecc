#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use chrono::Utc;
use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    future::Future,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::sync::Notify;
use tower::ServiceExt;

use docstudy_api::{
    config::Config,
    create_router,
    error::ServiceError,
    models::{
        quiz::AnswerOptions, Difficulty, Document, EvaluationResult, FlashCard, MistakeAnalysis,
        OptionKey, Question, WrongAnswer,
    },
    services::{assessment_client::AssessmentService, AppState},
};

pub const BOUNDARY: &str = "docstudy-test-boundary";

/// Keeps one remote call suspended until the test releases it.
#[derive(Default)]
pub struct Hold {
    entered: Notify,
    release: Notify,
}

impl Hold {
    /// Resolves once the held call has started.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// In-memory assessment service. Each operation pops its next scripted
/// result; unscripted calls fail with a transport error.
#[derive(Default)]
pub struct ScriptedService {
    quizzes: Mutex<VecDeque<Result<Vec<Question>, ServiceError>>>,
    evaluations: Mutex<VecDeque<Result<EvaluationResult, ServiceError>>>,
    analyses: Mutex<VecDeque<Result<MistakeAnalysis, ServiceError>>>,
    reports: Mutex<VecDeque<Result<String, ServiceError>>>,
    flashcards: Mutex<VecDeque<Result<Vec<FlashCard>, ServiceError>>>,
    uploads: Mutex<VecDeque<Result<bool, ServiceError>>>,
    answers: Mutex<VecDeque<Result<String, ServiceError>>>,
    holds: Mutex<HashMap<&'static str, Arc<Hold>>>,
    calls: Mutex<Vec<&'static str>>,
    probe_fails: Mutex<bool>,
}

fn pop<T>(queue: &Mutex<VecDeque<Result<T, ServiceError>>>) -> Result<T, ServiceError> {
    queue
        .lock()
        .unwrap()
        .pop_front()
        .unwrap_or_else(|| Err(ServiceError::Transport("not scripted".to_string())))
}

impl ScriptedService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_quiz(&self, result: Result<Vec<Question>, ServiceError>) {
        self.quizzes.lock().unwrap().push_back(result);
    }

    pub fn push_evaluation(&self, result: Result<EvaluationResult, ServiceError>) {
        self.evaluations.lock().unwrap().push_back(result);
    }

    pub fn push_analysis(&self, result: Result<MistakeAnalysis, ServiceError>) {
        self.analyses.lock().unwrap().push_back(result);
    }

    pub fn push_report(&self, result: Result<String, ServiceError>) {
        self.reports.lock().unwrap().push_back(result);
    }

    pub fn push_flashcards(&self, result: Result<Vec<FlashCard>, ServiceError>) {
        self.flashcards.lock().unwrap().push_back(result);
    }

    pub fn push_upload(&self, result: Result<bool, ServiceError>) {
        self.uploads.lock().unwrap().push_back(result);
    }

    pub fn push_answer(&self, result: Result<String, ServiceError>) {
        self.answers.lock().unwrap().push_back(result);
    }

    pub fn fail_probe(&self) {
        *self.probe_fails.lock().unwrap() = true;
    }

    /// Suspends the next call of `operation` until released.
    pub fn hold(&self, operation: &'static str) -> Arc<Hold> {
        let hold = Arc::new(Hold::default());
        self.holds.lock().unwrap().insert(operation, hold.clone());
        hold
    }

    pub fn calls(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| **call == operation)
            .count()
    }

    async fn enter(&self, operation: &'static str) {
        self.calls.lock().unwrap().push(operation);
        let hold = self.holds.lock().unwrap().remove(operation);
        if let Some(hold) = hold {
            hold.entered.notify_one();
            hold.release.notified().await;
        }
    }
}

#[async_trait]
impl AssessmentService for ScriptedService {
    async fn generate_quiz(
        &self,
        _identity: &str,
        _question_count: u32,
        _difficulty: Difficulty,
    ) -> Result<Vec<Question>, ServiceError> {
        self.enter("generate_quiz").await;
        pop(&self.quizzes)
    }

    async fn evaluate_quiz(
        &self,
        _identity: &str,
        _questions: &[Question],
        _answers: &BTreeMap<usize, OptionKey>,
    ) -> Result<EvaluationResult, ServiceError> {
        self.enter("evaluate_quiz").await;
        pop(&self.evaluations)
    }

    async fn analyze_mistakes(
        &self,
        _identity: &str,
        _wrong_answers: &[WrongAnswer],
    ) -> Result<MistakeAnalysis, ServiceError> {
        self.enter("analyze_mistakes").await;
        pop(&self.analyses)
    }

    async fn save_report(
        &self,
        _identity: &str,
        _report_payload: &serde_json::Value,
    ) -> Result<String, ServiceError> {
        self.enter("save_report").await;
        pop(&self.reports)
    }

    async fn generate_flashcards(
        &self,
        _identity: &str,
        _request_text: &str,
        _card_count: u32,
    ) -> Result<Vec<FlashCard>, ServiceError> {
        self.enter("generate_flashcards").await;
        pop(&self.flashcards)
    }

    async fn upload_document(
        &self,
        _identity: &str,
        _file_bytes: Vec<u8>,
        _file_name: &str,
        _media_type: &str,
    ) -> Result<bool, ServiceError> {
        self.enter("upload_document").await;
        self.uploads.lock().unwrap().pop_front().unwrap_or(Ok(true))
    }

    async fn ask(&self, _identity: &str, _message: &str) -> Result<String, ServiceError> {
        self.enter("ask").await;
        pop(&self.answers)
    }

    async fn probe(&self) -> Result<(), ServiceError> {
        if *self.probe_fails.lock().unwrap() {
            Err(ServiceError::Transport("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Polls `check` until it holds. Panics after five seconds.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let settled = tokio::time::timeout(Duration::from_secs(5), async {
        while !check().await {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(settled.is_ok(), "condition not reached within 5s");
}

pub fn stale_responses(operation: &str) -> u64 {
    docstudy_api::metrics::STALE_RESPONSES_TOTAL
        .with_label_values(&[operation])
        .get()
}

pub fn test_config() -> Config {
    Config::with_base_url("http://127.0.0.1:9")
}

pub fn question(prompt: &str, correct: OptionKey) -> Question {
    Question::new(
        prompt,
        AnswerOptions {
            a: format!("{} option A", prompt),
            b: format!("{} option B", prompt),
            c: format!("{} option C", prompt),
            d: format!("{} option D", prompt),
        },
        correct,
        None,
    )
}

pub fn questions(keys: &[OptionKey]) -> Vec<Question> {
    keys.iter()
        .enumerate()
        .map(|(i, key)| question(&format!("Question {}", i + 1), *key))
        .collect()
}

pub fn document(name: &str, byte_size: u64) -> Document {
    Document {
        name: name.to_string(),
        byte_size,
        media_type: "application/pdf".to_string(),
        uploaded_at: Utc::now(),
    }
}

pub fn create_test_app(service: Arc<ScriptedService>) -> (Router, Arc<AppState>) {
    create_test_app_with_config(service, test_config())
}

pub fn create_test_app_with_config(
    service: Arc<ScriptedService>,
    config: Config,
) -> (Router, Arc<AppState>) {
    init_tracing();
    let state = Arc::new(AppState::with_service(config, service));
    (create_router(state.clone()), state)
}

/// Multipart body carrying a single `file` field.
pub fn multipart_body(file_name: &str, media_type: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
    body.extend_from_slice(
        format!(
            "Content-Disposition: form-data; name=\"file\"; filename=\"{}\"\r\n",
            file_name
        )
        .as_bytes(),
    );
    body.extend_from_slice(format!("Content-Type: {}\r\n\r\n", media_type).as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub async fn upload(app: &Router, file_name: &str, media_type: &str, content: &[u8]) -> StatusCode {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/documents")
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={}", BOUNDARY),
                )
                .body(Body::from(multipart_body(file_name, media_type, content)))
                .unwrap(),
        )
        .await
        .unwrap();
    response.status()
}

/// Sends a request and returns the status with the decoded JSON body
/// (`Null` for empty or non-JSON bodies).
pub async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<serde_json::Value>,
) -> (StatusCode, serde_json::Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&json).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}
