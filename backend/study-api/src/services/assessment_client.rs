use anyhow::Context;
use async_trait::async_trait;
use reqwest::{multipart, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};

use crate::error::ServiceError;
use crate::models::{
    quiz::AnswerOptions, Difficulty, EvaluationResult, FlashCard, MistakeAnalysis, OptionKey,
    Question, WebResource, WrongAnswer,
};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const MAX_ERROR_BODY: usize = 512;

/// Contract of the Remote Assessment Service. Implementations return a
/// tagged result at every boundary; callers never inspect optional fields
/// to tell success from failure.
#[async_trait]
pub trait AssessmentService: Send + Sync {
    async fn generate_quiz(
        &self,
        identity: &str,
        question_count: u32,
        difficulty: Difficulty,
    ) -> Result<Vec<Question>, ServiceError>;

    async fn evaluate_quiz(
        &self,
        identity: &str,
        questions: &[Question],
        answers: &BTreeMap<usize, OptionKey>,
    ) -> Result<EvaluationResult, ServiceError>;

    async fn analyze_mistakes(
        &self,
        identity: &str,
        wrong_answers: &[WrongAnswer],
    ) -> Result<MistakeAnalysis, ServiceError>;

    /// Persists a report and returns where it was stored.
    async fn save_report(
        &self,
        identity: &str,
        report_payload: &serde_json::Value,
    ) -> Result<String, ServiceError>;

    async fn generate_flashcards(
        &self,
        identity: &str,
        request_text: &str,
        card_count: u32,
    ) -> Result<Vec<FlashCard>, ServiceError>;

    /// Hands a document to the ingestion pipeline. `Ok(false)` means the
    /// service answered but did not accept it.
    async fn upload_document(
        &self,
        identity: &str,
        file_bytes: Vec<u8>,
        file_name: &str,
        media_type: &str,
    ) -> Result<bool, ServiceError>;

    /// Free-form question about the uploaded document.
    async fn ask(&self, identity: &str, message: &str) -> Result<String, ServiceError>;

    async fn probe(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

/// Success/failure envelope; the failure arm is recognised by its `error` field.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope<T> {
    Failure { error: String },
    Success(T),
}

impl<T> Envelope<T> {
    fn into_result(self) -> Result<T, ServiceError> {
        match self {
            Envelope::Failure { error } => Err(ServiceError::Rejected(error)),
            Envelope::Success(payload) => Ok(payload),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateQuizRequest<'a> {
    username: &'a str,
    question_count: u32,
    difficulty: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateQuizResponse {
    questions: Vec<GeneratedQuestion>,
}

#[derive(Debug, Deserialize)]
struct GeneratedQuestion {
    #[serde(alias = "prompt")]
    question: String,
    options: AnswerOptions,
    #[serde(alias = "correctOptionKey")]
    answer: String,
    #[serde(default)]
    explanation: Option<String>,
}

impl TryFrom<GeneratedQuestion> for Question {
    type Error = ServiceError;

    fn try_from(generated: GeneratedQuestion) -> Result<Self, Self::Error> {
        if generated.question.trim().is_empty() {
            return Err(ServiceError::Malformed("Question text is empty".to_string()));
        }
        let key = generated
            .answer
            .parse::<OptionKey>()
            .map_err(ServiceError::Malformed)?;
        Ok(Question::new(
            generated.question,
            generated.options,
            key,
            generated.explanation,
        ))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateQuizRequest<'a> {
    username: &'a str,
    questions: Vec<EvaluatedQuestion<'a>>,
    answers: &'a BTreeMap<usize, OptionKey>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EvaluatedQuestion<'a> {
    question: &'a str,
    options: &'a AnswerOptions,
    correct_option_key: OptionKey,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EvaluateQuizResponse {
    total_questions: usize,
    #[serde(alias = "correctAnswers")]
    correct_count: usize,
    /// Either the wrong-answer list or, in older deployments, just a count.
    #[serde(default)]
    wrong_answers: Option<serde_json::Value>,
    #[serde(default)]
    wrong_answers_list: Option<Vec<WrongAnswer>>,
}

impl EvaluateQuizResponse {
    fn into_evaluation(self, questions: &[Question]) -> Result<EvaluationResult, ServiceError> {
        if self.total_questions != questions.len() {
            return Err(ServiceError::Malformed(format!(
                "Evaluated {} questions but {} were submitted",
                self.total_questions,
                questions.len()
            )));
        }
        if self.correct_count > self.total_questions {
            return Err(ServiceError::Malformed(format!(
                "Correct count {} exceeds total {}",
                self.correct_count, self.total_questions
            )));
        }

        let mut wrong_answers = match (self.wrong_answers_list, self.wrong_answers) {
            (Some(list), _) => list,
            (None, Some(value @ serde_json::Value::Array(_))) => serde_json::from_value(value)?,
            _ => {
                return Err(ServiceError::Malformed(
                    "Evaluation response has no wrong answer list".to_string(),
                ))
            }
        };

        if wrong_answers.len() != self.total_questions - self.correct_count {
            return Err(ServiceError::Malformed(format!(
                "{} wrong answers listed for {} incorrect questions",
                wrong_answers.len(),
                self.total_questions - self.correct_count
            )));
        }

        // Remote rows may omit the explanation; fill it from the question.
        for wrong in wrong_answers.iter_mut() {
            if wrong.explanation.is_empty() {
                if let Some(question) = wrong
                    .question_number
                    .checked_sub(1)
                    .and_then(|i| questions.get(i))
                {
                    wrong.explanation = question.explanation.clone();
                }
            }
        }

        Ok(EvaluationResult {
            total_questions: self.total_questions,
            correct_count: self.correct_count,
            wrong_answers,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeMistakesRequest<'a> {
    username: &'a str,
    wrong_answers: &'a [WrongAnswer],
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeMistakesResponse {
    #[serde(alias = "analysis")]
    narrative: String,
    #[serde(default)]
    web_resources: Vec<WebResource>,
    #[serde(default)]
    report_eligible: bool,
    #[serde(default)]
    report_payload: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SaveReportRequest<'a> {
    username: &'a str,
    report_payload: &'a serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SaveReportResponse {
    storage_location: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateFlashCardsRequest<'a> {
    username: &'a str,
    message: &'a str,
    card_count: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateFlashCardsResponse {
    #[serde(alias = "cards")]
    flashcards: Vec<FlashCard>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    #[serde(default)]
    accepted: Option<bool>,
}

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    username: &'a str,
    message: &'a str,
}

/// HTTP/JSON client for the Remote Assessment Service.
#[derive(Clone)]
pub struct HttpAssessmentClient {
    http_client: Client,
    base_url: String,
}

impl HttpAssessmentClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build assessment HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, ServiceError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        tracing::debug!("Calling assessment service: POST {}", url);

        let response = self.http_client.post(&url).json(body).send().await?;
        decode_envelope(response).await
    }
}

async fn read_success_body(response: reqwest::Response) -> Result<String, ServiceError> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        if let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(&body) {
            return Err(ServiceError::Rejected(error));
        }
        return Err(ServiceError::Status {
            status: status.as_u16(),
            body: truncate(&body),
        });
    }

    Ok(body)
}

async fn decode_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ServiceError> {
    let body = read_success_body(response).await?;
    let envelope: Envelope<T> = serde_json::from_str(&body)
        .map_err(|e| ServiceError::Malformed(format!("{}: {}", e, truncate(&body))))?;
    envelope.into_result()
}

fn truncate(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let mut end = MAX_ERROR_BODY;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// Pulls the answer text out of a chat response, which may be plain text,
/// a JSON string, or an object with an `answer`/`response` field.
fn extract_answer(body: &str) -> Result<String, ServiceError> {
    let text = match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::String(text)) => text,
        Ok(serde_json::Value::Object(map)) => {
            if let Some(error) = map.get("error").and_then(|v| v.as_str()) {
                return Err(ServiceError::Rejected(error.to_string()));
            }
            map.get("answer")
                .or_else(|| map.get("response"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .ok_or_else(|| ServiceError::Malformed("Chat response has no answer".to_string()))?
        }
        _ => body.to_string(),
    };

    if text.trim().is_empty() {
        return Err(ServiceError::Malformed("Chat answer is empty".to_string()));
    }
    Ok(text)
}

#[async_trait]
impl AssessmentService for HttpAssessmentClient {
    async fn generate_quiz(
        &self,
        identity: &str,
        question_count: u32,
        difficulty: Difficulty,
    ) -> Result<Vec<Question>, ServiceError> {
        let request = GenerateQuizRequest {
            username: identity,
            question_count,
            difficulty: difficulty.as_str(),
        };
        let response: GenerateQuizResponse = self
            .post_json("/api/quiz/generate-structured", &request)
            .await?;

        let questions = response
            .questions
            .into_iter()
            .map(Question::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::info!(
            "Assessment service generated {} questions for {}",
            questions.len(),
            identity
        );
        Ok(questions)
    }

    async fn evaluate_quiz(
        &self,
        identity: &str,
        questions: &[Question],
        answers: &BTreeMap<usize, OptionKey>,
    ) -> Result<EvaluationResult, ServiceError> {
        let request = EvaluateQuizRequest {
            username: identity,
            questions: questions
                .iter()
                .map(|q| EvaluatedQuestion {
                    question: &q.prompt,
                    options: &q.options,
                    correct_option_key: q.correct_option_key,
                })
                .collect(),
            answers,
        };
        let response: EvaluateQuizResponse =
            self.post_json("/api/quiz/evaluate", &request).await?;
        response.into_evaluation(questions)
    }

    async fn analyze_mistakes(
        &self,
        identity: &str,
        wrong_answers: &[WrongAnswer],
    ) -> Result<MistakeAnalysis, ServiceError> {
        let request = AnalyzeMistakesRequest {
            username: identity,
            wrong_answers,
        };
        let response: AnalyzeMistakesResponse =
            self.post_json("/api/quiz/analyzeMistakes", &request).await?;

        Ok(MistakeAnalysis {
            narrative_text: response.narrative,
            web_resources: response.web_resources,
            report_eligible: response.report_eligible,
            report_payload: response.report_payload,
        })
    }

    async fn save_report(
        &self,
        identity: &str,
        report_payload: &serde_json::Value,
    ) -> Result<String, ServiceError> {
        let request = SaveReportRequest {
            username: identity,
            report_payload,
        };
        let response: SaveReportResponse =
            self.post_json("/api/quiz/saveReport", &request).await?;

        if response.storage_location.trim().is_empty() {
            return Err(ServiceError::Malformed(
                "Report saved without a storage location".to_string(),
            ));
        }
        Ok(response.storage_location)
    }

    async fn generate_flashcards(
        &self,
        identity: &str,
        request_text: &str,
        card_count: u32,
    ) -> Result<Vec<FlashCard>, ServiceError> {
        let request = GenerateFlashCardsRequest {
            username: identity,
            message: request_text,
            card_count,
        };
        let response: GenerateFlashCardsResponse =
            self.post_json("/api/flashcards/generate", &request).await?;
        Ok(response.flashcards)
    }

    async fn upload_document(
        &self,
        identity: &str,
        file_bytes: Vec<u8>,
        file_name: &str,
        media_type: &str,
    ) -> Result<bool, ServiceError> {
        let url = self.url("/api/documents/upload");
        tracing::debug!("Uploading {} to {}", file_name, url);

        let part = multipart::Part::bytes(file_bytes)
            .file_name(file_name.to_string())
            .mime_str(media_type)?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("username", identity.to_string());

        let response = self.http_client.post(&url).multipart(form).send().await?;
        let body = read_success_body(response).await?;

        // The ingestion endpoint may answer with a bare document id
        match serde_json::from_str::<Envelope<UploadResponse>>(&body) {
            Ok(envelope) => Ok(envelope.into_result()?.accepted.unwrap_or(true)),
            Err(_) => Ok(true),
        }
    }

    async fn ask(&self, identity: &str, message: &str) -> Result<String, ServiceError> {
        let url = self.url("/api/user-documents/chat");
        tracing::debug!("Calling assessment service: POST {}", url);

        let request = AskRequest {
            username: identity,
            message,
        };
        let response = self.http_client.post(&url).json(&request).send().await?;
        let body = read_success_body(response).await?;
        extract_answer(&body)
    }

    async fn probe(&self) -> Result<(), ServiceError> {
        self.http_client
            .get(&self.base_url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await?;
        Ok(())
    }
}
