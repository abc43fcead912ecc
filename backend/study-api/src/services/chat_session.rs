use crate::error::{IntentError, ServiceError};
use crate::models::{ChatTurn, RequestToken, TokenCounter};
use crate::services::quiz_session::Completion;

const APOLOGY_REPLY: &str =
    "Sorry, I could not answer that right now. Please try again in a moment.";

#[derive(Debug, Clone)]
pub struct QuestionRequest {
    pub token: RequestToken,
    pub message: String,
}

/// Free-form questions about the uploaded document. History is append-only.
#[derive(Debug, Default)]
pub struct ChatSession {
    history: Vec<ChatTurn>,
    tokens: TokenCounter,
    in_flight: Option<RequestToken>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[ChatTurn] {
        &self.history
    }

    pub fn is_waiting(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Appends the question and returns the request to send. `Ok(None)` while
    /// another question is still unanswered.
    pub fn begin_question(
        &mut self,
        message: &str,
    ) -> Result<Option<QuestionRequest>, IntentError> {
        let message = message.trim();
        if message.is_empty() {
            return Err(IntentError::EmptyText);
        }
        if self.in_flight.is_some() {
            return Ok(None);
        }

        self.history.push(ChatTurn::user(message));
        let token = self.tokens.issue();
        self.in_flight = Some(token);
        Ok(Some(QuestionRequest {
            token,
            message: message.to_string(),
        }))
    }

    pub fn complete_question(
        &mut self,
        token: RequestToken,
        result: Result<String, ServiceError>,
    ) -> Completion {
        if self.in_flight != Some(token) {
            return Completion::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(answer) => {
                self.history.push(ChatTurn::system(answer));
                Completion::Applied
            }
            Err(e) => {
                tracing::error!("Document question failed: {}", e);
                self.history.push(ChatTurn::system(APOLOGY_REPLY));
                Completion::Degraded
            }
        }
    }
}
