use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod flashcard;
pub mod quiz;
pub mod requests;

pub use flashcard::{FlashCard, FlashCardDeck, FlashCardMode, FlashCardSnapshot};
pub use quiz::{
    Difficulty, EvaluationResult, MistakeAnalysis, OptionKey, Question, QuizSnapshot, QuizStatus,
    WebResource, WrongAnswer,
};

/// Uploaded document accepted by the ingestion collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub name: String,
    pub byte_size: u64,
    pub media_type: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Identity and document a workspace's controllers operate on.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub identity: String,
    pub document: Document,
}

impl SessionContext {
    pub fn new(identity: impl Into<String>, document: Document) -> Self {
        Self {
            identity: identity.into(),
            document,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    System,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
            timestamp: Utc::now(),
        }
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: Sender::System,
            timestamp: Utc::now(),
        }
    }
}

/// Identifies one outstanding remote request. A completion whose token no
/// longer matches the session's in-flight token is stale and gets dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestToken(u64);

/// Hands out monotonically increasing request tokens.
#[derive(Debug, Default)]
pub struct TokenCounter {
    next: u64,
}

impl TokenCounter {
    pub fn issue(&mut self) -> RequestToken {
        self.next += 1;
        RequestToken(self.next)
    }
}
