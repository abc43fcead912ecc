//! Error types shared by the assessment client and the session controllers.

use thiserror::Error;

/// Failure of a call to the Remote Assessment Service.
///
/// Every variant is transient from the controllers' point of view: callers
/// either fall back to a local continuation or surface a notice.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    #[error("Assessment service unreachable: {0}")]
    Transport(String),

    #[error("Assessment service timed out")]
    Timeout,

    #[error("Assessment service returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Malformed assessment response: {0}")]
    Malformed(String),

    /// The service answered with an explicit `error` field.
    #[error("{0}")]
    Rejected(String),
}

impl From<reqwest::Error> for ServiceError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ServiceError::Timeout
        } else if e.is_decode() {
            ServiceError::Malformed(e.to_string())
        } else {
            ServiceError::Transport(e.to_string())
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(e: serde_json::Error) -> Self {
        ServiceError::Malformed(e.to_string())
    }
}

/// Synchronous rejection of a user intent before any request is issued.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IntentError {
    #[error("Message must not be empty")]
    EmptyText,
}

/// Rejections produced by the upload gate.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Unsupported document type: {media_type}. Only PDF, TXT and Word documents are accepted")]
    UnsupportedType { media_type: String },

    #[error("Document is {size} bytes; the limit is {max} bytes")]
    TooLarge { size: u64, max: u64 },

    #[error("Document was not accepted by the ingestion service")]
    Rejected,

    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl UploadError {
    /// Validation failures never reach the network.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            UploadError::UnsupportedType { .. } | UploadError::TooLarge { .. }
        )
    }
}
