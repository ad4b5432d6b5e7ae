use thiserror::Error;

use crate::funnel::FunnelStage;

#[derive(Error, Debug)]
pub enum LoanError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Classification undefined: {0}")]
    ClassificationUndefined(String),

    #[error("Event {event} is not valid in stage {stage}")]
    StageViolation { stage: FunnelStage, event: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LoanError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}

impl From<sqlx::Error> for LoanError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LoanError>;
