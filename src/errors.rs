use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("journal i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("journal record encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("invalid subject id {0:?}")]
    InvalidSubject(String),
    #[error("invalid action kind {0:?}")]
    InvalidActionKind(String),
    #[error("timestamp {0} is outside the supported calendar range")]
    InvalidTimestamp(DateTime<Utc>),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

#[derive(Debug)]
pub struct AppError {
    pub status: StatusCode,
    pub message: String,
}

impl AppError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    pub fn internal(err: impl std::error::Error) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: err.to_string(),
        }
    }
}

impl From<JournalError> for AppError {
    fn from(err: JournalError) -> Self {
        match err {
            JournalError::InvalidSubject(_)
            | JournalError::InvalidActionKind(_)
            | JournalError::InvalidTimestamp(_) => Self::bad_request(err.to_string()),
            JournalError::Storage(_) => Self::internal(err),
        }
    }
}

impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        (self.status, self.message).into_response()
    }
}
