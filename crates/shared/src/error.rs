use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    Unauthorized,
    Transport,
    Http,
    UnexpectedResponse,
    Storage,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// Empty input or missing form fields.
    #[error("{0}")]
    Validation(String),
    /// Missing or rejected bearer token.
    #[error("{0}")]
    Auth(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
    /// The local token store could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ClientError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth(message.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::Validation,
            Self::Auth(_) => ErrorCode::Unauthorized,
            Self::Transport(_) => ErrorCode::Transport,
            Self::Http { .. } => ErrorCode::Http,
            Self::UnexpectedResponse(_) => ErrorCode::UnexpectedResponse,
            Self::Storage(_) => ErrorCode::Storage,
        }
    }

    pub fn requires_reauth(&self) -> bool {
        matches!(self, Self::Auth(_))
    }

    /// Text suitable for a user-facing notice.
    pub fn user_message(&self) -> String {
        match self {
            Self::Http { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}
