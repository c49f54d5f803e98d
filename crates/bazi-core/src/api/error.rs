use serde::Deserialize;
use thiserror::Error;

use crate::validate::ValidationError;

/// Coarse error category the UI branches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub enum ErrorKind {
    Validation,
    Network,
    Unauthorized,
    ServerRejected,
    Unknown,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// Rejected locally; no request was made
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Network error: {0}")]
    Network(String),

    /// 401 from the service. The local session has already been cleared.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{message}")]
    ServerRejected { status: u16, message: String },

    #[error("Unexpected error: {0}")]
    Unknown(String),
}

/// Maximum length for error messages taken from response bodies
const MAX_ERROR_MESSAGE_LENGTH: usize = 500;

/// Error payload shape used by the service for every non-2xx response
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Validation(_) => ErrorKind::Validation,
            ApiError::Network(_) => ErrorKind::Network,
            ApiError::Unauthorized(_) => ErrorKind::Unauthorized,
            ApiError::ServerRejected { .. } => ErrorKind::ServerRejected,
            ApiError::Unknown(_) => ErrorKind::Unknown,
        }
    }

    /// True for the error that has already torn down the session
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }

    /// Truncate a message to avoid surfacing excessive data
    fn truncate_message(message: &str) -> String {
        if message.chars().count() <= MAX_ERROR_MESSAGE_LENGTH {
            message.to_string()
        } else {
            let truncated: String = message.chars().take(MAX_ERROR_MESSAGE_LENGTH).collect();
            format!("{}...", truncated)
        }
    }

    /// The service's `error` field, if the body carries a non-empty one
    fn server_message(body: &str) -> Option<String> {
        serde_json::from_str::<ErrorBody>(body)
            .ok()
            .and_then(|b| b.error)
            .filter(|m| !m.trim().is_empty())
            .map(|m| Self::truncate_message(&m))
    }

    /// Map a non-2xx status and its body to an error. Pure; no side effects.
    pub fn from_status(status: u16, body: &str, fallback: &str) -> Self {
        let message = Self::server_message(body).unwrap_or_else(|| fallback.to_string());
        match status {
            401 => ApiError::Unauthorized(message),
            _ => ApiError::ServerRejected { status, message },
        }
    }
}

/// Classify a response: `Ok` for 2xx, the matching error otherwise
pub fn classify(status: u16, body: &str, fallback: &str) -> Result<(), ApiError> {
    if (200..300).contains(&status) {
        Ok(())
    } else {
        Err(ApiError::from_status(status, body, fallback))
    }
}
