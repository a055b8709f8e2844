//! Prospecting platform error types.

use thiserror::Error;

use crate::retry::is_retryable_status;

#[derive(Debug, Error)]
pub enum PlatformError {
    /// The workspace has no platform API key configured.
    #[error("no platform API key configured for this workspace")]
    MissingCredential,

    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    #[error("platform timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Non-2xx response.
    #[error("{method} {path} failed ({status}): {body}")]
    HttpError {
        method: String,
        path: String,
        status: u16,
        body: String,
    },

    /// 2xx response whose body is not the expected shape.
    #[error("unexpected response from {path}: {reason}")]
    InvalidResponse { path: String, reason: String },
}

impl PlatformError {
    pub fn status(&self) -> Option<u16> {
        match self {
            PlatformError::HttpError { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            PlatformError::ConnectionFailed { .. } | PlatformError::Timeout { .. } => true,
            PlatformError::HttpError { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    /// Short message safe to show the end user (and the model).
    pub fn user_message(&self) -> String {
        match self {
            PlatformError::MissingCredential => {
                "No prospecting platform is connected. Connect it in Settings.".to_string()
            }
            PlatformError::HttpError { status: 401, .. } => {
                "The prospecting platform rejected the API key. Reconnect the integration in Settings."
                    .to_string()
            }
            PlatformError::HttpError { status: 429, .. } => {
                "Rate limit reached. Retrying shortly...".to_string()
            }
            other => format!("Prospecting platform error: {other}"),
        }
    }
}
