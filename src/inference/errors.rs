//! Inference error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility; these types carry the context needed to
//! build meaningful log entries.

use thiserror::Error;

use crate::retry::is_retryable_status;

/// Characters of offending model output kept in an [`InferenceError::InvalidJson`].
const SAMPLE_CHARS: usize = 200;

/// Errors that can occur during inference operations.
#[derive(Debug, Error)]
pub enum InferenceError {
    /// TCP/HTTP connection to the model endpoint failed.
    #[error("connection failed to {endpoint}: {reason}")]
    ConnectionFailed { endpoint: String, reason: String },

    /// The model endpoint did not respond within the configured timeout.
    #[error("inference timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    /// Non-2xx HTTP response from the model endpoint.
    #[error("HTTP {status}: {body}")]
    HttpError { status: u16, body: String },

    /// SSE stream parsing or chunk-level error.
    #[error("stream error: {reason}")]
    StreamError { reason: String },

    /// A structured JSON call returned text that does not parse into the
    /// expected shape.
    #[error("invalid JSON from {action}: {sample}")]
    InvalidJson { action: String, sample: String },
}

impl InferenceError {
    pub fn invalid_json(action: &str, text: &str) -> Self {
        InferenceError::InvalidJson {
            action: action.to_string(),
            sample: text.chars().take(SAMPLE_CHARS).collect(),
        }
    }

    /// Transport failures, rate limiting and server errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            InferenceError::ConnectionFailed { .. } | InferenceError::Timeout { .. } => true,
            InferenceError::HttpError { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, InferenceError::HttpError { status: 429, .. })
    }

    /// Short message safe to show the end user.
    pub fn user_message(&self) -> String {
        match self {
            e if e.is_rate_limited() => "Rate limit reached. Retrying shortly...".to_string(),
            InferenceError::Timeout { .. } => "The model took too long to respond.".to_string(),
            InferenceError::InvalidJson { .. } => {
                "The model returned an unexpected response.".to_string()
            }
            _ => "The model service is unavailable right now.".to_string(),
        }
    }
}
