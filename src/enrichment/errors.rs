//! Enrichment error types.

use thiserror::Error;

use crate::retry::is_retryable_status;

#[derive(Debug, Error)]
pub enum EnrichmentError {
    /// Neither a website nor a company name to derive one from.
    #[error("lead has no website or company name")]
    NoWebsite,

    #[error("connection failed to {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("reader timeout after {duration_secs}s")]
    Timeout { duration_secs: u64 },

    #[error("reading {url} failed ({status})")]
    HttpError { url: String, status: u16 },

    /// The page came back without any readable text.
    #[error("no readable content at {url}")]
    EmptyPage { url: String },
}

impl EnrichmentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            EnrichmentError::ConnectionFailed { .. } | EnrichmentError::Timeout { .. } => true,
            EnrichmentError::HttpError { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            EnrichmentError::NoWebsite => {
                "This lead has no website to read. Skip it or add the company website.".to_string()
            }
            other => format!("Could not read the company website: {other}"),
        }
    }
}
