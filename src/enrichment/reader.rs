//! Website reading through a markdown reader service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::errors::EnrichmentError;
use crate::config::EnrichmentConfig;
use crate::platform::Lead;
use crate::retry::RetryPolicy;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[async_trait]
pub trait PageReader: Send + Sync {
    /// Markdown of the page at `url`, cut to the reader's size limit.
    async fn read(&self, url: &str) -> Result<String, EnrichmentError>;
}

/// Website to read for a lead: its own, else `<company>.com`.
pub fn company_url(lead: &Lead) -> Option<String> {
    if let Some(site) = lead.website.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        return Some(site.to_string());
    }
    let company: String = lead
        .company_name
        .as_deref()?
        .to_lowercase()
        .split_whitespace()
        .collect();
    (!company.is_empty()).then(|| format!("{company}.com"))
}

fn with_scheme(url: &str) -> String {
    let url = url.trim();
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{url}")
    }
}

// ─── JinaReader ──────────────────────────────────────────────────────────────

/// Jina Reader: `GET {base}/{target}` answers with the page as markdown.
pub struct JinaReader {
    http: HttpClient,
    base_url: String,
    api_key: Option<String>,
    max_chars: usize,
    retry: RetryPolicy,
}

impl JinaReader {
    pub fn new(config: &EnrichmentConfig, retry: RetryPolicy) -> Result<Self, EnrichmentError> {
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| EnrichmentError::ConnectionFailed {
                url: config.reader_url.clone(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: config.reader_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            max_chars: config.max_chars,
            retry,
        })
    }

    fn reader_url(&self, target: &str) -> String {
        format!("{}/{}", self.base_url, with_scheme(target))
    }

    async fn read_once(&self, url: &str) -> Result<String, EnrichmentError> {
        let mut request = self.http.get(url).header("Accept", "text/plain");
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                EnrichmentError::Timeout {
                    duration_secs: REQUEST_TIMEOUT.as_secs(),
                }
            } else {
                EnrichmentError::ConnectionFailed {
                    url: url.to_string(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(EnrichmentError::HttpError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        response
            .text()
            .await
            .map_err(|e| EnrichmentError::ConnectionFailed {
                url: url.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl PageReader for JinaReader {
    async fn read(&self, url: &str) -> Result<String, EnrichmentError> {
        let reader_url = self.reader_url(url);
        let label = format!("GET {reader_url}");
        let text = self
            .retry
            .run(&label, EnrichmentError::is_retryable, || self.read_once(&reader_url))
            .await?;

        let text = text.trim();
        if text.is_empty() {
            return Err(EnrichmentError::EmptyPage {
                url: with_scheme(url),
            });
        }
        let markdown: String = text.chars().take(self.max_chars).collect();
        tracing::debug!(url, chars = markdown.chars().count(), "page read");
        Ok(markdown)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lead(website: Option<&str>, company: Option<&str>) -> Lead {
        Lead {
            website: website.map(str::to_string),
            company_name: company.map(str::to_string),
            ..Lead::default()
        }
    }

    #[test]
    fn test_company_url_prefers_website() {
        assert_eq!(
            company_url(&lead(Some(" https://acme.io "), Some("Acme"))).as_deref(),
            Some("https://acme.io")
        );
        assert_eq!(
            company_url(&lead(None, Some("Blue Rocket Labs"))).as_deref(),
            Some("bluerocketlabs.com")
        );
        assert_eq!(company_url(&lead(Some(""), Some("  "))), None);
        assert_eq!(company_url(&lead(None, None)), None);
    }

    #[test]
    fn test_reader_url_adds_scheme() {
        let config = EnrichmentConfig {
            reader_url: "https://r.jina.ai/".into(),
            ..EnrichmentConfig::default()
        };
        let reader = JinaReader::new(&config, RetryPolicy::default()).unwrap();
        assert_eq!(reader.reader_url("acme.io"), "https://r.jina.ai/https://acme.io");
        assert_eq!(
            reader.reader_url("http://acme.io/about"),
            "https://r.jina.ai/http://acme.io/about"
        );
    }

    #[test]
    fn test_blank_api_key_ignored() {
        let config = EnrichmentConfig {
            api_key: Some("  ".into()),
            ..EnrichmentConfig::default()
        };
        let reader = JinaReader::new(&config, RetryPolicy::default()).unwrap();
        assert!(reader.api_key.is_none());
    }
}
