//! Prospecting platform HTTP client.
//!
//! [`ProspectingPlatform`] is the seam the tools depend on;
//! [`HttpPlatformClient`] talks to the platform's v2 REST API with bearer
//! auth, a 30s timeout and the shared retry policy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method};
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::PlatformError;
use super::request::{campaign_body, search_body, source_body};
use super::types::{
    Account, Campaign, EnrichmentStatus, Lead, LeadPage, ListLeadsRequest, NewCampaign, NewLead,
    SourceRequest, SourcingJob,
};
use crate::filters::{LeadCounter, SearchFilters};
use crate::retry::RetryPolicy;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// ─── ProspectingPlatform ─────────────────────────────────────────────────────

#[async_trait]
pub trait ProspectingPlatform: Send + Sync {
    async fn count_leads(&self, filters: &SearchFilters) -> Result<u64, PlatformError>;
    async fn preview_leads(&self, filters: &SearchFilters) -> Result<Vec<Lead>, PlatformError>;
    /// Start a search + enrichment job. Side effect: consumes credits.
    async fn source_leads(
        &self,
        filters: &SearchFilters,
        request: &SourceRequest,
    ) -> Result<SourcingJob, PlatformError>;
    async fn enrichment_status(&self, resource_id: &str) -> Result<EnrichmentStatus, PlatformError>;
    async fn list_leads(&self, request: &ListLeadsRequest) -> Result<LeadPage, PlatformError>;
    async fn create_lead(&self, lead: &NewLead) -> Result<Lead, PlatformError>;
    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign, PlatformError>;
    async fn activate_campaign(&self, campaign_id: &str) -> Result<(), PlatformError>;
    async fn list_campaigns(&self) -> Result<Vec<Campaign>, PlatformError>;
    async fn list_accounts(&self) -> Result<Vec<Account>, PlatformError>;
}

/// Count probe for [`crate::filters::broaden`] backed by a platform.
pub struct PlatformCounter<'a>(pub &'a dyn ProspectingPlatform);

#[async_trait]
impl LeadCounter for PlatformCounter<'_> {
    async fn count(&self, filters: &SearchFilters) -> Result<u64, PlatformError> {
        self.0.count_leads(filters).await
    }
}

// ─── HttpPlatformClient ──────────────────────────────────────────────────────

pub struct HttpPlatformClient {
    http: HttpClient,
    base_url: String,
    api_key: String,
    retry: RetryPolicy,
}

impl HttpPlatformClient {
    pub fn new(base_url: &str, api_key: &str, retry: RetryPolicy) -> Result<Self, PlatformError> {
        if api_key.trim().is_empty() {
            return Err(PlatformError::MissingCredential);
        }
        let http = HttpClient::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PlatformError::ConnectionFailed {
                endpoint: base_url.to_string(),
                reason: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            retry,
        })
    }

    /// One request with retries on 429/5xx and transport errors.
    async fn fetch<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, PlatformError> {
        let label = format!("{method} {path}");
        let text = self
            .retry
            .run(&label, PlatformError::is_retryable, || {
                self.send_once(method.clone(), path, body)
            })
            .await?;

        // Some endpoints answer with an empty body.
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| PlatformError::InvalidResponse {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<String, PlatformError> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self
            .http
            .request(method.clone(), &url)
            .bearer_auth(&self.api_key);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PlatformError::Timeout {
                    duration_secs: REQUEST_TIMEOUT.as_secs(),
                }
            } else {
                PlatformError::ConnectionFailed {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(PlatformError::HttpError {
                method: method.to_string(),
                path: path.to_string(),
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}

/// First present key among `keys`.
fn pick<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| value.get(*k))
        .find(|v| !v.is_null())
}

/// `{"items": [...]}` or a bare array.
fn items<T: DeserializeOwned>(path: &str, value: Value) -> Result<Vec<T>, PlatformError> {
    let list = match value {
        Value::Array(_) => value,
        Value::Object(mut map) => map
            .remove("items")
            .or_else(|| map.remove("leads"))
            .unwrap_or(Value::Array(Vec::new())),
        _ => Value::Array(Vec::new()),
    };
    serde_json::from_value(list).map_err(|e| PlatformError::InvalidResponse {
        path: path.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl ProspectingPlatform for HttpPlatformClient {
    async fn count_leads(&self, filters: &SearchFilters) -> Result<u64, PlatformError> {
        let path = "/supersearch-enrichment/count-leads-from-supersearch";
        let res: Value = self.fetch(Method::POST, path, Some(&search_body(filters))).await?;
        let count = pick(&res, &["number_of_leads", "count", "total_count", "total"])
            .and_then(Value::as_u64)
            .unwrap_or(0);
        tracing::debug!(count, "platform count");
        Ok(count)
    }

    async fn preview_leads(&self, filters: &SearchFilters) -> Result<Vec<Lead>, PlatformError> {
        let path = "/supersearch-enrichment/preview-leads-from-supersearch";
        let res: Value = self.fetch(Method::POST, path, Some(&search_body(filters))).await?;
        let leads: Vec<Lead> = items(path, res)?;
        tracing::debug!(count = leads.len(), "platform preview");
        Ok(leads)
    }

    async fn source_leads(
        &self,
        filters: &SearchFilters,
        request: &SourceRequest,
    ) -> Result<SourcingJob, PlatformError> {
        let path = "/supersearch-enrichment/enrich-leads-from-supersearch";
        let res: Value = self
            .fetch(Method::POST, path, Some(&source_body(filters, request)))
            .await?;
        let text = |keys: &[&str]| {
            pick(&res, keys)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let job = SourcingJob {
            id: text(&["id"]),
            resource_id: text(&["resource_id", "resourceId"]),
        };
        if job.resource_id.is_empty() {
            return Err(PlatformError::InvalidResponse {
                path: path.to_string(),
                reason: "missing resource_id".to_string(),
            });
        }
        tracing::info!(resource_id = %job.resource_id, limit = request.limit, "sourcing started");
        Ok(job)
    }

    async fn enrichment_status(&self, resource_id: &str) -> Result<EnrichmentStatus, PlatformError> {
        let path = format!("/supersearch-enrichment/{resource_id}");
        let res: Value = self.fetch(Method::GET, &path, None).await?;
        let flag = |keys: &[&str]| pick(&res, keys).and_then(Value::as_bool).unwrap_or(false);
        Ok(EnrichmentStatus {
            in_progress: flag(&["in_progress", "inProgress"]),
            exists: flag(&["exists"]),
        })
    }

    async fn list_leads(&self, request: &ListLeadsRequest) -> Result<LeadPage, PlatformError> {
        let body = serde_json::to_value(request).map_err(|e| PlatformError::InvalidResponse {
            path: "/leads/list".to_string(),
            reason: e.to_string(),
        })?;
        self.fetch(Method::POST, "/leads/list", Some(&body)).await
    }

    async fn create_lead(&self, lead: &NewLead) -> Result<Lead, PlatformError> {
        let body = serde_json::to_value(lead).map_err(|e| PlatformError::InvalidResponse {
            path: "/leads".to_string(),
            reason: e.to_string(),
        })?;
        self.fetch(Method::POST, "/leads", Some(&body)).await
    }

    async fn create_campaign(&self, campaign: &NewCampaign) -> Result<Campaign, PlatformError> {
        let created: Campaign = self
            .fetch(Method::POST, "/campaigns", Some(&campaign_body(campaign)))
            .await?;
        tracing::info!(campaign_id = %created.id, steps = campaign.steps.len(), "campaign created");
        Ok(created)
    }

    async fn activate_campaign(&self, campaign_id: &str) -> Result<(), PlatformError> {
        let path = format!("/campaigns/{campaign_id}/activate");
        let _: Value = self.fetch(Method::POST, &path, None).await?;
        tracing::info!(campaign_id, "campaign activated");
        Ok(())
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>, PlatformError> {
        let res: Value = self.fetch(Method::GET, "/campaigns", None).await?;
        items("/campaigns", res)
    }

    async fn list_accounts(&self) -> Result<Vec<Account>, PlatformError> {
        let res: Value = self.fetch(Method::GET, "/accounts", None).await?;
        items("/accounts", res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::broaden;
    use crate::testing::FakePlatform;
    use serde_json::json;

    #[test]
    fn test_missing_key_rejected() {
        let err = HttpPlatformClient::new("https://example.test", " ", RetryPolicy::default());
        assert!(matches!(err, Err(PlatformError::MissingCredential)));
    }

    #[test]
    fn test_items_accepts_both_shapes() {
        let wrapped: Vec<Account> =
            items("/accounts", json!({"items": [{"email": "a@x.io"}]})).unwrap();
        let bare: Vec<Account> = items("/accounts", json!([{"email": "b@x.io"}])).unwrap();
        assert_eq!(wrapped[0].email, "a@x.io");
        assert_eq!(bare[0].email, "b@x.io");
    }

    #[test]
    fn test_pick_skips_null() {
        let res = json!({"number_of_leads": null, "count": 4});
        assert_eq!(pick(&res, &["number_of_leads", "count"]).and_then(Value::as_u64), Some(4));
        assert!(pick(&res, &["total"]).is_none());
    }

    #[tokio::test]
    async fn test_platform_counter_drives_broaden() {
        let platform = FakePlatform::with_counts([0, 25]);
        let filters = SearchFilters {
            keyword_filter: Some("fintech".into()),
            job_titles: vec!["CTO".into()],
            ..SearchFilters::default()
        };
        let out = broaden(&filters, &PlatformCounter(&platform)).await.unwrap();
        assert_eq!(out.count, 25);
        assert!(out.filters.job_titles.is_empty());
    }
}
