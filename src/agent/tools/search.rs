//! Lead search tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{filters_schema, SourcingPolicy};
use crate::agent::registry::{parse_args, Tool, ToolContext, ToolError};
use crate::filters::{broaden, coerce, FilterCompiler};
use crate::platform::{ListLeadsRequest, PlatformCounter, ProspectingPlatform, SourceRequest};

/// Leads shown by a preview.
const PREVIEW_LIMIT: usize = 5;

/// Largest sourcing job accepted in one call.
const MAX_SOURCE_LIMIT: u32 = 10_000;

/// Page size when fetching sourced leads.
const FETCH_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
struct FiltersArgs {
    #[serde(default)]
    search_filters: Value,
}

// ─── parse_icp ───────────────────────────────────────────────────────────────

pub struct ParseIcp {
    pub compiler: Arc<FilterCompiler>,
}

#[derive(Debug, Deserialize)]
struct ParseIcpArgs {
    description: String,
}

#[async_trait]
impl Tool for ParseIcp {
    fn name(&self) -> &'static str {
        "parse_icp"
    }

    fn description(&self) -> &'static str {
        "Parse a natural language ICP description into lead search filters. ALWAYS call this \
         FIRST before count_leads, preview_leads or source_leads. Returns { search_filters } to \
         pass directly to the other tools."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "The user's ICP description in natural language"
                }
            },
            "required": ["description"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: ParseIcpArgs = parse_args(args)?;
        let filters = self.compiler.compile(&args.description, &ctx.workspace_id).await;
        Ok(json!({ "search_filters": filters }))
    }
}

// ─── count_leads ─────────────────────────────────────────────────────────────

pub struct CountLeads {
    pub platform: Arc<dyn ProspectingPlatform>,
}

#[async_trait]
impl Tool for CountLeads {
    fn name(&self) -> &'static str {
        "count_leads"
    }

    fn description(&self) -> &'static str {
        "Estimate the number of leads available for given search filters. When nothing matches, \
         the filters are broadened automatically and the broadened search_filters are returned."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "search_filters": filters_schema() },
            "required": ["search_filters"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: FiltersArgs = parse_args(args)?;
        let filters = coerce(args.search_filters);

        let count = self.platform.count_leads(&filters).await?;
        if count > 0 {
            return Ok(json!({ "count": count }));
        }

        ctx.on_status("No exact matches, broadening the search...");
        let broadened = broaden(&filters, &PlatformCounter(self.platform.as_ref())).await?;
        tracing::info!(
            count = broadened.count,
            relaxed = ?broadened.relaxed,
            exhausted = broadened.exhausted,
            "count broadened"
        );
        Ok(json!({
            "count": broadened.count,
            "original_count": 0,
            "relaxed": broadened.relaxed,
            "exhausted": broadened.exhausted,
            "search_filters": broadened.filters,
        }))
    }
}

// ─── preview_leads ───────────────────────────────────────────────────────────

pub struct PreviewLeads {
    pub platform: Arc<dyn ProspectingPlatform>,
}

#[async_trait]
impl Tool for PreviewLeads {
    fn name(&self) -> &'static str {
        "preview_leads"
    }

    fn description(&self) -> &'static str {
        "Preview up to 5 sample leads for given search filters. Uses no credits."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "search_filters": filters_schema() },
            "required": ["search_filters"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: FiltersArgs = parse_args(args)?;
        let filters = coerce(args.search_filters);
        let mut leads = self.platform.preview_leads(&filters).await?;
        leads.truncate(PREVIEW_LIMIT);
        Ok(json!({ "leads": leads }))
    }
}

// ─── source_leads ────────────────────────────────────────────────────────────

pub struct SourceLeads {
    pub platform: Arc<dyn ProspectingPlatform>,
    pub policy: SourcingPolicy,
}

#[derive(Debug, Deserialize)]
struct SourceLeadsArgs {
    #[serde(default)]
    search_filters: Value,
    limit: u32,
    search_name: String,
    list_name: String,
}

#[async_trait]
impl Tool for SourceLeads {
    fn name(&self) -> &'static str {
        "source_leads"
    }

    fn description(&self) -> &'static str {
        "Source and enrich leads matching the search filters into a new lead list. This uses the \
         client's credits: only call it after the user confirmed."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "search_filters": filters_schema(),
                "limit": {"type": "integer", "minimum": 1, "maximum": MAX_SOURCE_LIMIT},
                "search_name": {"type": "string"},
                "list_name": {"type": "string"}
            },
            "required": ["search_filters", "limit", "search_name", "list_name"]
        })
    }

    fn is_side_effect(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: SourceLeadsArgs = parse_args(args)?;
        if !(1..=MAX_SOURCE_LIMIT).contains(&args.limit) {
            return Err(ToolError::InvalidArguments {
                reason: format!("limit must be between 1 and {MAX_SOURCE_LIMIT}"),
            });
        }
        let filters = coerce(args.search_filters);
        let request = SourceRequest {
            limit: args.limit,
            search_name: args.search_name,
            list_name: args.list_name,
            work_email_enrichment: true,
        };

        ctx.on_status("Launching SuperSearch sourcing...");
        let job = self.platform.source_leads(&filters, &request).await?;

        let mut complete = false;
        for _ in 0..self.policy.max_polls {
            tokio::time::sleep(self.policy.poll_interval).await;
            let status = self.platform.enrichment_status(&job.resource_id).await?;
            if !status.in_progress {
                complete = true;
                break;
            }
            ctx.on_status("Sourcing in progress...");
        }
        if !complete {
            tracing::warn!(
                resource_id = %job.resource_id,
                polls = self.policy.max_polls,
                "sourcing still running, returning partial results"
            );
        }

        ctx.on_status("Fetching sourced leads...");
        let page = self
            .platform
            .list_leads(&ListLeadsRequest {
                list_id: Some(job.resource_id.clone()),
                limit: args.limit.min(FETCH_PAGE_SIZE),
                ..ListLeadsRequest::default()
            })
            .await?;

        Ok(json!({
            "sourced": page.items.len(),
            "list_id": job.resource_id,
            "complete": complete,
            "leads": page.items,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::filters::schema::Industry;
    use crate::filters::SearchFilters;
    use crate::platform::Lead;
    use crate::testing::FakePlatform;

    fn policy() -> SourcingPolicy {
        SourcingPolicy {
            poll_interval: Duration::ZERO,
            max_polls: 3,
        }
    }

    fn lead(email: &str) -> Lead {
        Lead {
            email: Some(email.into()),
            ..Lead::default()
        }
    }

    fn filters_arg() -> Value {
        json!({
            "search_filters": {
                "industries": ["SaaS"],
                "keyword_filter": "crm",
                "job_titles": ["CTO"]
            }
        })
    }

    #[tokio::test]
    async fn test_count_without_relaxation() {
        let platform = Arc::new(FakePlatform::with_counts([42]));
        let tool = CountLeads {
            platform: platform.clone(),
        };
        let out = tool.execute(filters_arg(), &ToolContext::new("ws", "u")).await.unwrap();
        assert_eq!(out, json!({"count": 42}));

        // Arguments are repaired before the call.
        let sent = platform.counted();
        assert_eq!(sent[0].industries, vec![Industry::SoftwareInternet]);
    }

    #[tokio::test]
    async fn test_zero_count_broadens() {
        let platform = Arc::new(FakePlatform::with_counts([0, 0, 9]));
        let tool = CountLeads {
            platform: platform.clone(),
        };
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let ctx = ToolContext::new("ws", "u").with_status(tx);

        let out = tool.execute(filters_arg(), &ctx).await.unwrap();
        assert_eq!(out["count"], json!(9));
        assert_eq!(out["relaxed"], json!(["extras", "job_titles"]));
        assert_eq!(out["exhausted"], json!(false));
        let filters: SearchFilters = serde_json::from_value(out["search_filters"].clone()).unwrap();
        assert!(filters.job_titles.is_empty());
        assert!(filters.keyword_filter.is_none());
        assert_eq!(filters.industries, vec![Industry::SoftwareInternet]);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_preview_caps_at_five() {
        let leads: Vec<Lead> = (0..8).map(|i| lead(&format!("l{i}@x.io"))).collect();
        let tool = PreviewLeads {
            platform: Arc::new(FakePlatform::default().with_preview(leads)),
        };
        let out = tool.execute(filters_arg(), &ToolContext::new("ws", "u")).await.unwrap();
        assert_eq!(out["leads"].as_array().unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_source_polls_until_done() {
        let platform = Arc::new(
            FakePlatform::default().with_sourcing(2, vec![lead("a@x.io"), lead("b@x.io")]),
        );
        let tool = SourceLeads {
            platform: platform.clone(),
            policy: policy(),
        };
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let ctx = ToolContext::new("ws", "u").with_status(tx);
        let mut args = filters_arg();
        args["limit"] = json!(50);
        args["search_name"] = json!("CTO search");
        args["list_name"] = json!("CTO list");

        let out = tool.execute(args, &ctx).await.unwrap();
        assert_eq!(out["sourced"], json!(2));
        assert_eq!(out["list_id"], json!("list_1"));
        assert_eq!(out["complete"], json!(true));
        assert_eq!(platform.status_polls(), 3);

        let mut labels = Vec::new();
        while let Ok(label) = rx.try_recv() {
            labels.push(label);
        }
        assert_eq!(
            labels,
            vec![
                "Launching SuperSearch sourcing...",
                "Sourcing in progress...",
                "Sourcing in progress...",
                "Fetching sourced leads...",
            ]
        );
    }

    #[tokio::test]
    async fn test_source_gives_up_polling() {
        let platform = Arc::new(FakePlatform::default().with_sourcing(10, vec![lead("a@x.io")]));
        let tool = SourceLeads {
            platform: platform.clone(),
            policy: policy(),
        };
        let mut args = filters_arg();
        args["limit"] = json!(10);
        args["search_name"] = json!("s");
        args["list_name"] = json!("l");

        let out = tool.execute(args, &ToolContext::new("ws", "u")).await.unwrap();
        assert_eq!(out["complete"], json!(false));
        assert_eq!(platform.status_polls(), 3);
    }

    #[tokio::test]
    async fn test_source_rejects_bad_limit() {
        let tool = SourceLeads {
            platform: Arc::new(FakePlatform::default()),
            policy: policy(),
        };
        let mut args = filters_arg();
        args["limit"] = json!(0);
        args["search_name"] = json!("s");
        args["list_name"] = json!("l");

        let err = tool.execute(args, &ToolContext::new("ws", "u")).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments { .. }));
    }
}
