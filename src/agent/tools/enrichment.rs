//! Website enrichment of a qualified lead.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::lead_schema;
use super::scoring::QUALIFIED_SCORE;
use crate::agent::registry::{parse_args, Tool, ToolContext, ToolError};
use crate::enrichment::{company_url, summarize_company, EnrichmentError, PageReader};
use crate::inference::CompletionService;
use crate::platform::Lead;
use crate::usage::UsageSink;

pub struct EnrichLead {
    pub reader: Arc<dyn PageReader>,
    pub completion: Arc<dyn CompletionService>,
    pub usage: Arc<dyn UsageSink>,
}

#[derive(Debug, Deserialize)]
struct EnrichLeadArgs {
    lead: Lead,
    /// Score from `score_lead`, when the lead was scored.
    #[serde(default)]
    score: Option<u8>,
}

#[async_trait]
impl Tool for EnrichLead {
    fn name(&self) -> &'static str {
        "enrich_lead"
    }

    fn description(&self) -> &'static str {
        "Read a qualified lead's company website and summarize it (products, target market, \
         pain points, buying signals). Call after score_lead and before draft_email, then pass \
         the enrichment to draft_email. Leads scoring below 5 are skipped."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "lead": lead_schema(),
                "score": {"type": "integer", "minimum": 1, "maximum": 10}
            },
            "required": ["lead"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: EnrichLeadArgs = parse_args(args)?;
        if let Some(score) = args.score.filter(|s| *s < QUALIFIED_SCORE) {
            return Ok(json!({
                "email": args.lead.email,
                "skipped": true,
                "reason": format!("score {score} is below {QUALIFIED_SCORE}"),
            }));
        }

        let url = company_url(&args.lead).ok_or(EnrichmentError::NoWebsite)?;
        ctx.on_status(format!("Reading {url}..."));
        let markdown = self.reader.read(&url).await?;

        ctx.on_status("Summarizing company context...");
        let enrichment =
            summarize_company(self.completion.as_ref(), &self.usage, &ctx.workspace_id, &markdown)
                .await?;
        tracing::info!(url = %url, chars = markdown.chars().count(), "lead enriched");

        Ok(json!({
            "email": args.lead.email,
            "website": url,
            "enrichment": enrichment,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{PageScript, RecordingUsageSink, ScriptedCompletion, ScriptedReader};
    use tokio::sync::mpsc;

    fn tool(reader: Arc<ScriptedReader>, completion: Arc<ScriptedCompletion>) -> EnrichLead {
        EnrichLead {
            reader,
            completion,
            usage: Arc::new(RecordingUsageSink::default()),
        }
    }

    #[tokio::test]
    async fn test_enrich_reads_site_and_summarizes() {
        let reader = Arc::new(ScriptedReader::new([PageScript::Page(
            "# Acme\nBilling automation for SaaS finance teams.".into(),
        )]));
        let completion = Arc::new(ScriptedCompletion::default().with_json(
            r#"{"companySummary": "Acme automates SaaS billing.", "painPoints": ["failed payments"]}"#,
        ));
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ctx = ToolContext::new("ws_1", "u").with_status(tx);

        let out = tool(reader.clone(), completion.clone())
            .execute(
                json!({"lead": {"email": "jane@acme.io", "company_name": "Acme"}, "score": 8}),
                &ctx,
            )
            .await
            .unwrap();

        assert_eq!(reader.requested(), vec!["acme.com"]);
        assert_eq!(out["website"], json!("acme.com"));
        assert_eq!(out["enrichment"]["companySummary"], json!("Acme automates SaaS billing."));
        assert_eq!(out["enrichment"]["painPoints"], json!(["failed payments"]));
        assert!(completion.json_requests()[0].prompt.contains("Billing automation"));

        assert_eq!(rx.recv().await.as_deref(), Some("Reading acme.com..."));
        assert_eq!(rx.recv().await.as_deref(), Some("Summarizing company context..."));
    }

    #[tokio::test]
    async fn test_low_score_skipped_without_reading() {
        let reader = Arc::new(ScriptedReader::default());
        let out = tool(reader.clone(), Arc::new(ScriptedCompletion::default()))
            .execute(
                json!({"lead": {"website": "https://acme.io"}, "score": 3}),
                &ToolContext::new("ws_1", "u"),
            )
            .await
            .unwrap();
        assert_eq!(out["skipped"], json!(true));
        assert!(reader.requested().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_site_is_tool_error() {
        let reader = Arc::new(ScriptedReader::new([PageScript::Error(404)]));
        let err = tool(reader, Arc::new(ScriptedCompletion::default()))
            .execute(
                json!({"lead": {"website": "https://acme.io"}}),
                &ToolContext::new("ws_1", "u"),
            )
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ToolError::Enrichment(EnrichmentError::HttpError { status: 404, .. })
        ));
        assert!(crate::agent::format_error_for_user(&err).starts_with("Could not read the company website"));
    }

    #[tokio::test]
    async fn test_lead_without_site_or_company() {
        let err = tool(Arc::new(ScriptedReader::default()), Arc::new(ScriptedCompletion::default()))
            .execute(json!({"lead": {"email": "x@y.z"}}), &ToolContext::new("ws_1", "u"))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Enrichment(EnrichmentError::NoWebsite)));
    }
}
