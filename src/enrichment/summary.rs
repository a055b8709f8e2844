//! Structured company summary from website markdown.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::inference::{generate_json, CompletionService, InferenceError, JsonRequest, ModelRole};
use crate::usage::UsageSink;

pub const SUMMARIZE_ACTION: &str = "enrichment-summarize";

const SYSTEM_PROMPT: &str = r#"Extract structured info from this company website. Return ONLY valid JSON:
{
  "companySummary": "2-3 sentences",
  "products": ["..."],
  "targetMarket": "who they sell to",
  "valueProposition": "main pitch",
  "painPoints": ["pain point 1", "pain point 2"],
  "recentNews": [],
  "techStack": [],
  "teamSize": "estimate or null",
  "signals": ["buying signals"]
}
If something is not on the page, use null or []. Never invent facts."#;

/// What a lead's company does, as read from its website. Missing fields
/// stay empty rather than failing the summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrichmentData {
    pub company_summary: Option<String>,
    pub products: Vec<String>,
    pub target_market: Option<String>,
    pub value_proposition: Option<String>,
    pub pain_points: Vec<String>,
    pub recent_news: Vec<String>,
    pub tech_stack: Vec<String>,
    pub team_size: Option<String>,
    pub signals: Vec<String>,
}

impl EnrichmentData {
    /// Prompt section for the email drafter. Empty when nothing is known.
    pub fn prompt_section(&self) -> String {
        let mut out = String::new();
        let mut line = |label: &str, value: String| {
            if !value.trim().is_empty() {
                out.push_str(&format!("- {label}: {value}\n"));
            }
        };
        line("Summary", self.company_summary.clone().unwrap_or_default());
        line("Products", self.products.join(", "));
        line("Target market", self.target_market.clone().unwrap_or_default());
        line("Value proposition", self.value_proposition.clone().unwrap_or_default());
        line("Pain points", self.pain_points.join("; "));
        line("Recent news", self.recent_news.join("; "));
        line("Signals", self.signals.join("; "));
        out
    }
}

/// Summarize website markdown with the fast model.
pub async fn summarize_company(
    completion: &dyn CompletionService,
    usage: &Arc<dyn UsageSink>,
    workspace_id: &str,
    markdown: &str,
) -> Result<EnrichmentData, InferenceError> {
    let request = JsonRequest {
        action: SUMMARIZE_ACTION.to_string(),
        system: SYSTEM_PROMPT.to_string(),
        prompt: markdown.to_string(),
        role: ModelRole::Fast,
        temperature: None,
        max_tokens: None,
    };
    generate_json(completion, usage, workspace_id, request).await
}
