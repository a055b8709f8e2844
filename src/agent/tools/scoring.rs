//! ICP fit scoring of a single lead.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::lead_schema;
use crate::agent::registry::{parse_args, Tool, ToolContext, ToolError};
use crate::inference::{generate_json, CompletionService, JsonRequest, ModelRole};
use crate::platform::Lead;
use crate::usage::UsageSink;

pub const SCORE_ACTION: &str = "icp-scoring";

/// Leads scoring at or above this are worth enriching.
pub const QUALIFIED_SCORE: u8 = 5;

const SYSTEM_PROMPT: &str = "You are an ICP scoring engine. Score 1-10 with breakdown.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub job_title_fit: u8,
    pub company_fit: u8,
    pub industry_relevance: u8,
    pub location_fit: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IcpScore {
    pub score: u8,
    pub breakdown: ScoreBreakdown,
    pub reason: String,
}

impl IcpScore {
    /// Pull every score into 1..=10.
    fn clamped(mut self) -> Self {
        let clamp = |v: &mut u8| *v = (*v).clamp(1, 10);
        clamp(&mut self.score);
        clamp(&mut self.breakdown.job_title_fit);
        clamp(&mut self.breakdown.company_fit);
        clamp(&mut self.breakdown.industry_relevance);
        clamp(&mut self.breakdown.location_fit);
        self
    }
}

fn or_unknown(value: &Option<String>) -> &str {
    value.as_deref().filter(|v| !v.trim().is_empty()).unwrap_or("unknown")
}

fn scoring_prompt(icp: &str, lead: &Lead) -> String {
    format!(
        "ICP: {icp}\n\n\
         Lead:\n\
         - Name: {name}\n\
         - Job Title: {title}\n\
         - Company: {company}\n\
         - Industry: {industry}\n\
         - Company Size: {size}\n\
         - Location: {country}\n\n\
         Score this lead 1-10. JSON: {{\"score\": N, \"breakdown\": {{\"jobTitleFit\": N, \
         \"companyFit\": N, \"industryRelevance\": N, \"locationFit\": N}}, \"reason\": \"one sentence\"}}",
        name = lead.full_name(),
        title = or_unknown(&lead.title),
        company = or_unknown(&lead.company_name),
        industry = or_unknown(&lead.industry),
        size = or_unknown(&lead.company_size),
        country = or_unknown(&lead.country),
    )
}

pub struct ScoreLead {
    pub completion: Arc<dyn CompletionService>,
    pub usage: Arc<dyn UsageSink>,
}

#[derive(Debug, Deserialize)]
struct ScoreLeadArgs {
    icp_description: String,
    lead: Lead,
}

#[async_trait]
impl Tool for ScoreLead {
    fn name(&self) -> &'static str {
        "score_lead"
    }

    fn description(&self) -> &'static str {
        "Score a lead 1-10 against the ICP description, with a breakdown by job title, company, \
         industry and location. Leads scoring 5 or more are qualified."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "icp_description": {"type": "string"},
                "lead": lead_schema()
            },
            "required": ["icp_description", "lead"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: ScoreLeadArgs = parse_args(args)?;
        let request = JsonRequest {
            action: SCORE_ACTION.to_string(),
            system: SYSTEM_PROMPT.to_string(),
            prompt: scoring_prompt(&args.icp_description, &args.lead),
            role: ModelRole::Fast,
            temperature: None,
            max_tokens: None,
        };
        let score: IcpScore =
            generate_json(self.completion.as_ref(), &self.usage, &ctx.workspace_id, request).await?;
        let score = score.clamped();

        Ok(json!({
            "email": args.lead.email,
            "score": score.score,
            "qualified": score.score >= QUALIFIED_SCORE,
            "breakdown": score.breakdown,
            "reason": score.reason,
        }))
    }
}
