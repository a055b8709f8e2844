//! Campaign tools: create, push leads, activate, list sending accounts.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::agent::registry::{parse_args, Tool, ToolContext, ToolError};
use crate::platform::{CampaignStep, NewCampaign, NewLead, ProspectingPlatform, DEFAULT_TIMEZONE};

// ─── create_campaign ─────────────────────────────────────────────────────────

pub struct CreateCampaign {
    pub platform: Arc<dyn ProspectingPlatform>,
}

#[derive(Debug, Deserialize)]
struct CreateCampaignArgs {
    name: String,
    steps: Vec<CampaignStep>,
    #[serde(default)]
    daily_limit: Option<u32>,
    #[serde(default)]
    email_accounts: Vec<String>,
    #[serde(default)]
    timezone: Option<String>,
}

#[async_trait]
impl Tool for CreateCampaign {
    fn name(&self) -> &'static str {
        "create_campaign"
    }

    fn description(&self) -> &'static str {
        "Create a new draft campaign with an email sequence. It does not send anything until \
         activated."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "name": {"type": "string"},
                "steps": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "subject": {"type": "string"},
                            "body": {"type": "string"},
                            "delay": {"type": "integer", "description": "Days after the previous step"}
                        },
                        "required": ["body"]
                    }
                },
                "daily_limit": {"type": "integer"},
                "email_accounts": {"type": "array", "items": {"type": "string"}},
                "timezone": {"type": "string"}
            },
            "required": ["name", "steps"]
        })
    }

    fn is_side_effect(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: CreateCampaignArgs = parse_args(args)?;
        if args.steps.is_empty() {
            return Err(ToolError::InvalidArguments {
                reason: "a campaign needs at least one step".to_string(),
            });
        }
        let campaign = NewCampaign {
            name: args.name,
            steps: args.steps,
            daily_limit: args.daily_limit,
            email_list: args.email_accounts,
            timezone: args.timezone.unwrap_or_else(|| DEFAULT_TIMEZONE.to_string()),
        };
        let created = self.platform.create_campaign(&campaign).await?;
        Ok(json!({
            "campaign_id": created.id,
            "name": created.name,
            "steps": campaign.steps.len(),
            "status": "draft",
        }))
    }
}

// ─── add_leads_to_campaign ───────────────────────────────────────────────────

pub struct AddLeadsToCampaign {
    pub platform: Arc<dyn ProspectingPlatform>,
}

#[derive(Debug, Deserialize)]
struct DraftRef {
    step: u32,
    subject: String,
    body: String,
}

#[derive(Debug, Deserialize)]
struct LeadWithDrafts {
    email: String,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    company_name: Option<String>,
    #[serde(default)]
    emails: Vec<DraftRef>,
}

#[derive(Debug, Deserialize)]
struct AddLeadsArgs {
    campaign_id: String,
    leads: Vec<LeadWithDrafts>,
}

/// Drafted emails become `email_step_N_subject` / `email_step_N_body`.
fn custom_variables(drafts: &[DraftRef]) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    for draft in drafts {
        vars.insert(format!("email_step_{}_subject", draft.step), draft.subject.clone());
        vars.insert(format!("email_step_{}_body", draft.step), draft.body.clone());
    }
    vars
}

#[async_trait]
impl Tool for AddLeadsToCampaign {
    fn name(&self) -> &'static str {
        "add_leads_to_campaign"
    }

    fn description(&self) -> &'static str {
        "Add leads to a campaign, with their drafted emails as custom variables."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "campaign_id": {"type": "string"},
                "leads": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "email": {"type": "string"},
                            "first_name": {"type": "string"},
                            "last_name": {"type": "string"},
                            "company_name": {"type": "string"},
                            "emails": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "step": {"type": "integer"},
                                        "subject": {"type": "string"},
                                        "body": {"type": "string"}
                                    },
                                    "required": ["step", "subject", "body"]
                                }
                            }
                        },
                        "required": ["email"]
                    }
                }
            },
            "required": ["campaign_id", "leads"]
        })
    }

    fn is_side_effect(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: AddLeadsArgs = parse_args(args)?;
        ctx.on_status("Adding leads to campaign...");

        let mut added = 0usize;
        let mut failed = Vec::new();
        for lead in args.leads {
            let new_lead = NewLead {
                custom_variables: custom_variables(&lead.emails),
                email: lead.email,
                first_name: lead.first_name,
                last_name: lead.last_name,
                company_name: lead.company_name,
                campaign: Some(args.campaign_id.clone()),
            };
            // One bad lead must not stop the batch.
            match self.platform.create_lead(&new_lead).await {
                Ok(_) => added += 1,
                Err(e) => {
                    tracing::warn!(campaign_id = %args.campaign_id, error = %e, "lead push failed");
                    failed.push(json!({ "email": new_lead.email, "error": e.user_message() }));
                }
            }
        }

        Ok(json!({ "added": added, "failed": failed }))
    }
}

// ─── activate_campaign ───────────────────────────────────────────────────────

pub struct ActivateCampaign {
    pub platform: Arc<dyn ProspectingPlatform>,
}

#[derive(Debug, Deserialize)]
struct CampaignIdArgs {
    campaign_id: String,
}

#[async_trait]
impl Tool for ActivateCampaign {
    fn name(&self) -> &'static str {
        "activate_campaign"
    }

    fn description(&self) -> &'static str {
        "Activate a campaign. Emails will start sending. Only call this when the user explicitly \
         asks for it."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": { "campaign_id": {"type": "string"} },
            "required": ["campaign_id"]
        })
    }

    fn is_side_effect(&self) -> bool {
        true
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: CampaignIdArgs = parse_args(args)?;
        self.platform.activate_campaign(&args.campaign_id).await?;
        Ok(json!({ "activated": true, "campaign_id": args.campaign_id }))
    }
}

// ─── list_accounts ───────────────────────────────────────────────────────────

pub struct ListAccounts {
    pub platform: Arc<dyn ProspectingPlatform>,
}

#[async_trait]
impl Tool for ListAccounts {
    fn name(&self) -> &'static str {
        "list_accounts"
    }

    fn description(&self) -> &'static str {
        "List the sending email accounts connected to the platform."
    }

    fn parameters(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<Value, ToolError> {
        let accounts = self.platform.list_accounts().await?;
        Ok(json!({ "accounts": accounts }))
    }
}
