//! Cold email drafting for a three-step sequence.
//!
//! Each step follows a fixed framework: PAS opener, value-add follow-up,
//! breakup. Earlier subjects are passed in so follow-ups do not repeat them.
//! A campaign angle ([`GenerateCampaignAngle`]) and the lead's website
//! enrichment sharpen the prompt when the model passes them along.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::lead_schema;
use crate::agent::registry::{parse_args, Tool, ToolContext, ToolError};
use crate::enrichment::EnrichmentData;
use crate::inference::{generate_json, CompletionService, JsonRequest, ModelRole};
use crate::platform::Lead;
use crate::usage::UsageSink;

pub const DRAFT_ACTION: &str = "email-draft";
pub const ANGLE_ACTION: &str = "campaign-angle";

const ANGLE_TEMPERATURE: f32 = 0.5;

const ANGLE_SYSTEM_PROMPT: &str = r#"You are a B2B cold email expert. You adapt how an offer is positioned to the persona a campaign targets.

From the client's offer and the campaign's target, produce the campaign angle: the specific framing of the offer for THIS kind of prospect.

JSON only:
{
  "angleOneLiner": "one sentence: how the offer helps this persona specifically",
  "mainProblem": "the number one problem this persona has that the offer solves",
  "proofPoint": "the most relevant stat or customer story for this persona",
  "avoid": "what NOT to mention to this persona (too technical, too salesy...)",
  "tone": "the right register (technical, business, strategic, operational)"
}"#;

const SYSTEM_PROMPT: &str = "You are a world-class B2B cold email copywriter. Write concise, \
                             personalized emails that get replies.";

/// Number of emails in a sequence.
pub const SEQUENCE_STEPS: u8 = 3;

struct Framework {
    name: &'static str,
    instructions: &'static str,
    objective: &'static str,
    max_words: u32,
}

fn framework(step: u8) -> Framework {
    match step {
        1 => Framework {
            name: "Value-add",
            instructions: "Bring genuine value: an insight, a relevant resource, a case study or a \
                           benchmark. No 'just checking in' or 'following up'. Show you did your \
                           homework.",
            objective: "Position yourself as a knowledgeable peer, not a pushy seller.",
            max_words: 100,
        },
        2 => Framework {
            name: "Breakup",
            instructions: "Short and direct. Last attempt. Acknowledge they are busy. No \
                           guilt-tripping.",
            objective: "Give a final, low-pressure reason to reply.",
            max_words: 80,
        },
        _ => Framework {
            name: "PAS",
            instructions: "Use the PAS framework (Problem-Agitate-Solve). Identify a specific \
                           problem the prospect faces, make the pain concrete, then present the \
                           solution naturally.",
            objective: "Get the prospect curious enough to reply or book a call.",
            max_words: 150,
        },
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftedEmail {
    pub subject: String,
    pub body: String,
}

/// Positioning of the offer for one campaign's persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignAngle {
    pub angle_one_liner: String,
    pub main_problem: String,
    pub proof_point: String,
    pub avoid: String,
    pub tone: String,
}

fn company_pitch(pitch: &Option<String>) -> Result<&str, ToolError> {
    pitch
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .ok_or_else(|| ToolError::Failed {
            reason: "Company profile not set. Configure it in Settings first.".to_string(),
        })
}

/// Optional context layered onto a draft.
#[derive(Debug, Default)]
struct DraftContext<'a> {
    angle: Option<&'a CampaignAngle>,
    enrichment: Option<&'a EnrichmentData>,
    previous_subjects: &'a [String],
}

fn draft_prompt(pitch: &str, lead: &Lead, step: u8, context: &DraftContext<'_>) -> String {
    let fw = framework(step);
    let mut prompt = String::new();

    prompt.push_str(&format!("## Who you are\n{pitch}\n\n"));
    if let Some(angle) = context.angle {
        prompt.push_str(&format!(
            "## Campaign angle\n\
             - Angle: {}\n\
             - Main problem: {}\n\
             - Proof point: {}\n\
             - Avoid: {}\n\
             - Tone: {}\n\n",
            angle.angle_one_liner, angle.main_problem, angle.proof_point, angle.avoid, angle.tone
        ));
    }
    prompt.push_str("## The prospect\n");
    prompt.push_str(&format!(
        "- First name: {}\n",
        lead.first_name.as_deref().unwrap_or_default()
    ));
    prompt.push_str(&format!(
        "- Title: {}\n",
        lead.title.as_deref().unwrap_or("unknown")
    ));
    prompt.push_str(&format!(
        "- Company: {}\n",
        lead.company_name.as_deref().unwrap_or("unknown")
    ));
    if let Some(industry) = &lead.industry {
        prompt.push_str(&format!("- Industry: {industry}\n"));
    }
    if let Some(country) = &lead.country {
        prompt.push_str(&format!("- Country: {country}\n"));
    }
    if let Some(section) = context
        .enrichment
        .map(EnrichmentData::prompt_section)
        .filter(|s| !s.is_empty())
    {
        prompt.push_str(&format!("\n## Their company (from its website)\n{section}"));
    }

    prompt.push_str(&format!("\n## Framework ({})\n{}\n", fw.name, fw.instructions));
    prompt.push_str(&format!("\n## Objective\n{}\n", fw.objective));

    if !context.previous_subjects.is_empty() {
        prompt.push_str("\n## Previous emails (do NOT repeat)\n");
        for (i, subject) in context.previous_subjects.iter().enumerate() {
            prompt.push_str(&format!("Email {}: \"{subject}\"\n", i + 1));
        }
    }

    prompt.push_str(&format!(
        "\n## Constraints\n\
         - Max {} words. One call to action. At least one specific detail.\n\
         - No creepy flattery, no signature.\n\
         - Write in French if the prospect is in France, otherwise in English.\n\
         - Start with the first name.\n\n\
         JSON only: {{\"subject\": \"...\", \"body\": \"...\"}}",
        fw.max_words
    ));
    prompt
}

pub struct DraftEmail {
    pub completion: Arc<dyn CompletionService>,
    pub usage: Arc<dyn UsageSink>,
    pub company_pitch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DraftEmailArgs {
    lead: Lead,
    #[serde(default)]
    step: u8,
    #[serde(default)]
    previous_subjects: Vec<String>,
    #[serde(default)]
    angle: Option<CampaignAngle>,
    #[serde(default)]
    enrichment: Option<EnrichmentData>,
}

#[async_trait]
impl Tool for DraftEmail {
    fn name(&self) -> &'static str {
        "draft_email"
    }

    fn description(&self) -> &'static str {
        "Draft one personalized email of the 3-step sequence for a lead. Step 0 is a PAS opener, \
         step 1 a value-add follow-up, step 2 a breakup email. Pass the subjects of earlier steps, \
         the campaign angle and the lead's enrichment when available."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "lead": lead_schema(),
                "step": {"type": "integer", "minimum": 0, "maximum": SEQUENCE_STEPS - 1},
                "previous_subjects": {"type": "array", "items": {"type": "string"}},
                "angle": {
                    "type": "object",
                    "description": "The object returned by generate_campaign_angle."
                },
                "enrichment": {
                    "type": "object",
                    "description": "The enrichment object returned by enrich_lead."
                }
            },
            "required": ["lead", "step"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: DraftEmailArgs = parse_args(args)?;
        if args.step >= SEQUENCE_STEPS {
            return Err(ToolError::InvalidArguments {
                reason: format!("step must be between 0 and {}", SEQUENCE_STEPS - 1),
            });
        }
        let pitch = company_pitch(&self.company_pitch)?;
        let context = DraftContext {
            angle: args.angle.as_ref(),
            enrichment: args.enrichment.as_ref(),
            previous_subjects: &args.previous_subjects,
        };

        let request = JsonRequest {
            action: DRAFT_ACTION.to_string(),
            system: SYSTEM_PROMPT.to_string(),
            prompt: draft_prompt(pitch, &args.lead, args.step, &context),
            role: ModelRole::Primary,
            temperature: None,
            max_tokens: None,
        };
        let email: DraftedEmail =
            generate_json(self.completion.as_ref(), &self.usage, &ctx.workspace_id, request).await?;

        Ok(json!({
            "email": args.lead.email,
            "step": args.step,
            "framework": framework(args.step).name,
            "subject": email.subject,
            "body": email.body,
        }))
    }
}

// ─── generate_campaign_angle ─────────────────────────────────────────────────

pub struct GenerateCampaignAngle {
    pub completion: Arc<dyn CompletionService>,
    pub usage: Arc<dyn UsageSink>,
    pub company_pitch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CampaignAngleArgs {
    icp_description: String,
}

#[async_trait]
impl Tool for GenerateCampaignAngle {
    fn name(&self) -> &'static str {
        "generate_campaign_angle"
    }

    fn description(&self) -> &'static str {
        "Generate the campaign-specific positioning of the client's offer for the target persona. \
         Call after scoring and before drafting emails, show the angle to the user for \
         validation, then pass it to draft_email."
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "icp_description": {
                    "type": "string",
                    "description": "The target persona (role, industry, company size)"
                }
            },
            "required": ["icp_description"]
        })
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError> {
        let args: CampaignAngleArgs = parse_args(args)?;
        let pitch = company_pitch(&self.company_pitch)?;

        ctx.on_status("Generating campaign angle...");
        let request = JsonRequest {
            action: ANGLE_ACTION.to_string(),
            system: ANGLE_SYSTEM_PROMPT.to_string(),
            prompt: format!(
                "CLIENT OFFER:\n{pitch}\n\nTHIS CAMPAIGN'S TARGET:\n{}\n\n\
                 Adapt the offer's positioning to this specific target.",
                args.icp_description.trim()
            ),
            role: ModelRole::Primary,
            temperature: Some(ANGLE_TEMPERATURE),
            max_tokens: None,
        };
        let angle: CampaignAngle =
            generate_json(self.completion.as_ref(), &self.usage, &ctx.workspace_id, request).await?;
        serde_json::to_value(angle).map_err(|e| ToolError::Failed {
            reason: format!("could not encode the campaign angle: {e}"),
        })
    }
}
