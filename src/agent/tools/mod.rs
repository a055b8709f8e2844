//! The prospecting tool set.
//!
//! - [`search`]: ICP parsing, counting with relaxation, preview, sourcing
//! - [`scoring`]: lead scoring against the ICP
//! - [`enrichment`]: website summary of a qualified lead
//! - [`drafting`]: campaign angle and sequence email drafting
//! - [`campaign`]: campaign creation, lead push, activation, accounts
//!
//! Platform-backed tools are only registered when the workspace has a
//! platform credential, and `enrich_lead` only with a page reader.

pub mod campaign;
pub mod drafting;
pub mod enrichment;
pub mod scoring;
pub mod search;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use super::registry::{Tool, ToolRegistry};
use crate::config::PlatformConfig;
use crate::enrichment::PageReader;
use crate::filters::FilterCompiler;
use crate::inference::CompletionService;
use crate::platform::ProspectingPlatform;
use crate::usage::UsageSink;

/// How sourcing jobs are polled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourcingPolicy {
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl From<&PlatformConfig> for SourcingPolicy {
    fn from(config: &PlatformConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            max_polls: config.max_polls.max(1),
        }
    }
}

/// Everything the tools of one request need.
#[derive(Clone)]
pub struct ToolDeps {
    pub completion: Arc<dyn CompletionService>,
    pub usage: Arc<dyn UsageSink>,
    /// `None` when the workspace has not connected the platform.
    pub platform: Option<Arc<dyn ProspectingPlatform>>,
    /// `None` disables website enrichment.
    pub reader: Option<Arc<dyn PageReader>>,
    pub sourcing: SourcingPolicy,
    /// What the workspace sells; drafting refuses to run without it.
    pub company_pitch: Option<String>,
}

/// Assemble the registry for one request.
pub fn build_registry(deps: &ToolDeps) -> ToolRegistry {
    let compiler = Arc::new(FilterCompiler::new(deps.completion.clone(), deps.usage.clone()));

    let mut tools: Vec<Arc<dyn Tool>> = vec![Arc::new(search::ParseIcp { compiler })];

    if let Some(platform) = &deps.platform {
        tools.push(Arc::new(search::CountLeads {
            platform: platform.clone(),
        }));
        tools.push(Arc::new(search::PreviewLeads {
            platform: platform.clone(),
        }));
        tools.push(Arc::new(search::SourceLeads {
            platform: platform.clone(),
            policy: deps.sourcing,
        }));
    }

    tools.push(Arc::new(scoring::ScoreLead {
        completion: deps.completion.clone(),
        usage: deps.usage.clone(),
    }));
    if let Some(reader) = &deps.reader {
        tools.push(Arc::new(enrichment::EnrichLead {
            reader: reader.clone(),
            completion: deps.completion.clone(),
            usage: deps.usage.clone(),
        }));
    }
    tools.push(Arc::new(drafting::GenerateCampaignAngle {
        completion: deps.completion.clone(),
        usage: deps.usage.clone(),
        company_pitch: deps.company_pitch.clone(),
    }));
    tools.push(Arc::new(drafting::DraftEmail {
        completion: deps.completion.clone(),
        usage: deps.usage.clone(),
        company_pitch: deps.company_pitch.clone(),
    }));

    if let Some(platform) = &deps.platform {
        tools.push(Arc::new(campaign::CreateCampaign {
            platform: platform.clone(),
        }));
        tools.push(Arc::new(campaign::AddLeadsToCampaign {
            platform: platform.clone(),
        }));
        tools.push(Arc::new(campaign::ActivateCampaign {
            platform: platform.clone(),
        }));
        tools.push(Arc::new(campaign::ListAccounts {
            platform: platform.clone(),
        }));
    }

    let registry = ToolRegistry::new(tools);
    tracing::debug!(tools = ?registry.names(), "tool registry built");
    registry
}

/// Parameter schema of a filter set produced by `parse_icp`.
pub(crate) fn filters_schema() -> Value {
    json!({
        "type": "object",
        "description": "The search_filters object returned by parse_icp. Pass it unmodified."
    })
}

/// Lead parameter schema shared by scoring and drafting.
pub(crate) fn lead_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "email": {"type": "string"},
            "first_name": {"type": "string"},
            "last_name": {"type": "string"},
            "title": {"type": "string"},
            "company_name": {"type": "string"},
            "industry": {"type": "string"},
            "company_size": {"type": "string"},
            "country": {"type": "string"}
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakePlatform, RecordingUsageSink, ScriptedCompletion, ScriptedReader};

    fn deps(platform: Option<Arc<dyn ProspectingPlatform>>) -> ToolDeps {
        ToolDeps {
            completion: Arc::new(ScriptedCompletion::default()),
            usage: Arc::new(RecordingUsageSink::default()),
            platform,
            reader: None,
            sourcing: SourcingPolicy {
                poll_interval: Duration::ZERO,
                max_polls: 3,
            },
            company_pitch: None,
        }
    }

    #[test]
    fn test_platform_tools_need_credential() {
        let registry = build_registry(&deps(None));
        assert_eq!(
            registry.names(),
            vec!["parse_icp", "score_lead", "generate_campaign_angle", "draft_email"]
        );
    }

    #[test]
    fn test_full_tool_set() {
        let registry = build_registry(&ToolDeps {
            reader: Some(Arc::new(ScriptedReader::default())),
            ..deps(Some(Arc::new(FakePlatform::default())))
        });
        assert_eq!(
            registry.names(),
            vec![
                "parse_icp",
                "count_leads",
                "preview_leads",
                "source_leads",
                "score_lead",
                "enrich_lead",
                "generate_campaign_angle",
                "draft_email",
                "create_campaign",
                "add_leads_to_campaign",
                "activate_campaign",
                "list_accounts",
            ]
        );
        let side_effects: Vec<&str> = registry
            .names()
            .into_iter()
            .filter(|name| registry.get(name).is_some_and(|t| t.is_side_effect()))
            .collect();
        assert_eq!(
            side_effects,
            vec!["source_leads", "create_campaign", "add_leads_to_campaign", "activate_campaign"]
        );
    }

    #[test]
    fn test_policy_from_config() {
        let config = PlatformConfig {
            max_polls: 0,
            ..PlatformConfig::default()
        };
        let policy = SourcingPolicy::from(&config);
        assert_eq!(policy.max_polls, 1);
        assert_eq!(policy.poll_interval, Duration::from_secs(3));
    }
}
