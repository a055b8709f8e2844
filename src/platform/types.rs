//! Request and response types of the prospecting platform API.
//!
//! Response types are lenient: every field the platform may omit is
//! optional, and unknown fields are ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A lead as returned by preview, search and list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linkedin_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

impl Lead {
    pub fn full_name(&self) -> String {
        [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// One page of a paginated lead listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadPage {
    #[serde(default)]
    pub items: Vec<Lead>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_starting_after: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Numeric on the platform; kept opaque.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

/// A sending account (mailbox) connected to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Value>,
}

/// A started sourcing (search + enrichment) job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourcingJob {
    pub id: String,
    /// Lead list the sourced leads land in; polled for status.
    pub resource_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrichmentStatus {
    pub in_progress: bool,
    pub exists: bool,
}

/// Parameters of a sourcing job.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRequest {
    pub limit: u32,
    pub search_name: String,
    pub list_name: String,
    pub work_email_enrichment: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListLeadsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub list_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campaign_id: Option<String>,
    pub limit: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starting_after: Option<String>,
}

/// A lead pushed into a campaign.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewLead {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub campaign: Option<String>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub custom_variables: HashMap<String, String>,
}

/// One email of a sequence. `delay` is in days after the previous step.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CampaignStep {
    #[serde(default)]
    pub subject: Option<String>,
    pub body: String,
    #[serde(default)]
    pub delay: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCampaign {
    pub name: String,
    pub steps: Vec<CampaignStep>,
    pub daily_limit: Option<u32>,
    pub email_list: Vec<String>,
    pub timezone: String,
}

/// Default timezone of the business-hours schedule.
pub const DEFAULT_TIMEZONE: &str = "Europe/Paris";
