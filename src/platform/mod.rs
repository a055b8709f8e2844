//! Prospecting platform: lead search, sourcing and campaign sending.

pub mod client;
pub mod errors;
pub mod request;
pub mod types;

pub use client::{HttpPlatformClient, PlatformCounter, ProspectingPlatform};
pub use errors::PlatformError;
pub use request::prepare_filters_for_api;
pub use types::{
    Account, Campaign, CampaignStep, EnrichmentStatus, Lead, LeadPage, ListLeadsRequest,
    NewCampaign, NewLead, SourceRequest, SourcingJob, DEFAULT_TIMEZONE,
};
