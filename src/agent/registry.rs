//! Tool registry: the tools one request may call.
//!
//! A registry is assembled per request and never changes afterwards. Tool
//! order is registration order, which is also the order the model sees.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::enrichment::EnrichmentError;
use crate::inference::{InferenceError, ToolDefinition};
use crate::platform::PlatformError;

// ─── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("invalid arguments: {reason}")]
    InvalidArguments { reason: String },

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Enrichment(#[from] EnrichmentError),

    #[error("{reason}")]
    Failed { reason: String },
}

/// Message for a failed tool, as shown to the model and the user.
pub fn format_error_for_user(err: &ToolError) -> String {
    match err {
        ToolError::Platform(e) => e.user_message(),
        ToolError::Inference(e) => e.user_message(),
        ToolError::Enrichment(e) => e.user_message(),
        other => other.to_string(),
    }
}

/// Decode tool arguments into their typed form.
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        reason: e.to_string(),
    })
}

// ─── Context ─────────────────────────────────────────────────────────────────

/// Capability object handed to every tool execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub workspace_id: String,
    pub user_id: String,
    status: Option<mpsc::UnboundedSender<String>>,
}

impl ToolContext {
    pub fn new(workspace_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            workspace_id: workspace_id.into(),
            user_id: user_id.into(),
            status: None,
        }
    }

    pub fn with_status(mut self, status: mpsc::UnboundedSender<String>) -> Self {
        self.status = Some(status);
        self
    }

    /// Report progress. Fire-and-forget: a closed or missing listener is ignored.
    pub fn on_status(&self, label: impl Into<String>) {
        if let Some(tx) = &self.status {
            let _ = tx.send(label.into());
        }
    }
}

// ─── Tool ────────────────────────────────────────────────────────────────────

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// JSON schema of the arguments object.
    fn parameters(&self) -> Value;

    /// `true` for tools that change external state (credits, sends).
    fn is_side_effect(&self) -> bool {
        false
    }

    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<Value, ToolError>;
}

// ─── ToolRegistry ────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<&'static str, Arc<dyn Tool>>,
    order: Vec<&'static str>,
}

impl ToolRegistry {
    /// Build from tools in registration order. A repeated name keeps the
    /// first registration.
    pub fn new(tools: impl IntoIterator<Item = Arc<dyn Tool>>) -> Self {
        let mut registry = Self::default();
        for tool in tools {
            let name = tool.name();
            if registry.tools.contains_key(name) {
                tracing::warn!(tool = name, "duplicate tool registration ignored");
                continue;
            }
            registry.order.push(name);
            registry.tools.insert(name, tool);
        }
        registry
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.order.clone()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Definitions in the request format, in registration order.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| ToolDefinition::function(tool.name(), tool.description(), tool.parameters()))
            .collect()
    }

    /// First required parameter of a tool, else its first property.
    pub fn first_required_param(&self, name: &str) -> Option<String> {
        let schema = self.tools.get(name)?.parameters();
        schema
            .get("required")
            .and_then(Value::as_array)
            .and_then(|required| required.first())
            .and_then(Value::as_str)
            .or_else(|| {
                schema
                    .get("properties")
                    .and_then(Value::as_object)
                    .and_then(|props| props.keys().next())
                    .map(String::as_str)
            })
            .map(str::to_string)
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry").field("tools", &self.order).finish()
    }
}

/// Progress label shown while a tool runs.
pub fn tool_label(name: &str) -> &'static str {
    match name {
        "parse_icp" => "Parsing ICP filters...",
        "count_leads" => "Estimating available leads...",
        "preview_leads" => "Previewing leads...",
        "source_leads" => "Sourcing leads via SuperSearch...",
        "score_lead" => "Scoring leads against your ICP...",
        "enrich_lead" => "Reading company websites...",
        "generate_campaign_angle" => "Generating campaign angle...",
        "draft_email" => "Writing personalized emails...",
        "create_campaign" => "Creating draft campaign...",
        "add_leads_to_campaign" => "Adding leads to campaign...",
        "activate_campaign" => "Activating campaign...",
        "list_accounts" => "Listing email accounts...",
        _ => "Working...",
    }
}
