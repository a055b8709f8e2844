//! Conversational prospecting agent.
//!
//! - [`registry`]: tool trait, per-request registry, tool context
//! - [`tools`]: the prospecting tool set
//! - [`orchestrator`]: the streaming step loop
//! - [`types`]: events the loop yields

pub mod orchestrator;
pub mod registry;
pub mod tools;
pub mod types;

pub use orchestrator::{EventStream, Orchestrator, Turn, APOLOGY};
pub use registry::{format_error_for_user, tool_label, Tool, ToolContext, ToolError, ToolRegistry};
pub use tools::{build_registry, SourcingPolicy, ToolDeps};
pub use types::{FinishReason, StreamEvent, TokenUsage};
