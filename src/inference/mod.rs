//! Completion-service client.
//!
//! - Streaming chat-with-tools and non-streaming JSON calls ([`client`])
//! - SSE chunk parsing with tool-call accumulation ([`streaming`])
//! - Recovery of tool calls written as text ([`tool_call_parser`])
//! - Structured JSON decoding with usage accounting ([`json`])
//!
//! The client speaks the OpenAI Chat Completions API; the endpoint and
//! models come from the `models` config section.

pub mod client;
pub mod errors;
pub mod json;
pub mod streaming;
pub mod tool_call_parser;
pub mod types;

pub use client::{ChunkStream, CompletionService, HttpCompletionClient};
pub use errors::InferenceError;
pub use json::{generate_json, parse_json_output};
pub use tool_call_parser::{extract_text_tool_call, TextToolCall};
pub use types::{
    ChatMessage, ChatRequest, JsonCompletion, JsonRequest, ModelRole, Role, StreamChunk, ToolCall,
    ToolDefinition, Usage,
};
