//! Orchestrator event types.

use serde::Serialize;
use serde_json::Value;

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// The model answered without requesting tools.
    Stop,
    /// The model hit its output token limit.
    Length,
    /// The step budget ran out while tools were still being requested.
    MaxSteps,
    /// The completion service failed; an apology was streamed instead.
    Error,
}

impl FinishReason {
    /// Map a provider finish reason of a step without tool calls.
    pub fn from_provider(reason: Option<&str>) -> Self {
        match reason {
            Some("length") => FinishReason::Length,
            _ => FinishReason::Stop,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::MaxSteps => "max_steps",
            FinishReason::Error => "error",
        }
    }
}

/// Token totals reported in `step-complete` and `finish`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUsage {
    pub tokens_in: u64,
    pub tokens_out: u64,
}

impl TokenUsage {
    pub fn add(&mut self, other: TokenUsage) {
        self.tokens_in += other.tokens_in;
        self.tokens_out += other.tokens_out;
    }
}

/// One event of an orchestrator run.
///
/// A run yields exactly one terminal event ([`StreamEvent::Finish`] or
/// [`StreamEvent::Error`]) and nothing after it.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta {
        delta: String,
    },
    ToolInputStart {
        tool_call_id: String,
        tool_name: String,
    },
    ToolInputAvailable {
        tool_call_id: String,
        input: Value,
    },
    ToolOutputAvailable {
        tool_call_id: String,
        output: Value,
    },
    Status {
        label: String,
    },
    StepComplete {
        usage: TokenUsage,
    },
    Finish {
        usage: TokenUsage,
        total_steps: u32,
        finish_reason: FinishReason,
    },
    Error {
        message: String,
    },
}

impl StreamEvent {
    /// Wire event name.
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::TextDelta { .. } => "text-delta",
            StreamEvent::ToolInputStart { .. } => "tool-input-start",
            StreamEvent::ToolInputAvailable { .. } => "tool-input-available",
            StreamEvent::ToolOutputAvailable { .. } => "tool-output-available",
            StreamEvent::Status { .. } => "status",
            StreamEvent::StepComplete { .. } => "step-complete",
            StreamEvent::Finish { .. } => "finish",
            StreamEvent::Error { .. } => "error",
        }
    }

    /// Wire payload.
    pub fn payload(&self) -> Value {
        use serde_json::json;
        match self {
            StreamEvent::TextDelta { delta } => json!({ "delta": delta }),
            StreamEvent::ToolInputStart {
                tool_call_id,
                tool_name,
            } => json!({ "toolCallId": tool_call_id, "toolName": tool_name }),
            StreamEvent::ToolInputAvailable {
                tool_call_id,
                input,
            } => json!({ "toolCallId": tool_call_id, "input": input }),
            StreamEvent::ToolOutputAvailable {
                tool_call_id,
                output,
            } => json!({ "toolCallId": tool_call_id, "output": output }),
            StreamEvent::Status { label } => json!({ "label": label }),
            StreamEvent::StepComplete { usage } => {
                json!({ "tokensIn": usage.tokens_in, "tokensOut": usage.tokens_out })
            }
            StreamEvent::Finish {
                usage,
                total_steps,
                finish_reason,
            } => json!({
                "tokensIn": usage.tokens_in,
                "tokensOut": usage.tokens_out,
                "totalSteps": total_steps,
                "finishReason": finish_reason.as_str(),
            }),
            StreamEvent::Error { message } => json!({ "message": message }),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Finish { .. } | StreamEvent::Error { .. })
    }
}
