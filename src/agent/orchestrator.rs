//! Stream orchestrator: the bounded tool-calling step loop.
//!
//! One run serves one chat request:
//! 1. **Step**: stream a completion over the full history with every
//!    registered tool, forwarding text as it arrives and buffering tool calls
//!    until the step's stream closes
//! 2. **Dispatch**: execute requested tools one after another, feeding each
//!    result back as a `tool` message
//! 3. **Stop** when a step requests no tools or the step budget runs out
//!
//! Tool failures (bad arguments, unknown tool, errors, panics) become
//! `{"error": ...}` results the model sees on the next step. A failing
//! completion call ends the run with an apology and `finish` (reason
//! `error`). Every run ends with exactly one terminal event.

use std::panic::AssertUnwindSafe;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;

use futures::{FutureExt, Stream, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use uuid::Uuid;

use super::registry::{format_error_for_user, ToolContext, ToolError, ToolRegistry};
use super::types::{FinishReason, StreamEvent, TokenUsage};
use crate::config::AgentConfig;
use crate::inference::{
    extract_text_tool_call, ChatMessage, ChatRequest, CompletionService, ModelRole, ToolCall,
};
use crate::usage::{record_in_background, UsageEvent, UsageSink};

/// Usage-log action of one chat step.
pub const CHAT_ACTION: &str = "chat-stream";

/// Streamed when the completion service fails.
pub const APOLOGY: &str = "Sorry, a technical error occurred. Please try your message again.";

/// Recovered tool results fed back as text are cut to this many characters.
const TEXT_RESULT_CHARS: usize = 4_000;

/// Provider finish reason for a step that requested tools.
const TOOL_CALLS_REASON: &str = "tool_calls";

pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Input of one run.
pub struct Turn {
    pub system: String,
    /// Prior turns plus the new user message, oldest first.
    pub history: Vec<ChatMessage>,
    pub registry: ToolRegistry,
    pub workspace_id: String,
    pub user_id: String,
}

pub struct Orchestrator {
    completion: Arc<dyn CompletionService>,
    usage: Arc<dyn UsageSink>,
    config: AgentConfig,
}

impl Orchestrator {
    pub fn new(
        completion: Arc<dyn CompletionService>,
        usage: Arc<dyn UsageSink>,
        config: AgentConfig,
    ) -> Self {
        Self {
            completion,
            usage,
            config,
        }
    }

    /// Start a run. Nothing happens until the stream is polled; dropping
    /// the stream stops the loop at its next suspension point.
    pub fn run(&self, turn: Turn) -> EventStream {
        let completion = self.completion.clone();
        let usage = self.usage.clone();
        let max_steps = self.config.max_steps.max(1);
        let max_recoveries = self.config.max_text_call_recoveries;

        Box::pin(async_stream::stream! {
            let Turn { system, history, registry, workspace_id, user_id } = turn;
            let (status_tx, mut status_rx) = mpsc::unbounded_channel();
            let ctx = ToolContext::new(workspace_id.clone(), user_id).with_status(status_tx);
            let definitions = registry.definitions();
            let known = registry.names();
            let model = completion.model_name(ModelRole::Primary).to_string();

            let mut messages = Vec::with_capacity(history.len() + 1);
            messages.push(ChatMessage::system(system));
            messages.extend(history);

            let mut total = TokenUsage::default();
            let mut recoveries = 0u32;

            tracing::info!(
                workspace_id = %workspace_id,
                tools = definitions.len(),
                history = messages.len() - 1,
                max_steps,
                "agent run started"
            );

            for step in 1..=max_steps {
                let started = Instant::now();
                let request = ChatRequest {
                    messages: messages.clone(),
                    tools: definitions.clone(),
                    role: ModelRole::Primary,
                    temperature: None,
                    max_tokens: None,
                };

                let mut chunks = match completion.chat_stream(request).await {
                    Ok(chunks) => chunks,
                    Err(e) => {
                        tracing::error!(step, error = %e, "completion request failed");
                        yield StreamEvent::TextDelta { delta: APOLOGY.to_string() };
                        yield finish(total, step, FinishReason::Error);
                        return;
                    }
                };

                // ── Collect the step ────────────────────────────────────
                let mut text = String::new();
                let mut calls: Vec<ToolCall> = Vec::new();
                let mut provider_reason: Option<String> = None;
                let mut step_usage = TokenUsage::default();
                let mut stream_failed = false;

                while let Some(chunk) = chunks.next().await {
                    let chunk = match chunk {
                        Ok(chunk) => chunk,
                        Err(e) => {
                            tracing::error!(step, error = %e, "completion stream failed");
                            stream_failed = true;
                            break;
                        }
                    };
                    if let Some(token) = chunk.token.filter(|t| !t.is_empty()) {
                        text.push_str(&token);
                        yield StreamEvent::TextDelta { delta: token };
                    }
                    if let Some(tool_calls) = chunk.tool_calls {
                        calls.extend(tool_calls);
                    }
                    if let Some(reason) = chunk.finish_reason {
                        provider_reason = Some(reason);
                    }
                    if let Some(u) = chunk.usage {
                        step_usage = TokenUsage {
                            tokens_in: u.prompt_tokens,
                            tokens_out: u.completion_tokens,
                        };
                    }
                }

                total.add(step_usage);
                let latency_ms = started.elapsed().as_millis() as u64;
                record_in_background(
                    usage.clone(),
                    UsageEvent {
                        workspace_id: workspace_id.clone(),
                        model: model.clone(),
                        action: CHAT_ACTION.to_string(),
                        tokens_in: step_usage.tokens_in,
                        tokens_out: step_usage.tokens_out,
                        latency_ms,
                        metadata: json!({ "step": step }),
                    },
                );
                tracing::info!(
                    step,
                    tokens_in = step_usage.tokens_in,
                    tokens_out = step_usage.tokens_out,
                    tool_calls = calls.len(),
                    latency_ms,
                    "step complete"
                );
                yield StreamEvent::StepComplete { usage: step_usage };

                if stream_failed {
                    yield StreamEvent::TextDelta { delta: APOLOGY.to_string() };
                    yield finish(total, step, FinishReason::Error);
                    return;
                }

                // Only a tool_calls finish reason dispatches native calls.
                if !calls.is_empty() && provider_reason.as_deref() != Some(TOOL_CALLS_REASON) {
                    tracing::warn!(
                        step,
                        reason = ?provider_reason,
                        dropped = calls.len(),
                        "tool calls arrived without a tool_calls finish reason"
                    );
                    calls.clear();
                }

                // ── No native tool calls: recover a text call or stop ───
                if calls.is_empty() {
                    let recovered = if recoveries < max_recoveries {
                        extract_text_tool_call(&text, &known)
                    } else {
                        None
                    };
                    let Some(found) = recovered else {
                        yield finish(total, step, FinishReason::from_provider(provider_reason.as_deref()));
                        return;
                    };

                    recoveries += 1;
                    let name = found.name.clone();
                    let input = found.into_arguments(registry.first_required_param(&name).as_deref());
                    tracing::info!(tool = %name, recovery = recoveries, "recovered tool call from text");

                    let mut output = Value::Null;
                    {
                        let events = call_events(
                            &registry,
                            &ctx,
                            &mut status_rx,
                            format!("text-call-{}", Uuid::new_v4()),
                            name.clone(),
                            input,
                        );
                        futures::pin_mut!(events);
                        while let Some(event) = events.next().await {
                            if let StreamEvent::ToolOutputAvailable { output: out, .. } = &event {
                                output = out.clone();
                            }
                            yield event;
                        }
                    }

                    // Plain messages: fabricated call ids can be rejected
                    // by the provider.
                    let serialized: String = output.to_string().chars().take(TEXT_RESULT_CHARS).collect();
                    messages.push(ChatMessage::assistant(format!("I called {name}.")));
                    messages.push(ChatMessage::user(format!("[Tool result from {name}]:\n{serialized}")));
                    continue;
                }

                // ── Dispatch native tool calls, in order ────────────────
                messages.push(ChatMessage::assistant_tool_calls(&text, &calls));
                for call in &calls {
                    let input = parse_arguments(call);
                    let mut output = Value::Null;
                    {
                        let events = call_events(
                            &registry,
                            &ctx,
                            &mut status_rx,
                            call.id.clone(),
                            call.name.clone(),
                            input,
                        );
                        futures::pin_mut!(events);
                        while let Some(event) = events.next().await {
                            if let StreamEvent::ToolOutputAvailable { output: out, .. } = &event {
                                output = out.clone();
                            }
                            yield event;
                        }
                    }
                    messages.push(ChatMessage::tool_result(call, output.to_string()));
                }
            }

            tracing::warn!(max_steps, "step budget exhausted");
            yield finish(total, max_steps, FinishReason::MaxSteps);
        })
    }
}

fn finish(usage: TokenUsage, total_steps: u32, finish_reason: FinishReason) -> StreamEvent {
    StreamEvent::Finish {
        usage,
        total_steps,
        finish_reason,
    }
}

/// Arguments as JSON. Empty or unparsable text becomes `{}`.
fn parse_arguments(call: &ToolCall) -> Value {
    if call.arguments.trim().is_empty() {
        return json!({});
    }
    match serde_json::from_str(&call.arguments) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(tool = %call.name, error = %e, "unparsable tool arguments, using {{}}");
            json!({})
        }
    }
}

enum Progress {
    Status(String),
    Done(Value),
}

/// Events of one tool call: input start, input, status labels while the
/// tool runs, output. Never fails.
fn call_events<'a>(
    registry: &'a ToolRegistry,
    ctx: &'a ToolContext,
    status_rx: &'a mut mpsc::UnboundedReceiver<String>,
    tool_call_id: String,
    name: String,
    input: Value,
) -> impl Stream<Item = StreamEvent> + Send + 'a {
    async_stream::stream! {
        yield StreamEvent::ToolInputStart {
            tool_call_id: tool_call_id.clone(),
            tool_name: name.clone(),
        };
        yield StreamEvent::ToolInputAvailable {
            tool_call_id: tool_call_id.clone(),
            input: input.clone(),
        };

        let output = match registry.get(&name) {
            None => {
                tracing::warn!(tool = %name, "model requested an unknown tool");
                json!({ "error": format!("unknown tool: {name}") })
            }
            Some(tool) => {
                let started = Instant::now();
                let execution = AssertUnwindSafe(tool.execute(input, ctx)).catch_unwind();
                futures::pin_mut!(execution);
                let output = loop {
                    let progress = tokio::select! {
                        biased;
                        Some(label) = status_rx.recv() => Progress::Status(label),
                        result = &mut execution => Progress::Done(match result {
                            Ok(result) => tool_output(&name, result),
                            Err(_) => {
                                tracing::error!(tool = %name, "tool panicked");
                                json!({ "error": "Tool execution failed" })
                            }
                        }),
                    };
                    match progress {
                        Progress::Status(label) => yield StreamEvent::Status { label },
                        Progress::Done(output) => break output,
                    }
                };
                tracing::info!(
                    tool = %name,
                    side_effect = tool.is_side_effect(),
                    duration_ms = started.elapsed().as_millis() as u64,
                    "tool executed"
                );
                output
            }
        };

        while let Ok(label) = status_rx.try_recv() {
            yield StreamEvent::Status { label };
        }
        yield StreamEvent::ToolOutputAvailable { tool_call_id, output };
    }
}

fn tool_output(name: &str, result: Result<Value, ToolError>) -> Value {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(tool = name, error = %e, "tool failed");
            json!({ "error": format_error_for_user(&e) })
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
