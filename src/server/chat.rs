//! `POST /api/agents/chat`: one agent run streamed as server-sent events.
//!
//! Auth and body validation happen before the stream opens and fail with a
//! plain JSON error. Once open, the body is:
//!
//! ```text
//! retry: <ms>
//! stream-start {streamId, conversationId, ts}
//! ...orchestrator events, with a status label before each tool-input-start...
//! stream-end {}
//! ```
//!
//! A `:ping` comment goes out every keepalive interval. A client
//! disconnect drops the body stream and with it the run.

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::auth::Principal;
use super::errors::ApiError;
use super::prompt::build_system_prompt;
use super::AppState;
use crate::agent::{build_registry, tool_label, StreamEvent, ToolDeps, Turn};
use crate::inference::ChatMessage;
use crate::wire::{generate_stream_id, SseEncoder, SSE_HEADERS};

/// Emitted if the run ends without its terminal event.
const UNTERMINATED_RUN: &str = "The agent stopped unexpectedly.";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    pub conversation_id: String,
    pub messages: Vec<IncomingMessage>,
}

#[derive(Debug, Deserialize)]
pub struct IncomingMessage {
    pub role: IncomingRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IncomingRole {
    User,
    Assistant,
}

impl ChatBody {
    fn parse(raw: &[u8]) -> Result<Self, ApiError> {
        let body: ChatBody = serde_json::from_slice(raw)
            .map_err(|e| ApiError::bad_request(format!("Invalid request body: {e}")))?;
        if body.conversation_id.trim().is_empty() {
            return Err(ApiError::bad_request("conversationId is required"));
        }
        match body.messages.last() {
            Some(last) if last.role == IncomingRole::User => Ok(body),
            Some(_) => Err(ApiError::bad_request("The last message must come from the user")),
            None => Err(ApiError::bad_request("messages must not be empty")),
        }
    }

    fn history(&self) -> Vec<ChatMessage> {
        self.messages
            .iter()
            .map(|m| match m.role {
                IncomingRole::User => ChatMessage::user(m.content.clone()),
                IncomingRole::Assistant => ChatMessage::assistant(m.content.clone()),
            })
            .collect()
    }
}

enum Next {
    Event(Option<StreamEvent>),
    Ping,
}

pub async fn chat(
    State(state): State<AppState>,
    headers: HeaderMap,
    raw: Bytes,
) -> Result<Response, ApiError> {
    let principal = state.principals.authenticate(&headers)?.clone();
    let body = ChatBody::parse(&raw)?;

    tracing::info!(
        workspace_id = %principal.workspace_id,
        conversation_id = %body.conversation_id,
        messages = body.messages.len(),
        "chat request"
    );

    let turn = build_turn(&state, &principal, &body);
    let events = state.orchestrator.run(turn);
    let keepalive = state.keepalive;
    let client_retry_ms = state.client_retry_ms;
    let conversation_id = body.conversation_id;

    let frames = async_stream::stream! {
        let mut sse = SseEncoder::new();
        let stream_id = generate_stream_id();

        yield Ok::<_, Infallible>(sse.retry_directive(client_retry_ms));
        yield Ok(sse.encode(
            "stream-start",
            &json!({
                "streamId": stream_id,
                "conversationId": conversation_id,
                "ts": Utc::now().timestamp_millis(),
            }),
        ));

        let mut ticker = interval_at(Instant::now() + keepalive, keepalive);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events = events;
        let mut terminated = false;

        loop {
            let next = tokio::select! {
                event = events.next() => Next::Event(event),
                _ = ticker.tick() => Next::Ping,
            };
            match next {
                Next::Ping => yield Ok(sse.ping()),
                Next::Event(Some(event)) => {
                    if let StreamEvent::ToolInputStart { tool_name, .. } = &event {
                        let label = StreamEvent::Status { label: tool_label(tool_name).to_string() };
                        yield Ok(sse.encode_event(&label));
                    }
                    terminated |= event.is_terminal();
                    yield Ok(sse.encode_event(&event));
                }
                Next::Event(None) => break,
            }
        }

        if !terminated {
            tracing::error!(stream_id = %stream_id, "agent run ended without a terminal event");
            yield Ok(sse.encode_event(&StreamEvent::Error { message: UNTERMINATED_RUN.to_string() }));
        }
        yield Ok(sse.encode("stream-end", &json!({})));
        tracing::debug!(stream_id = %stream_id, "stream closed");
    };

    let mut response = Response::builder().status(StatusCode::OK);
    for (name, value) in SSE_HEADERS {
        response = response.header(name, value);
    }
    response
        .body(Body::from_stream(frames))
        .map_err(|e| ApiError::Internal {
            message: format!("failed to build stream response: {e}"),
        })
}

fn build_turn(state: &AppState, principal: &Principal, body: &ChatBody) -> Turn {
    let registry = build_registry(&ToolDeps {
        completion: state.completion.clone(),
        usage: state.usage.clone(),
        platform: principal.platform.clone(),
        reader: state.reader.clone(),
        sourcing: state.sourcing,
        company_pitch: principal.company_pitch.clone(),
    });
    Turn {
        system: build_system_prompt(principal),
        history: body.history(),
        registry,
        workspace_id: principal.workspace_id.clone(),
        user_id: principal.user_id.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_parsing() {
        let body = ChatBody::parse(
            br#"{"conversationId": "c1", "messages": [
                {"role": "user", "content": "Find CTOs"},
                {"role": "assistant", "content": "In which country?"},
                {"role": "user", "content": "France"}
            ]}"#,
        )
        .unwrap();
        let history = body.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[1].content.as_deref(), Some("In which country?"));
    }

    #[test]
    fn test_body_rejections() {
        let cases: [&[u8]; 5] = [
            b"not json",
            br#"{"messages": [{"role": "user", "content": "hi"}]}"#,
            br#"{"conversationId": "c1", "messages": []}"#,
            br#"{"conversationId": "c1", "messages": [{"role": "system", "content": "hi"}]}"#,
            br#"{"conversationId": "c1", "messages": [{"role": "assistant", "content": "hi"}]}"#,
        ];
        for raw in cases {
            let err = ChatBody::parse(raw).unwrap_err();
            assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        }
    }
}
