//! SSE streaming response parser for OpenAI-compatible chat completions.
//!
//! Reads a byte stream, splits on SSE boundaries (`data: …\n\n`), parses each
//! chunk as JSON, and accumulates tool calls across multiple deltas. A
//! logical tool call is only surfaced once the step's stream closes it.

use std::fmt::Display;

use futures::stream::{self, Stream, StreamExt};
use serde::Deserialize;
use uuid::Uuid;

use super::errors::InferenceError;
use super::types::{ChatCompletionChunk, JsonCompletion, StreamChunk, ToolCall, Usage};

// ─── SSE line parser ─────────────────────────────────────────────────────────

/// Parse raw SSE bytes into `StreamChunk`s.
///
/// Bytes are buffered until a blank line completes an event, so multi-byte
/// characters and events split across network reads are reassembled before
/// decoding. `\r` is discarded so CRLF-framed streams parse the same.
pub fn parse_sse_stream<S, B, E>(
    byte_stream: S,
) -> impl Stream<Item = Result<StreamChunk, InferenceError>> + Send
where
    S: Stream<Item = Result<B, E>> + Unpin + Send + 'static,
    B: AsRef<[u8]>,
    E: Display,
{
    stream::unfold(
        (byte_stream.fuse(), StreamState::default(), Vec::<u8>::new()),
        |(mut byte_stream, mut state, mut buffer)| async move {
            loop {
                if let Some(event_end) = buffer.windows(2).position(|w| w == b"\n\n") {
                    let event = String::from_utf8_lossy(&buffer[..event_end]).into_owned();
                    buffer.drain(..event_end + 2);

                    match state.process_event(&event) {
                        Ok(Some(chunk)) => return Some((Ok(chunk), (byte_stream, state, buffer))),
                        Ok(None) => continue,
                        Err(e) => return Some((Err(e), (byte_stream, state, buffer))),
                    }
                }

                match byte_stream.next().await {
                    Some(Ok(bytes)) => {
                        buffer.extend(bytes.as_ref().iter().copied().filter(|b| *b != b'\r'));
                    }
                    Some(Err(e)) => {
                        return Some((
                            Err(InferenceError::StreamError {
                                reason: format!("stream read error: {e}"),
                            }),
                            (byte_stream, state, buffer),
                        ));
                    }
                    None => {
                        // Trailing event without the final blank line.
                        let rest = String::from_utf8_lossy(&buffer).trim().to_string();
                        buffer.clear();
                        let outcome = if rest.is_empty() {
                            state.finalize()
                        } else {
                            state.process_event(&rest)
                        };
                        return match outcome {
                            Ok(Some(chunk)) => Some((Ok(chunk), (byte_stream, state, buffer))),
                            Ok(None) => None,
                            Err(e) => Some((Err(e), (byte_stream, state, buffer))),
                        };
                    }
                }
            }
        },
    )
}

// ─── Stream State ────────────────────────────────────────────────────────────

/// Tool call fragments accumulated across SSE events.
#[derive(Default)]
struct StreamState {
    /// `(index, id, name, arguments_buffer)`.
    pending_tool_calls: Vec<(u32, Option<String>, String, String)>,
}

impl StreamState {
    /// Process a single SSE event string (may contain multiple `data:` lines).
    fn process_event(&mut self, event: &str) -> Result<Option<StreamChunk>, InferenceError> {
        let mut data_content = String::new();

        for line in event.lines() {
            if let Some(data) = line.strip_prefix("data: ").or_else(|| line.strip_prefix("data:")) {
                let data = data.trim();
                if data == "[DONE]" {
                    return self.finalize();
                }
                data_content.push_str(data);
            }
        }

        if data_content.is_empty() {
            return Ok(None);
        }

        let chunk: ChatCompletionChunk =
            serde_json::from_str(&data_content).map_err(|e| InferenceError::StreamError {
                reason: format!("failed to parse SSE chunk: {e} (data: {data_content})"),
            })?;

        Ok(self.process_chunk(chunk))
    }

    fn process_chunk(&mut self, chunk: ChatCompletionChunk) -> Option<StreamChunk> {
        let usage = chunk.usage;
        let Some(choice) = chunk.choices.into_iter().next() else {
            // Usage-only trailer.
            return usage.map(|usage| StreamChunk {
                usage: Some(usage),
                ..StreamChunk::default()
            });
        };

        if let Some(deltas) = choice.delta.tool_calls {
            for delta in deltas {
                let index = delta.index.unwrap_or(self.pending_tool_calls.len() as u32);
                let (name, args) = delta
                    .function
                    .map(|f| (f.name, f.arguments))
                    .unwrap_or((None, None));

                match self.pending_tool_calls.iter_mut().find(|(i, ..)| *i == index) {
                    Some((_, id, pending_name, pending_args)) => {
                        if id.is_none() {
                            *id = delta.id;
                        }
                        if let Some(name) = name {
                            pending_name.push_str(&name);
                        }
                        if let Some(args) = args {
                            pending_args.push_str(&args);
                        }
                    }
                    None => self.pending_tool_calls.push((
                        index,
                        delta.id,
                        name.unwrap_or_default(),
                        args.unwrap_or_default(),
                    )),
                }
            }
        }

        let token = choice.delta.content.filter(|t| !t.is_empty());
        let finish_reason = choice.finish_reason;
        let tool_calls =
            (finish_reason.as_deref() == Some("tool_calls")).then(|| self.take_tool_calls());

        if token.is_none() && tool_calls.is_none() && finish_reason.is_none() && usage.is_none() {
            return None;
        }
        Some(StreamChunk {
            token,
            tool_calls,
            finish_reason,
            usage,
        })
    }

    fn take_tool_calls(&mut self) -> Vec<ToolCall> {
        self.pending_tool_calls.sort_by_key(|(index, ..)| *index);
        self.pending_tool_calls
            .drain(..)
            .map(|(_, id, name, arguments)| ToolCall {
                id: id.unwrap_or_else(|| format!("call_{}", Uuid::new_v4())),
                name,
                arguments,
            })
            .collect()
    }

    /// End of stream. Fragments never closed by a `tool_calls` finish
    /// reason are still surfaced so the step is not lost.
    fn finalize(&mut self) -> Result<Option<StreamChunk>, InferenceError> {
        if self.pending_tool_calls.is_empty() {
            return Ok(None);
        }
        Ok(Some(StreamChunk {
            tool_calls: Some(self.take_tool_calls()),
            finish_reason: Some("tool_calls".to_string()),
            ..StreamChunk::default()
        }))
    }
}

// ─── Non-streaming parser ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<CompletionChoice>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Parse a non-streaming completion body. `fallback_model` is used when the
/// provider omits the model name.
pub fn parse_completion_response(
    body: &str,
    fallback_model: &str,
) -> Result<JsonCompletion, InferenceError> {
    let response: CompletionResponse =
        serde_json::from_str(body).map_err(|e| InferenceError::StreamError {
            reason: format!("failed to parse completion response: {e}"),
        })?;

    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| InferenceError::StreamError {
            reason: "completion response has no content".to_string(),
        })?;

    Ok(JsonCompletion {
        text,
        usage: response.usage,
        model: response.model.unwrap_or_else(|| fallback_model.to_string()),
    })
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(parts: &[&'static str]) -> Vec<Result<StreamChunk, InferenceError>> {
        let bytes = stream::iter(
            parts
                .iter()
                .map(|p| Ok::<&'static [u8], std::io::Error>(p.as_bytes()))
                .collect::<Vec<_>>(),
        );
        parse_sse_stream(bytes).collect().await
    }

    #[tokio::test]
    async fn test_text_deltas_and_stop() {
        let chunks = collect(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo\"},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}],\"usage\":{\"prompt_tokens\":12,\"completion_tokens\":3}}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;

        let chunks: Vec<StreamChunk> = chunks.into_iter().map(Result::unwrap).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].token.as_deref(), Some("Hel"));
        assert_eq!(chunks[1].token.as_deref(), Some("lo"));
        assert_eq!(chunks[2].finish_reason.as_deref(), Some("stop"));
        assert_eq!(
            chunks[2].usage,
            Some(Usage {
                prompt_tokens: 12,
                completion_tokens: 3
            })
        );
    }

    #[tokio::test]
    async fn test_tool_call_fragments_accumulate() {
        let chunks = collect(&[
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"id\":\"call_a\",\"function\":{\"name\":\"count_leads\",\"arguments\":\"{\\\"fil\"}}]},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"arguments\":\"ters\\\":{}}\"}}]},\"finish_reason\":null}]}\n\n",
            "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"tool_calls\"}]}\n\n",
        ])
        .await;

        let last = chunks.into_iter().last().unwrap().unwrap();
        let calls = last.tool_calls.unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_a");
        assert_eq!(calls[0].name, "count_leads");
        assert_eq!(calls[0].arguments, r#"{"filters":{}}"#);
    }

    #[tokio::test]
    async fn test_event_split_across_reads_and_crlf() {
        let chunks = collect(&[
            "data: {\"choices\":[{\"delta\":{\"content\":\"é",
            "t\"},\"finish_reason\":null}]}\r\n\r\n",
        ])
        .await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap().token.as_deref(), Some("ét"));
    }

    #[tokio::test]
    async fn test_unclosed_tool_calls_flushed_at_end() {
        let chunks = collect(&[
            "data: {\"choices\":[{\"delta\":{\"tool_calls\":[{\"index\":0,\"function\":{\"name\":\"parse_icp\",\"arguments\":\"{}\"}}]},\"finish_reason\":null}]}\n\n",
        ])
        .await;
        let last = chunks.into_iter().last().unwrap().unwrap();
        assert_eq!(last.finish_reason.as_deref(), Some("tool_calls"));
        let calls = last.tool_calls.unwrap();
        assert_eq!(calls[0].name, "parse_icp");
        assert!(calls[0].id.starts_with("call_"));
    }

    #[tokio::test]
    async fn test_malformed_chunk_is_error() {
        let chunks = collect(&["data: {not json}\n\n"]).await;
        assert!(matches!(chunks[0], Err(InferenceError::StreamError { .. })));
    }

    #[test]
    fn test_parse_completion_response() {
        let body = r#"{"model":"mistral-small-latest","choices":[{"message":{"content":"{\"a\":1}"}}],"usage":{"prompt_tokens":5,"completion_tokens":2}}"#;
        let completion = parse_completion_response(body, "fallback").unwrap();
        assert_eq!(completion.text, r#"{"a":1}"#);
        assert_eq!(completion.model, "mistral-small-latest");
        assert_eq!(completion.usage.completion_tokens, 2);
    }

    #[test]
    fn test_parse_completion_response_empty_choices() {
        assert!(parse_completion_response(r#"{"choices":[]}"#, "m").is_err());
    }
}
