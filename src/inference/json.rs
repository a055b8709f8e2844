//! Structured JSON calls.
//!
//! Used by every non-filter JSON consumer (scoring, drafting) and by the
//! filter compiler's generation stage. Usage is recorded on the side; a
//! response that does not parse becomes [`InferenceError::InvalidJson`]
//! tagged with the action name.

use std::sync::Arc;
use std::time::Instant;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::client::CompletionService;
use super::errors::InferenceError;
use super::tool_call_parser::{first_balanced_object, strip_code_fence};
use super::types::JsonRequest;
use crate::usage::{record_in_background, UsageEvent, UsageSink};

/// Appended to every JSON system prompt.
pub const JSON_ONLY_SUFFIX: &str = "\n\nJSON only, no markdown, no comments.";

/// Run a JSON request and decode the reply into `T`.
pub async fn generate_json<T: DeserializeOwned>(
    completion: &dyn CompletionService,
    usage: &Arc<dyn UsageSink>,
    workspace_id: &str,
    mut request: JsonRequest,
) -> Result<T, InferenceError> {
    request.system.push_str(JSON_ONLY_SUFFIX);
    let action = request.action.clone();
    let started = Instant::now();
    let reply = completion.complete_json(request).await?;

    record_in_background(
        usage.clone(),
        UsageEvent {
            workspace_id: workspace_id.to_string(),
            model: reply.model.clone(),
            action: action.clone(),
            tokens_in: reply.usage.prompt_tokens,
            tokens_out: reply.usage.completion_tokens,
            latency_ms: started.elapsed().as_millis() as u64,
            metadata: Value::Null,
        },
    );

    parse_json_output(&action, &reply.text)
}

/// Decode model text as `T`, tolerating code fences and prose around a
/// single JSON object.
pub fn parse_json_output<T: DeserializeOwned>(action: &str, text: &str) -> Result<T, InferenceError> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Ok(value);
    }

    let candidates = [strip_code_fence(trimmed), first_balanced_object(trimmed)];
    for candidate in candidates.into_iter().flatten() {
        if let Ok(value) = serde_json::from_str(candidate) {
            return Ok(value);
        }
    }

    tracing::warn!(action, chars = text.len(), "model returned unparsable JSON");
    Err(InferenceError::invalid_json(action, text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::ModelRole;
    use crate::testing::{settle, RecordingUsageSink, ScriptedCompletion};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Draft {
        subject: String,
    }

    fn request() -> JsonRequest {
        JsonRequest {
            action: "email-draft".into(),
            system: "Write an email.".into(),
            prompt: "Lead: Jane".into(),
            role: ModelRole::Primary,
            temperature: None,
            max_tokens: None,
        }
    }

    #[test]
    fn test_parse_plain_json() {
        let draft: Draft = parse_json_output("a", r#"{"subject": "Hi"}"#).unwrap();
        assert_eq!(draft.subject, "Hi");
    }

    #[test]
    fn test_parse_fenced_json() {
        let draft: Draft = parse_json_output("a", "```json\n{\"subject\": \"Hi\"}\n```").unwrap();
        assert_eq!(draft.subject, "Hi");
    }

    #[test]
    fn test_parse_json_with_prose() {
        let draft: Draft =
            parse_json_output("a", "Sure! Here it is: {\"subject\": \"Hi\"} Let me know.").unwrap();
        assert_eq!(draft.subject, "Hi");
    }

    #[test]
    fn test_invalid_json_tagged_with_action() {
        let err = parse_json_output::<Draft>("lead-score", "no json here").unwrap_err();
        match err {
            InferenceError::InvalidJson { action, sample } => {
                assert_eq!(action, "lead-score");
                assert_eq!(sample, "no json here");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_generate_json_records_usage() {
        let completion = ScriptedCompletion::default().with_json(r#"{"subject": "Quick question"}"#);
        let sink = Arc::new(RecordingUsageSink::default());
        let usage: Arc<dyn UsageSink> = sink.clone();

        let draft: Draft = generate_json(&completion, &usage, "ws-1", request()).await.unwrap();
        assert_eq!(draft.subject, "Quick question");

        settle().await;
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].action, "email-draft");
        assert_eq!(events[0].workspace_id, "ws-1");
        assert!(completion.json_requests()[0].system.ends_with(JSON_ONLY_SUFFIX));
    }
}
