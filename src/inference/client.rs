//! OpenAI-compatible completion client.
//!
//! [`CompletionService`] is the seam the orchestrator and the filter compiler
//! depend on; [`HttpCompletionClient`] is the production implementation
//! talking to the Mistral Chat Completions endpoint.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use reqwest::Client as HttpClient;

use super::errors::InferenceError;
use super::streaming::{parse_completion_response, parse_sse_stream};
use super::types::{
    ChatCompletionRequest, ChatMessage, ChatRequest, JsonCompletion, JsonRequest, ModelRole,
    ResponseFormat, StreamChunk,
};
use crate::config::ModelsConfig;
use crate::retry::RetryPolicy;

// ─── Constants ───────────────────────────────────────────────────────────────

/// TCP connection timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Total request timeout for JSON calls.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Total request timeout for streaming calls. Long tool-heavy contexts can
/// take a while before the first token.
const STREAM_REQUEST_TIMEOUT: Duration = Duration::from_secs(180);

/// Boxed chunk stream returned by [`CompletionService::chat_stream`].
pub type ChunkStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, InferenceError>> + Send>>;

// ─── CompletionService ───────────────────────────────────────────────────────

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Streaming chat-with-tools call (`tool_choice = auto` when tools are given).
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, InferenceError>;

    /// Non-streaming call constrained to a JSON object.
    async fn complete_json(&self, request: JsonRequest) -> Result<JsonCompletion, InferenceError>;

    /// Model name serving `role`, for usage accounting.
    fn model_name(&self, role: ModelRole) -> &str;
}

// ─── HttpCompletionClient ────────────────────────────────────────────────────

pub struct HttpCompletionClient {
    /// HTTP client for JSON requests (30s timeout).
    http: HttpClient,
    /// HTTP client for streaming requests (180s timeout).
    http_stream: HttpClient,
    config: ModelsConfig,
    retry: RetryPolicy,
}

impl HttpCompletionClient {
    /// Does NOT check connectivity; that happens on the first request.
    pub fn new(config: ModelsConfig, retry: RetryPolicy) -> Result<Self, InferenceError> {
        let build = |timeout: Duration| {
            HttpClient::builder()
                .connect_timeout(CONNECT_TIMEOUT)
                .timeout(timeout)
                .build()
                .map_err(|e| InferenceError::ConnectionFailed {
                    endpoint: config.base_url.clone(),
                    reason: format!("failed to build HTTP client: {e}"),
                })
        };
        let http = build(REQUEST_TIMEOUT)?;
        let http_stream = build(STREAM_REQUEST_TIMEOUT)?;

        Ok(Self {
            http,
            http_stream,
            config,
            retry,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    /// POST the body once. Non-2xx responses become `HttpError`.
    async fn send(
        &self,
        http: &HttpClient,
        body: &ChatCompletionRequest,
        timeout: Duration,
    ) -> Result<reqwest::Response, InferenceError> {
        let url = self.completions_url();
        let mut request = http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(body);
        if body.stream {
            request = request.header("Accept", "text/event-stream");
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_reqwest_error(&url, e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(InferenceError::HttpError {
                status: status.as_u16(),
                body: body_text,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl CompletionService for HttpCompletionClient {
    async fn chat_stream(&self, request: ChatRequest) -> Result<ChunkStream, InferenceError> {
        let has_tools = !request.tools.is_empty();
        let body = ChatCompletionRequest {
            model: self.model_name(request.role).to_string(),
            messages: request.messages,
            tool_choice: has_tools.then(|| "auto".to_string()),
            tools: has_tools.then_some(request.tools),
            temperature: request.temperature.unwrap_or(self.config.temperature),
            max_tokens: request.max_tokens.or(self.config.max_tokens),
            stream: true,
            response_format: None,
        };

        // Metadata only; the body can be huge.
        tracing::info!(
            model = %body.model,
            message_count = body.messages.len(),
            tool_count = body.tools.as_ref().map(|t| t.len()).unwrap_or(0),
            max_tokens = body.max_tokens,
            "=== LLM REQUEST ==="
        );

        let response = self
            .retry
            .run("chat_stream", InferenceError::is_retryable, || {
                self.send(&self.http_stream, &body, STREAM_REQUEST_TIMEOUT)
            })
            .await?;

        Ok(Box::pin(parse_sse_stream(Box::pin(response.bytes_stream()))))
    }

    async fn complete_json(&self, request: JsonRequest) -> Result<JsonCompletion, InferenceError> {
        let model = self.model_name(request.role).to_string();
        let body = ChatCompletionRequest {
            model: model.clone(),
            messages: vec![
                ChatMessage::system(request.system),
                ChatMessage::user(request.prompt),
            ],
            tools: None,
            tool_choice: None,
            temperature: request.temperature.unwrap_or(self.config.json_temperature),
            max_tokens: request.max_tokens.or(self.config.max_tokens),
            stream: false,
            response_format: Some(ResponseFormat {
                r#type: "json_object".to_string(),
            }),
        };

        tracing::debug!(model = %model, action = %request.action, "json completion request");

        let response = self
            .retry
            .run(&request.action, InferenceError::is_retryable, || {
                self.send(&self.http, &body, REQUEST_TIMEOUT)
            })
            .await?;

        let body_text = response.text().await.map_err(|e| InferenceError::StreamError {
            reason: format!("failed to read response body: {e}"),
        })?;

        parse_completion_response(&body_text, &model)
    }

    fn model_name(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Primary => &self.config.chat_model,
            ModelRole::Fast => &self.config.json_model,
        }
    }
}

fn map_reqwest_error(url: &str, e: reqwest::Error, timeout: Duration) -> InferenceError {
    if e.is_timeout() {
        InferenceError::Timeout {
            duration_secs: timeout.as_secs(),
        }
    } else {
        InferenceError::ConnectionFailed {
            endpoint: url.to_string(),
            reason: e.to_string(),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
