//! HTTP surface.
//!
//! - `POST /api/agents/chat`: authenticated agent run over SSE ([`chat`])
//! - `GET /health`: liveness and version
//!
//! Shared state is cheap to clone; the per-request tool registry and
//! system prompt are built from the caller's [`auth::Principal`].

pub mod auth;
pub mod chat;
pub mod errors;
pub mod prompt;

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::agent::{Orchestrator, SourcingPolicy};
use crate::config::AppConfig;
use crate::enrichment::PageReader;
use crate::inference::CompletionService;
use crate::usage::UsageSink;

pub use auth::{token_digest, Principal, Principals};
pub use errors::ApiError;

#[derive(Clone)]
pub struct AppState {
    pub completion: Arc<dyn CompletionService>,
    pub usage: Arc<dyn UsageSink>,
    pub orchestrator: Arc<Orchestrator>,
    pub principals: Arc<Principals>,
    /// Website reader for `enrich_lead`; unset disables the tool.
    pub reader: Option<Arc<dyn PageReader>>,
    pub sourcing: SourcingPolicy,
    pub keepalive: Duration,
    pub client_retry_ms: u64,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        completion: Arc<dyn CompletionService>,
        usage: Arc<dyn UsageSink>,
        principals: Principals,
    ) -> Self {
        let orchestrator = Orchestrator::new(completion.clone(), usage.clone(), config.agent.clone());
        Self {
            completion,
            usage,
            orchestrator: Arc::new(orchestrator),
            principals: Arc::new(principals),
            reader: None,
            sourcing: SourcingPolicy::from(&config.platform),
            keepalive: config.server.keepalive(),
            client_retry_ms: config.server.client_retry_ms,
        }
    }

    pub fn with_reader(mut self, reader: Arc<dyn PageReader>) -> Self {
        self.reader = Some(reader);
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/agents/chat", post(chat::chat))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Bind and serve until Ctrl-C.
pub async fn serve(bind: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;
    use crate::testing::{FakePlatform, RecordingUsageSink, ScriptedCompletion};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    const TOKEN: &str = "tok_test";

    fn config() -> AppConfig {
        parse_config(
            r#"
server:
  keepalive_secs: 60
models:
  api_key: test-key
"#,
        )
        .unwrap()
    }

    fn app(completion: ScriptedCompletion, platform: Option<Arc<FakePlatform>>) -> Router {
        let principal = Principal {
            workspace_id: "ws_1".into(),
            user_id: "user_1".into(),
            workspace_name: Some("Acme".into()),
            company_pitch: Some("Revenue analytics for SaaS.".into()),
            platform: platform.map(|p| p as Arc<dyn crate::platform::ProspectingPlatform>),
        };
        let state = AppState::new(
            &config(),
            Arc::new(completion),
            Arc::new(RecordingUsageSink::default()),
            Principals::new([(token_digest(TOKEN), principal)]),
        );
        router(state)
    }

    fn chat_request(token: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/agents/chat")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    const BODY: &str = r#"{"conversationId": "conv_1", "messages": [{"role": "user", "content": "How many CTOs in France?"}]}"#;

    /// Event names of an SSE body, in order.
    fn event_names(body: &str) -> Vec<String> {
        body.lines()
            .filter_map(|l| l.strip_prefix("event: "))
            .map(str::to_string)
            .collect()
    }

    #[tokio::test]
    async fn test_health() -> Result<(), String> {
        let response = app(ScriptedCompletion::default(), None)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .map_err(|e| e.to_string())?;
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        let body: Value = serde_json::from_slice(&bytes).map_err(|e| e.to_string())?;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_token_is_401() -> Result<(), String> {
        let response = app(ScriptedCompletion::default(), None)
            .oneshot(chat_request(None, BODY))
            .await
            .map_err(|e| e.to_string())?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_unknown_token_is_401() -> Result<(), String> {
        let response = app(ScriptedCompletion::default(), None)
            .oneshot(chat_request(Some("nope"), BODY))
            .await
            .map_err(|e| e.to_string())?;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        Ok(())
    }

    #[tokio::test]
    async fn test_malformed_body_is_400() -> Result<(), String> {
        let response = app(ScriptedCompletion::default(), None)
            .oneshot(chat_request(Some(TOKEN), r#"{"messages": "oops"}"#))
            .await
            .map_err(|e| e.to_string())?;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        let body: Value = serde_json::from_slice(&bytes).map_err(|e| e.to_string())?;
        assert_eq!(body["code"], "INVALID_REQUEST");
        Ok(())
    }

    #[tokio::test]
    async fn test_text_reply_stream() -> Result<(), String> {
        let app = app(ScriptedCompletion::default().with_text("Bonjour !"), None);
        let response = app
            .oneshot(chat_request(Some(TOKEN), BODY))
            .await
            .map_err(|e| e.to_string())?;
        assert_eq!(response.status(), StatusCode::OK);
        for (name, value) in crate::wire::SSE_HEADERS {
            assert_eq!(response.headers()[name], value);
        }

        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        let body = String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())?;

        assert!(body.starts_with("retry: 3000\n\nid: 0\nevent: stream-start\n"));
        assert!(body.contains(r#""conversationId":"conv_1""#));
        assert_eq!(
            event_names(&body),
            vec!["stream-start", "text-delta", "text-delta", "step-complete", "finish", "stream-end"]
        );
        assert!(body.ends_with("event: stream-end\ndata: {}\n\n"));
        Ok(())
    }

    #[tokio::test]
    async fn test_tool_start_gets_status_label() -> Result<(), String> {
        let completion = ScriptedCompletion::default()
            .with_tool_calls(&[("count_leads", r#"{"search_filters": {"job_titles": ["CTO"]}}"#)])
            .with_text("There are 42 CTOs.");
        let platform = Arc::new(FakePlatform::with_counts([42]));
        let response = app(completion, Some(platform))
            .oneshot(chat_request(Some(TOKEN), BODY))
            .await
            .map_err(|e| e.to_string())?;
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        let body = String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())?;

        let names = event_names(&body);
        let start = names
            .iter()
            .position(|n| n == "tool-input-start")
            .ok_or("no tool-input-start")?;
        assert_eq!(names[start - 1], "status");
        assert!(body.contains(r#"{"label":"Estimating available leads..."}"#));
        assert!(body.contains(r#"{"count":42}"#));

        // Exactly one terminal event, right before stream-end.
        assert_eq!(names.iter().filter(|n| *n == "finish").count(), 1);
        assert_eq!(names[names.len() - 2], "finish");
        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn test_keepalive_pings_while_a_tool_runs() -> Result<(), String> {
        let completion = ScriptedCompletion::default()
            .with_tool_calls(&[("count_leads", r#"{"search_filters": {"job_titles": ["CTO"]}}"#)])
            .with_text("There are 7 CTOs.");
        let platform =
            Arc::new(FakePlatform::with_counts([7]).with_count_delay(Duration::from_secs(150)));
        let response = app(completion, Some(platform))
            .oneshot(chat_request(Some(TOKEN), BODY))
            .await
            .map_err(|e| e.to_string())?;
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| e.to_string())?;
        let body = String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())?;

        let frames: Vec<&str> = body.split("\n\n").filter(|f| !f.is_empty()).collect();
        let position = |needle: &str| {
            frames
                .iter()
                .position(|f| f.contains(needle))
                .ok_or(format!("no {needle} frame"))
        };
        let input = position("event: tool-input-available")?;
        let output = position("event: tool-output-available")?;
        let end = position("event: stream-end")?;

        let pings: Vec<usize> = frames
            .iter()
            .enumerate()
            .filter(|(_, f)| f.starts_with(":ping "))
            .map(|(i, _)| i)
            .collect();
        // 60s keepalive over a 150s count.
        assert_eq!(pings.len(), 2);
        assert!(pings.iter().all(|&i| input < i && i < output));
        assert!(pings.iter().all(|&i| !frames[i].contains("id:")));
        assert_eq!(end, frames.len() - 1);
        Ok(())
    }
}
