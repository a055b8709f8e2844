//! Token usage accounting.
//!
//! Every completion call produces a [`UsageEvent`]. Recording is a
//! best-effort side channel: [`record_in_background`] spawns the write and
//! swallows failures, so a broken sink can never affect a response.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// USD per one million tokens: `(model prefix, input, output)`.
const PRICING: &[(&str, f64, f64)] = &[
    ("mistral-large", 2.0, 6.0),
    ("mistral-small", 0.1, 0.3),
];

/// One completion call's token usage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageEvent {
    pub workspace_id: String,
    pub model: String,
    pub action: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub metadata: Value,
}

impl UsageEvent {
    pub fn cost_usd(&self) -> f64 {
        calculate_cost(&self.model, self.tokens_in, self.tokens_out)
    }
}

/// Cost of a call in USD. Unknown models cost nothing.
pub fn calculate_cost(model: &str, tokens_in: u64, tokens_out: u64) -> f64 {
    PRICING
        .iter()
        .find(|(prefix, _, _)| model.starts_with(*prefix))
        .map(|(_, input, output)| {
            (tokens_in as f64 * input + tokens_out as f64 * output) / 1_000_000.0
        })
        .unwrap_or(0.0)
}

#[derive(Debug, Error)]
#[error("usage sink error: {reason}")]
pub struct SinkError {
    pub reason: String,
}

/// Destination for usage events.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, event: UsageEvent) -> Result<(), SinkError>;
}

/// Writes usage events to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingUsageSink;

#[async_trait]
impl UsageSink for TracingUsageSink {
    async fn record(&self, event: UsageEvent) -> Result<(), SinkError> {
        tracing::info!(
            target: "prospect_agent::usage",
            workspace_id = %event.workspace_id,
            model = %event.model,
            action = %event.action,
            tokens_in = event.tokens_in,
            tokens_out = event.tokens_out,
            latency_ms = event.latency_ms,
            cost_usd = event.cost_usd(),
            "usage"
        );
        Ok(())
    }
}

/// Fire-and-forget recording. Must be called from within a tokio runtime.
pub fn record_in_background(sink: Arc<dyn UsageSink>, event: UsageEvent) {
    tokio::spawn(async move {
        let action = event.action.clone();
        if let Err(e) = sink.record(event).await {
            tracing::debug!(action = %action, error = %e, "usage event dropped");
        }
    });
}
