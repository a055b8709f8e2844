//! Server-sent event framing.
//!
//! Every frame carries `id`, `event` and `data` lines and ends with a blank
//! line. Ids start at 0 and grow by one per encoded frame on a connection,
//! whatever the event. `:ping` comments and the `retry:` directive carry no
//! id.

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use crate::agent::StreamEvent;

/// Response headers of an event stream.
pub const SSE_HEADERS: [(&str, &str); 4] = [
    ("content-type", "text/event-stream"),
    ("cache-control", "no-cache, no-transform"),
    ("connection", "keep-alive"),
    ("x-accel-buffering", "no"),
];

/// Frame encoder for one connection. Holds nothing but the id counter.
#[derive(Debug, Default)]
pub struct SseEncoder {
    next_id: u64,
}

impl SseEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encode a named event.
    pub fn encode(&mut self, event: &str, data: &Value) -> String {
        let id = self.next_id;
        self.next_id += 1;
        format!("id: {id}\nevent: {event}\ndata: {data}\n\n")
    }

    pub fn encode_event(&mut self, event: &StreamEvent) -> String {
        self.encode(event.name(), &event.payload())
    }

    /// Keepalive comment; ignored by conforming parsers.
    pub fn ping(&self) -> String {
        format!(":ping {}\n\n", Utc::now().timestamp_millis())
    }

    /// Reconnect backoff advice, sent once before the first event.
    pub fn retry_directive(&self, millis: u64) -> String {
        format!("retry: {millis}\n\n")
    }
}

/// Unique id of one response stream.
pub fn generate_stream_id() -> String {
    format!("stream_{}", Uuid::new_v4().simple())
}
