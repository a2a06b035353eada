//! Pipeline events: one structured record per stage outcome.
//!
//! Components never log these directly to a global; the orchestrator holds an
//! `EventSink` and emits through it. Production uses `TracingEventSink`, which
//! turns each event into a single flat tracing record with an `event` field.
//! Tests swap in `RecordingEventSink` and assert on the captured sequence.

use std::sync::Mutex;

use serde::Serialize;
use serde_json::Value;

use super::types::Stage;

/// Tracing target for pipeline events, so they can be filtered separately.
pub const EVENT_TARGET: &str = "desktop_relay::events";

/// A correlatable pipeline event. All events of one request share `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PipelineEvent {
    ChatRequestReceived {
        request_id: String,
        body_bytes: usize,
    },
    AgentResponse {
        request_id: String,
        content: String,
    },
    ToolCallResult {
        request_id: String,
        tool: String,
        result: Value,
    },
    AssistantReply {
        request_id: String,
        content: String,
    },
    Error {
        request_id: String,
        stage: Stage,
        kind: String,
        status: u16,
        detail: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        upstream_body: Option<String>,
        /// `data` of a JSON-RPC error object from the desktop.
        #[serde(skip_serializing_if = "Option::is_none")]
        upstream_data: Option<Value>,
    },
}

impl PipelineEvent {
    /// The `event` discriminator.
    pub fn name(&self) -> &'static str {
        match self {
            PipelineEvent::ChatRequestReceived { .. } => "chat_request_received",
            PipelineEvent::AgentResponse { .. } => "agent_response",
            PipelineEvent::ToolCallResult { .. } => "tool_call_result",
            PipelineEvent::AssistantReply { .. } => "assistant_reply",
            PipelineEvent::Error { .. } => "error",
        }
    }

    pub fn request_id(&self) -> &str {
        match self {
            PipelineEvent::ChatRequestReceived { request_id, .. }
            | PipelineEvent::AgentResponse { request_id, .. }
            | PipelineEvent::ToolCallResult { request_id, .. }
            | PipelineEvent::AssistantReply { request_id, .. }
            | PipelineEvent::Error { request_id, .. } => request_id,
        }
    }
}

/// Destination for pipeline events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &PipelineEvent);
}

/// Writes each event as one tracing record under [`EVENT_TARGET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &PipelineEvent) {
        let name = event.name();
        match event {
            PipelineEvent::ChatRequestReceived {
                request_id,
                body_bytes,
            } => {
                tracing::info!(
                    target: EVENT_TARGET,
                    event = name,
                    request_id = %request_id,
                    body_bytes = *body_bytes,
                    "chat request received"
                );
            }
            PipelineEvent::AgentResponse {
                request_id,
                content,
            } => {
                tracing::info!(
                    target: EVENT_TARGET,
                    event = name,
                    request_id = %request_id,
                    content = %content,
                    "agent response"
                );
            }
            PipelineEvent::ToolCallResult {
                request_id,
                tool,
                result,
            } => {
                tracing::info!(
                    target: EVENT_TARGET,
                    event = name,
                    request_id = %request_id,
                    tool = %tool,
                    result = %result,
                    "tool call result"
                );
            }
            PipelineEvent::AssistantReply {
                request_id,
                content,
            } => {
                tracing::info!(
                    target: EVENT_TARGET,
                    event = name,
                    request_id = %request_id,
                    content = %content,
                    "assistant reply"
                );
            }
            PipelineEvent::Error {
                request_id,
                stage,
                kind,
                status,
                detail,
                upstream_body,
                upstream_data,
            } => {
                let upstream_data = upstream_data.as_ref().map(Value::to_string);
                tracing::error!(
                    target: EVENT_TARGET,
                    event = name,
                    request_id = %request_id,
                    stage = %stage,
                    kind = %kind,
                    status = *status,
                    error = %detail,
                    upstream_body = upstream_body.as_deref(),
                    upstream_data = upstream_data.as_deref(),
                    "request failed"
                );
            }
        }
    }
}

/// Captures events in memory.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<PipelineEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of everything emitted so far, in order.
    pub fn events(&self) -> Vec<PipelineEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Event names in emission order.
    pub fn names(&self) -> Vec<&'static str> {
        self.events().iter().map(PipelineEvent::name).collect()
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &PipelineEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
