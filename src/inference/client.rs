//! OpenAI-compatible agent client.
//!
//! Sends the caller's chat request to the model endpoint and extracts the
//! chosen reply text. One attempt per call: no retries, no fallback chain.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;
use serde_json::Value;

use super::errors::AgentError;
use super::types::{ChatRequest, CompletionResult};
use crate::transport::{
    build_http_client, clip_body, duration_ms, truncate_utf8, TransportFailure,
    UPSTREAM_BODY_LIMIT,
};

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Source of chat completions for the orchestrator.
#[async_trait]
pub trait ChatCompletions: Send + Sync {
    async fn complete(&self, request: &ChatRequest) -> Result<CompletionResult, AgentError>;
}

// ─── AgentClient ─────────────────────────────────────────────────────────────

/// Client for the language-model chat completion endpoint.
pub struct AgentClient {
    http: HttpClient,
    /// Full completion URL, e.g. `http://qwen-agent:8000/v1/chat/completions`.
    endpoint: String,
    timeout: Duration,
}

impl AgentClient {
    /// Create a client for `endpoint` with a total per-call `timeout`.
    ///
    /// Does NOT check connectivity; that happens on the first request.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, AgentError> {
        let endpoint = endpoint.into();
        let http = build_http_client(timeout).map_err(|e| AgentError::Unavailable {
            endpoint: endpoint.clone(),
            reason: format!("failed to build HTTP client: {e}"),
        })?;

        Ok(Self {
            http,
            endpoint,
            timeout,
        })
    }

    /// The completion URL this client posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, err: &reqwest::Error) -> AgentError {
        match TransportFailure::classify(err) {
            TransportFailure::Timeout => AgentError::Timeout {
                endpoint: self.endpoint.clone(),
                timeout_ms: duration_ms(self.timeout),
            },
            TransportFailure::Unavailable(reason) => AgentError::Unavailable {
                endpoint: self.endpoint.clone(),
                reason,
            },
        }
    }
}

#[async_trait]
impl ChatCompletions for AgentClient {
    async fn complete(&self, request: &ChatRequest) -> Result<CompletionResult, AgentError> {
        tracing::debug!(
            url = %self.endpoint,
            message_count = request.message_count(),
            timeout_ms = duration_ms(self.timeout),
            "sending chat completion request"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::warn!(
                url = %self.endpoint,
                status = status.as_u16(),
                "agent returned non-success status"
            );
            return Err(AgentError::UpstreamError {
                status: status.as_u16(),
                body: clip_body(&body_text),
            });
        }

        let body_text = response.text().await.map_err(|e| match self.transport_error(&e) {
            timeout @ AgentError::Timeout { .. } => timeout,
            _ => AgentError::MalformedResponse {
                reason: format!("failed to read response body: {e}"),
            },
        })?;

        parse_completion_body(&body_text)
    }
}

// ─── Response Parsing ────────────────────────────────────────────────────────

/// Extract `choices[0].message.content` from a completion response body.
///
/// Each level must be a JSON object (the first choice included); arrays at
/// any level are rejected rather than read positionally.
pub fn parse_completion_body(body: &str) -> Result<CompletionResult, AgentError> {
    let malformed = |reason: &str| AgentError::MalformedResponse {
        reason: reason.to_string(),
    };

    let resp: Value = serde_json::from_str(body).map_err(|e| AgentError::MalformedResponse {
        reason: format!(
            "failed to parse completion response: {e} (body: {})",
            truncate_utf8(body, UPSTREAM_BODY_LIMIT)
        ),
    })?;

    let resp = resp
        .as_object()
        .ok_or_else(|| malformed("completion response is not a JSON object"))?;

    let choice = match resp.get("choices") {
        Some(Value::Array(choices)) => choices
            .first()
            .ok_or_else(|| malformed("empty choices array"))?,
        Some(_) => return Err(malformed("`choices` is not an array")),
        None => return Err(malformed("missing `choices`")),
    };

    let message = choice
        .as_object()
        .ok_or_else(|| malformed("first choice is not an object"))?
        .get("message")
        .filter(|m| !m.is_null())
        .ok_or_else(|| malformed("first choice has no message"))?
        .as_object()
        .ok_or_else(|| malformed("message is not an object"))?;

    match message.get("content") {
        Some(Value::String(content)) => Ok(CompletionResult {
            content: content.clone(),
        }),
        None | Some(Value::Null) => Err(malformed("message has no content")),
        Some(_) => Err(malformed("message content is not a string")),
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
