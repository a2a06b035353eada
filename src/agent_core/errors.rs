//! Relay pipeline error types.
//!
//! Every failure the pipeline can hit is one `RelayError` variant. The mapping
//! to an HTTP status lives here and nowhere else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::Value;
use thiserror::Error;

use super::types::Stage;
use crate::desktop_client::DesktopError;
use crate::inference::{AgentError, InvalidRequest};

/// Errors surfaced to the caller of `POST /chat`.
#[derive(Debug, Error)]
pub enum RelayError {
    /// The inbound request is not a valid chat request.
    #[error("invalid request: {reason}")]
    Validation { reason: String },

    #[error("agent unavailable: {reason}")]
    AgentUnavailable { endpoint: String, reason: String },

    #[error("agent timed out after {timeout_ms}ms")]
    AgentTimeout { timeout_ms: u64 },

    /// Non-2xx from the model endpoint.
    #[error("agent returned HTTP {status}")]
    AgentUpstream { status: u16, body: String },

    #[error("agent response malformed: {reason}")]
    AgentMalformed { reason: String },

    #[error("desktop unavailable: {reason}")]
    DesktopUnavailable { endpoint: String, reason: String },

    #[error("desktop call '{method}' timed out after {timeout_ms}ms")]
    DesktopTimeout { method: String, timeout_ms: u64 },

    /// Non-2xx from the desktop endpoint.
    #[error("desktop returned HTTP {status}")]
    DesktopUpstream { status: u16, body: String },

    #[error("desktop RPC error [{code}]: {message}")]
    DesktopRpcError {
        code: i64,
        message: String,
        data: Option<Value>,
    },

    #[error("desktop call '{method}' returned no result")]
    DesktopNoResult { method: String },

    #[error("desktop response malformed: {reason}")]
    DesktopMalformed { reason: String },

    /// Anything else, including panics caught at the pipeline boundary.
    #[error("unexpected error while {stage}: {reason}")]
    Unexpected { stage: Stage, reason: String },
}

impl RelayError {
    /// HTTP status for this error.
    ///
    /// 503/504 are transient, 400/502 need different input or upstream state,
    /// 500 is indeterminate. Upstream 4xx means the relay sent something the
    /// upstream refused, so it maps to 500 rather than 502.
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Validation { .. } => StatusCode::BAD_REQUEST,
            RelayError::AgentUnavailable { .. } | RelayError::DesktopUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            RelayError::AgentTimeout { .. } | RelayError::DesktopTimeout { .. } => {
                StatusCode::GATEWAY_TIMEOUT
            }
            RelayError::AgentUpstream { status, .. } | RelayError::DesktopUpstream { status, .. } => {
                upstream_status(*status)
            }
            RelayError::AgentMalformed { .. }
            | RelayError::DesktopRpcError { .. }
            | RelayError::DesktopNoResult { .. }
            | RelayError::DesktopMalformed { .. } => StatusCode::BAD_GATEWAY,
            RelayError::Unexpected { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable name, used as the `kind` field in log records.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Validation { .. } => "validation_error",
            RelayError::AgentUnavailable { .. } => "agent_unavailable",
            RelayError::AgentTimeout { .. } => "agent_timeout",
            RelayError::AgentUpstream { .. } => "agent_upstream_error",
            RelayError::AgentMalformed { .. } => "agent_malformed",
            RelayError::DesktopUnavailable { .. } => "desktop_unavailable",
            RelayError::DesktopTimeout { .. } => "desktop_timeout",
            RelayError::DesktopUpstream { .. } => "desktop_upstream_error",
            RelayError::DesktopRpcError { .. } => "desktop_rpc_error",
            RelayError::DesktopNoResult { .. } => "desktop_no_result",
            RelayError::DesktopMalformed { .. } => "desktop_malformed",
            RelayError::Unexpected { .. } => "unexpected_error",
        }
    }

    /// Upstream response body, for errors that carry one.
    pub fn upstream_body(&self) -> Option<&str> {
        match self {
            RelayError::AgentUpstream { body, .. } | RelayError::DesktopUpstream { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }

    /// The `data` member of a desktop JSON-RPC error object, if any.
    pub fn upstream_data(&self) -> Option<&Value> {
        match self {
            RelayError::DesktopRpcError { data, .. } => data.as_ref(),
            _ => None,
        }
    }
}

fn upstream_status(status: u16) -> StatusCode {
    if (400..500).contains(&status) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::BAD_GATEWAY
    }
}

impl From<InvalidRequest> for RelayError {
    fn from(e: InvalidRequest) -> Self {
        RelayError::Validation { reason: e.reason }
    }
}

impl From<AgentError> for RelayError {
    fn from(e: AgentError) -> Self {
        match e {
            AgentError::Timeout { timeout_ms, .. } => RelayError::AgentTimeout { timeout_ms },
            AgentError::Unavailable { endpoint, reason } => {
                RelayError::AgentUnavailable { endpoint, reason }
            }
            AgentError::UpstreamError { status, body } => RelayError::AgentUpstream { status, body },
            AgentError::MalformedResponse { reason } => RelayError::AgentMalformed { reason },
        }
    }
}

impl From<DesktopError> for RelayError {
    fn from(e: DesktopError) -> Self {
        match e {
            DesktopError::Timeout { method, timeout_ms } => {
                RelayError::DesktopTimeout { method, timeout_ms }
            }
            DesktopError::Unavailable { endpoint, reason } => {
                RelayError::DesktopUnavailable { endpoint, reason }
            }
            DesktopError::UpstreamError { status, body } => {
                RelayError::DesktopUpstream { status, body }
            }
            DesktopError::RpcError {
                code,
                message,
                data,
            } => RelayError::DesktopRpcError {
                code,
                message,
                data,
            },
            DesktopError::NoResult { method } => RelayError::DesktopNoResult { method },
            DesktopError::MalformedResponse { reason } => RelayError::DesktopMalformed { reason },
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (self.status(), body).into_response()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
