//! Agent client error types.
//!
//! All errors implement `std::error::Error` via `thiserror`. Structured logging
//! is the caller's responsibility; these types carry the context needed to build
//! meaningful log entries.

use thiserror::Error;

/// Errors that can occur while requesting a completion from the model endpoint.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The model endpoint did not respond within the configured timeout.
    #[error("agent request to {endpoint} timed out after {timeout_ms}ms")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// TCP/DNS/HTTP connection to the model endpoint failed.
    #[error("agent unavailable at {endpoint}: {reason}")]
    Unavailable { endpoint: String, reason: String },

    /// Non-2xx HTTP response from the model endpoint.
    #[error("agent returned HTTP {status}: {body}")]
    UpstreamError { status: u16, body: String },

    /// 2xx response without a usable `choices[0].message.content`.
    #[error("malformed agent response: {reason}")]
    MalformedResponse { reason: String },
}

/// An inbound chat request that failed validation.
///
/// Raised before any upstream call is attempted.
#[derive(Debug, Error)]
#[error("{reason}")]
pub struct InvalidRequest {
    pub reason: String,
}

impl InvalidRequest {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
