//! Desktop client error types.

use thiserror::Error;

/// Errors that can occur while dispatching a tool call to the desktop endpoint.
#[derive(Debug, Error)]
pub enum DesktopError {
    /// The desktop endpoint did not respond within the configured timeout.
    #[error("desktop call '{method}' timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    /// TCP/DNS/HTTP connection to the desktop endpoint failed.
    #[error("desktop unavailable at {endpoint}: {reason}")]
    Unavailable { endpoint: String, reason: String },

    /// Non-2xx HTTP response from the desktop endpoint.
    #[error("desktop returned HTTP {status}: {body}")]
    UpstreamError { status: u16, body: String },

    /// The endpoint answered with a JSON-RPC error object.
    #[error("desktop RPC error [{code}]: {message}")]
    RpcError {
        code: i64,
        message: String,
        data: Option<serde_json::Value>,
    },

    /// The envelope carried neither `result` nor `error`.
    #[error("desktop call '{method}' returned no result")]
    NoResult { method: String },

    /// 2xx response whose body is not a JSON-RPC envelope.
    #[error("malformed desktop response: {reason}")]
    MalformedResponse { reason: String },
}
