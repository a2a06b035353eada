//! Shared types for the desktop client.
//!
//! JSON-RPC 2.0 envelopes and the desktop-control method catalog.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::errors::DesktopError;
use crate::inference::ToolInvocation;
use crate::transport::{truncate_utf8, UPSTREAM_BODY_LIMIT};

// ─── JSON-RPC 2.0 ───────────────────────────────────────────────────────────

/// Protocol tag carried on every request.
pub const JSONRPC_VERSION: &str = "2.0";

/// Request id used for every call. Each relay request makes at most one
/// desktop call, so ids never need to be correlated.
pub const RPC_REQUEST_ID: u64 = 1;

/// JSON-RPC 2.0 request message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub method: String,
    pub params: Value,
    pub id: u64,
}

impl JsonRpcRequest {
    /// Build the request for a model-emitted tool invocation.
    pub fn from_invocation(invocation: &ToolInvocation) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method: invocation.tool.clone(),
            params: Value::Object(invocation.args.clone()),
            id: RPC_REQUEST_ID,
        }
    }
}

/// JSON-RPC 2.0 response message (success or error).
///
/// `result` distinguishes "absent" (`None`) from an explicit `null`
/// (`Some(Value::Null)`); only the former counts as a missing result.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub jsonrpc: Option<String>,
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default, deserialize_with = "deserialize_present")]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

fn deserialize_present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl JsonRpcResponse {
    /// Parse a response body. Only a JSON object is an envelope; arrays and
    /// scalars are rejected even where serde would read them positionally.
    pub fn from_body(body: &str) -> Result<Self, DesktopError> {
        let malformed = |reason: String| DesktopError::MalformedResponse {
            reason: format!(
                "not a JSON-RPC response: {reason} (body: {})",
                truncate_utf8(body, UPSTREAM_BODY_LIMIT)
            ),
        };

        let value: Value = serde_json::from_str(body).map_err(|e| malformed(e.to_string()))?;
        let Value::Object(object) = &value else {
            return Err(malformed("expected a JSON object".into()));
        };
        if let Some(error) = object.get("error") {
            if !(error.is_null() || error.is_object()) {
                return Err(malformed("`error` must be an object".into()));
            }
        }

        serde_json::from_value(value).map_err(|e| malformed(e.to_string()))
    }

    /// Collapse the envelope into the call outcome.
    ///
    /// An `error` object wins over a `result`; neither present is `NoResult`.
    pub fn into_outcome(self, method: &str) -> Result<Value, DesktopError> {
        if let Some(err) = self.error {
            return Err(DesktopError::RpcError {
                code: err.code,
                message: err.message,
                data: err.data,
            });
        }

        self.result.ok_or_else(|| DesktopError::NoResult {
            method: method.to_string(),
        })
    }
}

/// A successful desktop call.
#[derive(Debug, Clone, PartialEq)]
pub struct RpcResult {
    pub result: Value,
}

// ─── Desktop Methods ────────────────────────────────────────────────────────

/// Methods the desktop-control endpoint is known to expose.
///
/// Not enforced: the endpoint is the authority on what it accepts.
pub const KNOWN_METHODS: &[&str] = &[
    "click",
    "double_click",
    "drag",
    "type",
    "keypress",
    "scroll",
    "move",
    "wait",
    "screenshot",
];

/// Whether `method` is in [`KNOWN_METHODS`].
pub fn is_known_method(method: &str) -> bool {
    KNOWN_METHODS.contains(&method)
}

// ─── Standard Error Codes ───────────────────────────────────────────────────

/// Well-known JSON-RPC error codes.
pub mod error_codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON sent is not a valid Request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist or is not available.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal JSON-RPC error.
    pub const INTERNAL_ERROR: i64 = -32603;

    /// Short label for a well-known code, for log records.
    pub fn label(code: i64) -> Option<&'static str> {
        match code {
            PARSE_ERROR => Some("parse_error"),
            INVALID_REQUEST => Some("invalid_request"),
            METHOD_NOT_FOUND => Some("method_not_found"),
            INVALID_PARAMS => Some("invalid_params"),
            INTERNAL_ERROR => Some("internal_error"),
            -32099..=-32000 => Some("server_error"),
            _ => None,
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
