//! DesktopClient: JSON-RPC over HTTP to the desktop-control endpoint.
//!
//! One POST per tool call, carrying a fixed-id JSON-RPC 2.0 envelope. The
//! response envelope is inspected here so callers only ever see a result
//! value or a typed `DesktopError`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client as HttpClient;

use super::errors::DesktopError;
use super::types::{error_codes, JsonRpcRequest, JsonRpcResponse, RpcResult, RPC_REQUEST_ID};
use crate::inference::ToolInvocation;
use crate::transport::{build_http_client, clip_body, duration_ms, TransportFailure};

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Executes tool invocations on the remote desktop.
#[async_trait]
pub trait DesktopControl: Send + Sync {
    async fn invoke(&self, invocation: &ToolInvocation) -> Result<RpcResult, DesktopError>;
}

// ─── DesktopClient ───────────────────────────────────────────────────────────

/// Client for the desktop-control JSON-RPC endpoint.
pub struct DesktopClient {
    http: HttpClient,
    /// JSON-RPC URL, e.g. `http://cua-desktop:14500/jsonrpc`.
    endpoint: String,
    timeout: Duration,
}

impl DesktopClient {
    /// Create a client for `endpoint` with a total per-call `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, DesktopError> {
        let endpoint = endpoint.into();
        let http = build_http_client(timeout).map_err(|e| DesktopError::Unavailable {
            endpoint: endpoint.clone(),
            reason: format!("failed to build HTTP client: {e}"),
        })?;

        Ok(Self {
            http,
            endpoint,
            timeout,
        })
    }

    /// The JSON-RPC URL this client posts to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn transport_error(&self, method: &str, err: &reqwest::Error) -> DesktopError {
        match TransportFailure::classify(err) {
            TransportFailure::Timeout => DesktopError::Timeout {
                method: method.to_string(),
                timeout_ms: duration_ms(self.timeout),
            },
            TransportFailure::Unavailable(reason) => DesktopError::Unavailable {
                endpoint: self.endpoint.clone(),
                reason,
            },
        }
    }
}

#[async_trait]
impl DesktopControl for DesktopClient {
    async fn invoke(&self, invocation: &ToolInvocation) -> Result<RpcResult, DesktopError> {
        let request = JsonRpcRequest::from_invocation(invocation);
        let method = request.method.as_str();

        tracing::debug!(
            url = %self.endpoint,
            method = %method,
            arg_count = invocation.args.len(),
            "sending desktop RPC"
        );

        let response = self
            .http
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(method, &e))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            tracing::warn!(
                url = %self.endpoint,
                method = %method,
                status = status.as_u16(),
                "desktop returned non-success status"
            );
            return Err(DesktopError::UpstreamError {
                status: status.as_u16(),
                body: clip_body(&body_text),
            });
        }

        let body_text = response
            .text()
            .await
            .map_err(|e| match self.transport_error(method, &e) {
                timeout @ DesktopError::Timeout { .. } => timeout,
                _ => DesktopError::MalformedResponse {
                    reason: format!("failed to read response body: {e}"),
                },
            })?;

        let envelope = JsonRpcResponse::from_body(&body_text)?;

        if let Some(id) = envelope.id.as_ref().filter(|id| **id != RPC_REQUEST_ID) {
            tracing::warn!(method = %method, id = %id, "desktop response id mismatch");
        }

        match envelope.into_outcome(method) {
            Ok(result) => {
                tracing::debug!(method = %method, result = %result, "desktop RPC succeeded");
                Ok(RpcResult { result })
            }
            Err(err) => {
                if let DesktopError::RpcError { code, message, .. } = &err {
                    tracing::warn!(
                        method = %method,
                        code = *code,
                        code_label = error_codes::label(*code).unwrap_or("application"),
                        message = %message,
                        "desktop RPC returned an error object"
                    );
                }
                Err(err)
            }
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
