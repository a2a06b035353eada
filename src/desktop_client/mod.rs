//! Desktop client: JSON-RPC over HTTP to the desktop-control surface.
//!
//! This module handles:
//! - Building JSON-RPC 2.0 envelopes from model tool invocations
//! - POSTing them to the desktop endpoint with a bounded timeout
//! - Separating RPC-level errors and missing results from transport failures

pub mod client;
pub mod errors;
pub mod types;

// Re-exports for convenience
pub use client::{DesktopClient, DesktopControl};
pub use errors::DesktopError;
pub use types::{is_known_method, JsonRpcRequest, JsonRpcResponse, RpcResult, KNOWN_METHODS};
