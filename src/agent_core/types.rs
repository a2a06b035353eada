//! Shared types across the relay pipeline.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Pipeline stage of a single request.
///
/// A request moves forward through these in order and stops at the first
/// failure or on reaching `Responding`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Received,
    Validating,
    CallingAgent,
    Interpreting,
    CallingDesktop,
    Responding,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Received => "received",
            Stage::Validating => "validating",
            Stage::CallingAgent => "calling_agent",
            Stage::Interpreting => "interpreting",
            Stage::CallingDesktop => "calling_desktop",
            Stage::Responding => "responding",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Successful outcome of one chat request.
///
/// Failures are carried by `RelayError` and rendered as `{"error": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OrchestratorResponse {
    /// The model asked for a desktop action and the desktop answered.
    ToolResult {
        tool_result: Value,
        /// The drag's `path` argument, for replaying the pointer trail.
        #[serde(skip_serializing_if = "Option::is_none")]
        drag_path: Option<Value>,
    },
    /// The model replied in prose; no desktop call was made.
    Assistant { assistant: String },
}
