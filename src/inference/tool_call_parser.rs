//! Tool call interpretation: decides whether a completion is a desktop action.
//!
//! The model is prompted to reply with ONLY a JSON object when it wants to act:
//! ```text
//! {"tool": "click", "args": {"x": 10, "y": 20, "button": "left"}}
//! ```
//! Anything else is conversational text for the user.
//!
//! The parse is strict: the whole completion must be one JSON object carrying a
//! string `tool` and an object `args`. Prose around the JSON, code fences, or a
//! missing key all make it assistant text. `interpret` never fails.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The desktop method name that carries a pointer path for client-side replay.
pub const DRAG_TOOL: &str = "drag";

/// A structured desktop action emitted by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Desktop-control method name, e.g. `"click"`.
    pub tool: String,
    /// Method parameters, forwarded as JSON-RPC `params`.
    pub args: Map<String, Value>,
}

impl ToolInvocation {
    /// The `path` argument of a drag, carried through to the caller.
    ///
    /// `None` for every other tool and for a drag without a `path`.
    pub fn drag_path(&self) -> Option<&Value> {
        if self.tool == DRAG_TOOL {
            self.args.get("path")
        } else {
            None
        }
    }
}

/// Outcome of interpreting one completion.
#[derive(Debug, Clone, PartialEq)]
pub enum Interpretation {
    ToolCall(ToolInvocation),
    /// The original completion text, unchanged.
    Assistant(String),
}

/// Classify a completion as a tool call or assistant text.
pub fn interpret(completion: &str) -> Interpretation {
    match parse_tool_invocation(completion) {
        Some(invocation) => Interpretation::ToolCall(invocation),
        None => Interpretation::Assistant(completion.to_string()),
    }
}

fn parse_tool_invocation(text: &str) -> Option<ToolInvocation> {
    let Value::Object(mut object) = serde_json::from_str::<Value>(text).ok()? else {
        return None;
    };

    let Value::String(tool) = object.remove("tool")? else {
        return None;
    };
    let Value::Object(args) = object.remove("args")? else {
        return None;
    };

    Some(ToolInvocation { tool, args })
}

// ─── Tests ───────────────────────────────────────────────────────────────────
