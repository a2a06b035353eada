//! Agent client: OpenAI-compatible chat completion client for the vision model.
//!
//! This module handles all communication with the model endpoint:
//! - Validating and forwarding the inbound chat request
//! - Extracting the chosen reply text from the completion response
//! - Interpreting that text as a desktop tool call or assistant prose
//!
//! The client speaks the OpenAI Chat Completions API, so any compatible
//! server can stand in for the model.

pub mod client;
pub mod errors;
pub mod tool_call_parser;
pub mod types;

// Re-exports for convenience
pub use client::{AgentClient, ChatCompletions};
pub use errors::{AgentError, InvalidRequest};
pub use tool_call_parser::{interpret, Interpretation, ToolInvocation};
pub use types::{ChatMessage, ChatRequest, CompletionResult, MessageContent, Role};
