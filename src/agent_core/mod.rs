//! Agent Core: the relay pipeline between the model and the desktop.
//!
//! Submodules:
//! - `orchestrator`: Per-request pipeline (validate → agent → interpret → desktop)
//! - `events`: Structured, correlatable pipeline events and their sinks
//! - `types`: Response variants and pipeline stages
//! - `errors`: The single caller-facing error enum and its HTTP mapping

pub mod errors;
pub mod events;
pub mod orchestrator;
pub mod types;

// Re-exports for convenience
pub use errors::RelayError;
pub use events::{EventSink, PipelineEvent, RecordingEventSink, TracingEventSink};
pub use orchestrator::Orchestrator;
pub use types::{OrchestratorResponse, Stage};
