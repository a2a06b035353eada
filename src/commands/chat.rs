//! `POST /chat`.
//!
//! The body is taken as raw bytes so that malformed JSON reaches the
//! orchestrator's validation step and comes back as our own 400, not axum's
//! extractor rejection.

use axum::body::Bytes;
use axum::extract::State;
use axum::Json;

use super::AppState;
use crate::agent_core::{OrchestratorResponse, RelayError};

pub async fn chat(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<OrchestratorResponse>, RelayError> {
    state.orchestrator.handle(&body).await.map(Json)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
