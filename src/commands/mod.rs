//! HTTP surface of the relay.
//!
//! `POST /chat` runs the pipeline, `GET /` is a liveness probe. Handlers are
//! thin: all decisions live in `agent_core::Orchestrator`.

pub mod chat;
pub mod health;

use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::agent_core::{EventSink, Orchestrator, TracingEventSink};
use crate::config::RelayConfig;
use crate::desktop_client::DesktopClient;
use crate::inference::AgentClient;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub started_at: DateTime<Utc>,
    started: Instant,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            started_at: Utc::now(),
            started: Instant::now(),
        }
    }

    /// Wire the real HTTP clients and the tracing event sink from config.
    pub fn from_config(config: &RelayConfig) -> anyhow::Result<Self> {
        let agent = AgentClient::new(config.agent_url.clone(), config.agent_timeout)
            .context("failed to build agent client")?;
        let desktop = DesktopClient::new(config.desktop_url.clone(), config.desktop_timeout)
            .context("failed to build desktop client")?;
        tracing::info!(
            agent = %agent.endpoint(),
            desktop = %desktop.endpoint(),
            "upstream clients ready"
        );
        let events: Arc<dyn EventSink> = Arc::new(TracingEventSink);

        Ok(Self::new(Orchestrator::new(
            Arc::new(agent),
            Arc::new(desktop),
            events,
        )))
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

/// Build the relay router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(health::liveness))
        .route("/chat", post(chat::chat))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
