//! `GET /` liveness probe. Never touches the upstreams.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use super::AppState;

pub const SERVICE_NAME: &str = "desktop-relay";

#[derive(Debug, Serialize)]
pub struct Liveness {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub started_at: String,
    pub uptime_secs: u64,
}

pub async fn liveness(State(state): State<AppState>) -> Json<Liveness> {
    Json(Liveness {
        status: "ok",
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        started_at: state.started_at.to_rfc3339(),
        uptime_secs: state.uptime_secs(),
    })
}
