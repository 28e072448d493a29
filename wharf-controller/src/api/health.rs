//! Health and Status API Handlers

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::AppState;
use crate::service::Role;
use crate::service::session::SessionInfo;

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerPingReport {
    pub state: String,
    pub seen_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub worker: Option<SessionInfo>,
    pub router: Option<SessionInfo>,
    pub worker_ping: Option<WorkerPingReport>,
    pub projects: usize,
}

/// GET /status
/// Connection and registry overview
pub async fn status(State(state): State<AppState>) -> Json<StatusReport> {
    let sessions = state.hub.sessions();

    Json(StatusReport {
        worker: sessions.status(Role::Worker),
        router: sessions.status(Role::Router),
        worker_ping: state.hub.worker_ping().map(|ping| WorkerPingReport {
            state: ping.state.to_string(),
            seen_at: ping.seen_at,
        }),
        projects: state.hub.registry().len(),
    })
}
