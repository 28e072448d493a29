//! API Module
//!
//! HTTP surface of the controller: the webhook endpoint, the two persistent
//! connection endpoints and monitoring.

pub mod error;
pub mod health;
pub mod socket;
pub mod webhook;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::service::{SessionHub, WebhookIngress};
use socket::ConnectionKeys;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub hub: Arc<SessionHub>,
    pub ingress: Arc<WebhookIngress>,
    pub keys: Arc<ConnectionKeys>,
    pub worker_max_message_size: usize,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Webhook ingress
        .route("/", post(webhook::receive_webhook))
        // Persistent connections
        .route("/worker/{key}", get(socket::worker_socket))
        .route("/router/{key}", get(socket::router_socket))
        // Monitoring
        .route("/health", get(health::health_check))
        .route("/status", get(health::status))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// State wired to in-memory tools, with secrets `github`, `worker` and `router`
#[cfg(test)]
pub(crate) fn test_state() -> AppState {
    use std::path::PathBuf;
    use std::time::Duration;

    use secrecy::SecretString;

    use crate::deploy::fake::{FakePuller, FakeTool};
    use crate::service::{BuildPipeline, PipelineSettings, ProjectRegistry, Sessions};

    let sessions = Arc::new(Sessions::new());
    let registry = Arc::new(ProjectRegistry::new(Arc::clone(&sessions), Vec::new()));
    let pipeline = BuildPipeline::new(
        PipelineSettings {
            apps_dir: PathBuf::from("/srv/apps"),
            image_namespace: "docker.io/acme".to_string(),
            pull_timeout: Duration::from_secs(60),
        },
        Arc::new(FakePuller::default()),
        Arc::new(FakeTool::default()),
        Arc::new(FakeTool::default()),
        registry.clone(),
    );

    AppState {
        hub: Arc::new(SessionHub::new(Arc::clone(&sessions), registry, pipeline)),
        ingress: Arc::new(WebhookIngress::new(
            SecretString::from("github".to_string()),
            sessions,
        )),
        keys: Arc::new(ConnectionKeys::new(
            SecretString::from("worker".to_string()),
            SecretString::from("router".to_string()),
        )),
        worker_max_message_size: 10240,
    }
}
