//! Session Hub
//!
//! Owns the lifecycle of the worker and router connections and dispatches the
//! envelopes they send. Socket handlers report connect, message and disconnect
//! events here; nothing else touches connection identity.
//!
//! Messages are handled inline on the connection's reader task, so envelopes
//! from one connection are processed in arrival order and a worker can never
//! have two deployments in flight.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use wharf_core::domain::outcome::BuildOutcome;
use wharf_core::protocol::{Message, PingRequest, PingResponse, WorkerState};

use super::pipeline::BuildPipeline;
use super::registry::ProjectRegistry;
use super::session::{ConnectionId, Outbound, OutboundSender, Role, SessionError, Sessions};

/// Last liveness report received from the worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerPing {
    pub state: WorkerState,
    pub seen_at: DateTime<Utc>,
}

pub struct SessionHub {
    sessions: Arc<Sessions>,
    registry: Arc<ProjectRegistry>,
    pipeline: BuildPipeline,
    last_ping: Mutex<Option<WorkerPing>>,
}

impl SessionHub {
    pub fn new(
        sessions: Arc<Sessions>,
        registry: Arc<ProjectRegistry>,
        pipeline: BuildPipeline,
    ) -> Self {
        Self {
            sessions,
            registry,
            pipeline,
            last_ping: Mutex::new(None),
        }
    }

    pub fn sessions(&self) -> &Arc<Sessions> {
        &self.sessions
    }

    pub fn registry(&self) -> &Arc<ProjectRegistry> {
        &self.registry
    }

    /// Registers a freshly upgraded connection
    ///
    /// Returns false when the role is already held. The newcomer is asked to
    /// close and the incumbent is left alone. An attached router has the full
    /// registry snapshot queued before any later update.
    pub fn on_connect(&self, role: Role, id: ConnectionId, sender: OutboundSender) -> bool {
        let attached = match role {
            Role::Worker => self.sessions.attach(role, id, sender.clone()),
            Role::Router => self
                .registry
                .attach_router(id, sender.clone())
                .map(|projects| {
                    debug!(connection = %id, projects, "Queued registry snapshot");
                }),
        };

        if let Err(e) = attached {
            warn!(role = %role, connection = %id, "Rejecting connection: {}", e);
            let _ = sender.try_send(Outbound::Close);
            return false;
        }

        info!(role = %role, connection = %id, "Connection attached");
        true
    }

    /// Releases the slot held by connection `id`, if any
    pub fn on_disconnect(&self, role: Role, id: ConnectionId) {
        if !self.sessions.detach(role, id) {
            debug!(role = %role, connection = %id, "Ignoring disconnect of inactive connection");
            return;
        }

        if role == Role::Worker {
            *self.last_ping.lock().unwrap_or_else(PoisonError::into_inner) = None;
        }

        info!(role = %role, connection = %id, "Connection detached");
    }

    /// Handles one inbound frame
    ///
    /// Frames from a connection that does not hold its role are ignored.
    /// Undecodable frames are logged and dropped.
    pub async fn on_message(&self, role: Role, id: ConnectionId, bytes: &[u8]) {
        if !self.sessions.is_current(role, id) {
            debug!(role = %role, connection = %id, "Ignoring frame from inactive connection");
            return;
        }

        let message = match Message::from_slice(bytes) {
            Ok(message) => message,
            Err(e) => {
                warn!(role = %role, connection = %id, "Dropping undecodable frame: {}", e);
                return;
            }
        };

        match (role, message) {
            (Role::Worker, Message::WorkResponse(outcome)) => self.on_work_response(outcome).await,
            (Role::Worker, Message::PingResponse(PingResponse { state })) => {
                debug!(connection = %id, state = %state, "Worker ping answered");
                *self.last_ping.lock().unwrap_or_else(PoisonError::into_inner) = Some(WorkerPing {
                    state,
                    seen_at: Utc::now(),
                });
            }
            (role, other) => {
                warn!(role = %role, kind = %other.kind(), "Dropping unexpected message");
            }
        }
    }

    async fn on_work_response(&self, outcome: BuildOutcome) {
        let project = outcome.project_name().to_string();

        if outcome.is_failure() {
            error!(project = %project, "Worker reported failed build: {}", outcome.error_message);
            return;
        }

        if let Err(e) = self.pipeline.run(&outcome).await {
            error!(project = %project, step = e.step(), "Deployment failed: {}", e);
        }
    }

    /// Sends an envelope to the connection holding `role`
    pub fn send(&self, role: Role, message: &Message) -> Result<(), SessionError> {
        self.sessions.send_message(role, message)
    }

    pub fn worker_ping(&self) -> Option<WorkerPing> {
        *self.last_ping.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Pings the attached worker every `interval`
pub fn spawn_liveness_probe(hub: Arc<SessionHub>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            match hub.send(Role::Worker, &Message::PingRequest(PingRequest {})) {
                Ok(()) => debug!("Pinged worker"),
                Err(SessionError::NotAttached(_)) => {}
                Err(e) => warn!("Failed to ping worker: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deploy::fake::{FakePuller, FakeTool};
    use crate::service::pipeline::PipelineSettings;
    use std::path::PathBuf;
    use crate::service::session::{OutboundReceiver, outbound_channel};
    use wharf_core::domain::project::{BuildInfo, ProjectMetadata};

    struct Harness {
        hub: SessionHub,
        puller: FakePuller,
        compose: FakeTool,
    }

    fn harness(puller: FakePuller, initial: Vec<ProjectMetadata>) -> Harness {
        let sessions = Arc::new(Sessions::new());
        let registry = Arc::new(ProjectRegistry::new(Arc::clone(&sessions), initial));
        let compose = FakeTool::default();
        let pipeline = BuildPipeline::new(
            PipelineSettings {
                apps_dir: PathBuf::from("/srv/apps"),
                image_namespace: "docker.io/acme".to_string(),
                pull_timeout: Duration::from_secs(60),
            },
            Arc::new(puller.clone()),
            Arc::new(FakeTool::default()),
            Arc::new(compose.clone()),
            Arc::clone(&registry),
        );

        Harness {
            hub: SessionHub::new(sessions, registry, pipeline),
            puller,
            compose,
        }
    }

    fn connect(hub: &SessionHub, role: Role) -> (ConnectionId, OutboundReceiver, bool) {
        let id = ConnectionId::new();
        let (tx, rx) = outbound_channel();
        let attached = hub.on_connect(role, id, tx);
        (id, rx, attached)
    }

    fn demo_metadata() -> ProjectMetadata {
        ProjectMetadata {
            project_name: "demo".to_string(),
            builds: vec![BuildInfo {
                name: "api".to_string(),
                ..Default::default()
            }],
            routes: Vec::new(),
        }
    }

    fn work_response(error_message: &str) -> Vec<u8> {
        serde_json::to_vec(&serde_json::json!({
            "type": 1,
            "messageData": {
                "errorMessage": error_message,
                "projectMetadata": {
                    "projectName": "demo",
                    "builds": [{ "name": "api" }]
                }
            }
        }))
        .unwrap()
    }

    fn next_text(rx: &mut OutboundReceiver) -> String {
        match rx.try_recv().unwrap() {
            Outbound::Text(text) => text,
            Outbound::Close => panic!("expected a text frame"),
        }
    }

    #[tokio::test]
    async fn test_second_worker_is_rejected() {
        let h = harness(FakePuller::default(), Vec::new());
        let (first, mut first_rx, attached) = connect(&h.hub, Role::Worker);
        assert!(attached);

        let (_, mut second_rx, attached) = connect(&h.hub, Role::Worker);
        assert!(!attached);
        assert_eq!(second_rx.try_recv().unwrap(), Outbound::Close);

        assert!(h.hub.sessions().is_current(Role::Worker, first));
        h.hub
            .send(Role::Worker, &Message::PingRequest(PingRequest {}))
            .unwrap();
        assert!(next_text(&mut first_rx).contains("\"type\":2"));
    }

    #[tokio::test]
    async fn test_router_receives_snapshot_on_connect() {
        let h = harness(FakePuller::default(), vec![demo_metadata()]);
        let (_, mut rx, _) = connect(&h.hub, Role::Router);

        let snapshot: Vec<ProjectMetadata> = serde_json::from_str(&next_text(&mut rx)).unwrap();
        assert_eq!(snapshot, vec![demo_metadata()]);
    }

    #[tokio::test]
    async fn test_reconnect_after_disconnect() {
        let h = harness(FakePuller::default(), Vec::new());
        let (first, _rx, _) = connect(&h.hub, Role::Worker);
        h.hub.on_disconnect(Role::Worker, first);

        let (second, _rx2, attached) = connect(&h.hub, Role::Worker);
        assert!(attached);

        // A late disconnect of the old connection leaves the new one alone
        h.hub.on_disconnect(Role::Worker, first);
        assert!(h.hub.sessions().is_current(Role::Worker, second));
    }

    #[tokio::test]
    async fn test_rejected_connection_cannot_trigger_deploy() {
        let h = harness(FakePuller::default(), Vec::new());
        let (_incumbent, _rx, _) = connect(&h.hub, Role::Worker);
        let (newcomer, _rx2, _) = connect(&h.hub, Role::Worker);

        h.hub.on_message(Role::Worker, newcomer, &work_response("")).await;
        h.hub.on_disconnect(Role::Worker, newcomer);

        assert!(h.puller.started().is_empty());
        assert!(h.hub.registry().is_empty());
        assert!(h.hub.sessions().is_attached(Role::Worker));
    }

    #[tokio::test]
    async fn test_undecodable_frames_are_dropped() {
        let h = harness(FakePuller::default(), Vec::new());
        let (id, _rx, _) = connect(&h.hub, Role::Worker);

        h.hub.on_message(Role::Worker, id, b"not json").await;
        h.hub.on_message(Role::Worker, id, br#"{"type":9}"#).await;
        h.hub
            .on_message(Role::Worker, id, br#"{"type":3,"messageData":{"state":"busy"}}"#)
            .await;

        // The connection keeps working afterwards
        h.hub.on_message(Role::Worker, id, &work_response("")).await;
        assert_eq!(h.hub.registry().get("demo"), Some(demo_metadata()));
    }

    #[tokio::test]
    async fn test_failed_build_runs_no_pipeline_step() {
        let h = harness(FakePuller::default(), Vec::new());
        let (id, _rx, _) = connect(&h.hub, Role::Worker);

        h.hub
            .on_message(Role::Worker, id, &work_response("build failed"))
            .await;

        assert!(h.puller.started().is_empty());
        assert!(h.compose.calls().is_empty());
        assert!(h.hub.registry().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_build_updates_router() {
        let h = harness(
            FakePuller::with_delay(Duration::from_secs(10)),
            Vec::new(),
        );
        let (worker, _worker_rx, _) = connect(&h.hub, Role::Worker);
        let (_, mut router_rx, _) = connect(&h.hub, Role::Router);
        assert_eq!(next_text(&mut router_rx), "[]");

        h.hub.on_message(Role::Worker, worker, &work_response("")).await;

        assert_eq!(h.puller.completed(), vec!["docker.io/acme/demo_api:latest"]);
        assert_eq!(h.hub.registry().get("demo"), Some(demo_metadata()));
        let update: Vec<ProjectMetadata> = serde_json::from_str(&next_text(&mut router_rx)).unwrap();
        assert_eq!(update, vec![demo_metadata()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pull_timeout_notifies_nobody() {
        let h = harness(
            FakePuller::with_delay(Duration::from_secs(120)),
            Vec::new(),
        );
        let (worker, _worker_rx, _) = connect(&h.hub, Role::Worker);
        let (_, mut router_rx, _) = connect(&h.hub, Role::Router);
        next_text(&mut router_rx);

        h.hub.on_message(Role::Worker, worker, &work_response("")).await;

        assert!(h.hub.registry().is_empty());
        assert!(h.compose.calls().is_empty());
        assert!(router_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_ping_response_is_recorded() {
        let h = harness(FakePuller::default(), Vec::new());
        let (id, _rx, _) = connect(&h.hub, Role::Worker);
        assert_eq!(h.hub.worker_ping(), None);

        h.hub
            .on_message(Role::Worker, id, br#"{"type":3,"messageData":{"state":1}}"#)
            .await;
        assert_eq!(h.hub.worker_ping().unwrap().state, WorkerState::Building);
        assert!(h.hub.registry().is_empty());

        h.hub.on_disconnect(Role::Worker, id);
        assert_eq!(h.hub.worker_ping(), None);
    }

    #[tokio::test]
    async fn test_unexpected_kinds_are_dropped() {
        let h = harness(FakePuller::default(), Vec::new());
        let (worker, _rx, _) = connect(&h.hub, Role::Worker);
        let (router, _router_rx, _) = connect(&h.hub, Role::Router);

        h.hub
            .on_message(Role::Worker, worker, br#"{"type":0,"messageData":{}}"#)
            .await;
        h.hub.on_message(Role::Router, router, &work_response("")).await;

        assert!(h.puller.started().is_empty());
        assert!(h.hub.registry().is_empty());
    }

    #[tokio::test]
    async fn test_send_without_worker_fails() {
        let h = harness(FakePuller::default(), Vec::new());
        let err = h
            .hub
            .send(Role::Worker, &Message::PingRequest(PingRequest {}))
            .unwrap_err();
        assert!(matches!(err, SessionError::NotAttached(Role::Worker)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_liveness_probe_pings_attached_worker() {
        let hub = Arc::new(harness(FakePuller::default(), Vec::new()).hub);
        let probe = spawn_liveness_probe(Arc::clone(&hub), Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(31)).await;
        let (_, mut rx, _) = connect(&hub, Role::Worker);
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_secs(30)).await;
        let Outbound::Text(frame) = rx.try_recv().unwrap() else {
            panic!("expected a text frame");
        };
        assert_eq!(
            Message::from_slice(frame.as_bytes()).unwrap(),
            Message::PingRequest(PingRequest {})
        );

        probe.abort();
    }
}
