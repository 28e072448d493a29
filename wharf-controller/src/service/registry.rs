//! Project Metadata Registry
//!
//! Deployment metadata per project, keyed by project name. Seeded from the
//! discovered compose manifests and replaced entry by entry as builds
//! complete. Every update is forwarded to the attached router.
//!
//! Router frames are queued while the map lock is held, so the router sees
//! snapshots and updates in the order the map changed. Queuing never waits on
//! the network.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use wharf_core::domain::project::ProjectMetadata;

use super::session::{
    ConnectionId, Outbound, OutboundSender, Role, SessionError, Sessions, queue,
};

pub struct ProjectRegistry {
    projects: Mutex<HashMap<String, ProjectMetadata>>,
    sessions: Arc<Sessions>,
}

impl ProjectRegistry {
    pub fn new(sessions: Arc<Sessions>, initial: Vec<ProjectMetadata>) -> Self {
        let projects = initial
            .into_iter()
            .map(|metadata| (metadata.project_name.clone(), metadata))
            .collect();

        Self {
            projects: Mutex::new(projects),
            sessions,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, ProjectMetadata>> {
        self.projects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Point-in-time copy of every project, ordered by name
    pub fn get_all(&self) -> Vec<ProjectMetadata> {
        let mut snapshot: Vec<ProjectMetadata> = self.lock().values().cloned().collect();
        snapshot.sort_by(|a, b| a.project_name.cmp(&b.project_name));
        snapshot
    }

    #[cfg(test)]
    pub fn get(&self, project_name: &str) -> Option<ProjectMetadata> {
        self.lock().get(project_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Replaces the entry for `metadata.project_name` and notifies the router
    ///
    /// The router receives a one-element array. With no router attached the
    /// entry simply waits for the next snapshot.
    pub fn update(&self, metadata: ProjectMetadata) {
        let project = metadata.project_name.clone();
        let mut projects = self.lock();
        let notified = self.sessions.send_json(Role::Router, &[&metadata]);
        projects.insert(project.clone(), metadata);
        drop(projects);

        match notified {
            Ok(()) => tracing::debug!(project = %project, "Router notified of update"),
            Err(SessionError::NotAttached(_)) => {
                tracing::debug!(project = %project, "No router attached, update buffered")
            }
            Err(e) => tracing::warn!(project = %project, "Failed to notify router: {}", e),
        }
    }

    /// Attaches router connection `id` and queues the full snapshot to it
    ///
    /// Returns the number of projects in the snapshot.
    pub fn attach_router(
        &self,
        id: ConnectionId,
        sender: OutboundSender,
    ) -> Result<usize, SessionError> {
        let projects = self.lock();
        let mut snapshot: Vec<&ProjectMetadata> = projects.values().collect();
        snapshot.sort_by(|a, b| a.project_name.cmp(&b.project_name));
        let frame = serde_json::to_string(&snapshot)?;

        self.sessions.attach_then(Role::Router, id, sender, |tx| {
            queue(tx, Role::Router, Outbound::Text(frame))
        })?;

        Ok(snapshot.len())
    }
}
