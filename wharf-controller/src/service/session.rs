//! Session slots
//!
//! The controller holds at most one worker and at most one router connection.
//! Each attached connection owns an outbound channel drained by its socket's
//! writer task, so sending here never performs network I/O under the lock.
//!
//! A newcomer for an occupied role is refused. The incumbent keeps its slot
//! and only a detach carrying the incumbent's id frees it, so a stale
//! connection can never clear a newer attachment.

use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;
use wharf_core::protocol::Message;

/// Which kind of peer a connection belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Worker,
    Router,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Worker => write!(f, "worker"),
            Role::Router => write!(f, "router"),
        }
    }
}

/// Identity of one accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A frame queued for a connection's writer task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Text(String),
    Close,
}

pub type OutboundSender = mpsc::Sender<Outbound>;
pub type OutboundReceiver = mpsc::Receiver<Outbound>;

/// Frames a connection may have queued before further sends are refused
pub const OUTBOUND_CAPACITY: usize = 64;

/// Creates the outbound queue of one connection
pub fn outbound_channel() -> (OutboundSender, OutboundReceiver) {
    mpsc::channel(OUTBOUND_CAPACITY)
}

/// Queues `frame` without waiting
pub(crate) fn queue(
    sender: &OutboundSender,
    role: Role,
    frame: Outbound,
) -> Result<(), SessionError> {
    sender.try_send(frame).map_err(|e| match e {
        TrySendError::Full(_) => SessionError::Backlogged(role),
        TrySendError::Closed(_) => SessionError::SendFailed(role),
    })
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no {0} attached")]
    NotAttached(Role),

    #[error("a {0} is already attached")]
    Conflict(Role),

    #[error("{0} connection closed")]
    SendFailed(Role),

    #[error("{0} is not draining its queue")]
    Backlogged(Role),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Public view of an occupied slot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub connection_id: ConnectionId,
    pub attached_at: DateTime<Utc>,
}

struct Slot {
    id: ConnectionId,
    sender: OutboundSender,
    attached_at: DateTime<Utc>,
}

#[derive(Default)]
struct Slots {
    worker: Option<Slot>,
    router: Option<Slot>,
}

impl Slots {
    fn slot(&mut self, role: Role) -> &mut Option<Slot> {
        match role {
            Role::Worker => &mut self.worker,
            Role::Router => &mut self.router,
        }
    }
}

/// The worker and router slots
#[derive(Default)]
pub struct Sessions {
    slots: Mutex<Slots>,
}

impl Sessions {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches connection `id` to `role`
    ///
    /// Fails with [`SessionError::Conflict`] when the role is occupied; the
    /// incumbent is left untouched.
    pub fn attach(
        &self,
        role: Role,
        id: ConnectionId,
        sender: OutboundSender,
    ) -> Result<(), SessionError> {
        self.attach_then(role, id, sender, |_| Ok(()))
    }

    /// Attaches connection `id` and queues `first` to it while the slot lock
    /// is still held
    pub(crate) fn attach_then<F>(
        &self,
        role: Role,
        id: ConnectionId,
        sender: OutboundSender,
        first: F,
    ) -> Result<(), SessionError>
    where
        F: FnOnce(&OutboundSender) -> Result<(), SessionError>,
    {
        let mut slots = self.lock();
        let slot = slots.slot(role);
        if slot.is_some() {
            return Err(SessionError::Conflict(role));
        }

        first(&sender)?;
        *slot = Some(Slot {
            id,
            sender,
            attached_at: Utc::now(),
        });
        Ok(())
    }

    /// Frees `role` if connection `id` currently holds it
    ///
    /// Returns whether the slot was cleared. A stale id is a no-op.
    pub fn detach(&self, role: Role, id: ConnectionId) -> bool {
        let mut slots = self.lock();
        let slot = slots.slot(role);
        let held = matches!(*slot, Some(ref current) if current.id == id);
        if held {
            *slot = None;
        }
        held
    }

    /// Whether connection `id` currently holds `role`
    pub fn is_current(&self, role: Role, id: ConnectionId) -> bool {
        matches!(self.lock().slot(role), Some(current) if current.id == id)
    }

    pub fn is_attached(&self, role: Role) -> bool {
        self.lock().slot(role).is_some()
    }

    pub fn status(&self, role: Role) -> Option<SessionInfo> {
        self.lock().slot(role).as_ref().map(|slot| SessionInfo {
            connection_id: slot.id,
            attached_at: slot.attached_at,
        })
    }

    /// Queues a text frame for the connection holding `role`
    pub fn send_text(&self, role: Role, text: String) -> Result<(), SessionError> {
        let sender = self
            .lock()
            .slot(role)
            .as_ref()
            .map(|slot| slot.sender.clone())
            .ok_or(SessionError::NotAttached(role))?;

        queue(&sender, role, Outbound::Text(text))
    }

    /// Queues a protocol envelope for the connection holding `role`
    pub fn send_message(&self, role: Role, message: &Message) -> Result<(), SessionError> {
        self.send_text(role, message.to_json()?)
    }

    /// Queues any serializable value as a JSON text frame
    pub fn send_json<T: Serialize + ?Sized>(
        &self,
        role: Role,
        value: &T,
    ) -> Result<(), SessionError> {
        self.send_text(role, serde_json::to_string(value)?)
    }
}
