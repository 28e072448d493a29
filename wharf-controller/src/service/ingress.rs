//! Webhook Ingress
//!
//! Authenticates a push notification, decodes it and hands the worker a build
//! request. A delivery with no worker attached still succeeds so the source
//! host does not redeliver it.

use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;
use tracing::{debug, info};
use wharf_core::domain::push::PushEvent;
use wharf_core::protocol::{Message, WorkRequest};

use super::session::{Role, SessionError, Sessions};
use super::signature::{self, SignatureError};

#[derive(Debug, Error)]
pub enum IngressError {
    #[error("signature rejected: {0}")]
    Signature(#[from] SignatureError),

    #[error("invalid push payload: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to dispatch work request: {0}")]
    Dispatch(#[source] SessionError),
}

/// What became of an accepted delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngressOutcome {
    Dispatched,
    NoWorker,
}

pub struct WebhookIngress {
    secret: SecretString,
    sessions: Arc<Sessions>,
}

impl WebhookIngress {
    pub fn new(secret: SecretString, sessions: Arc<Sessions>) -> Self {
        Self { secret, sessions }
    }

    /// Verifies and forwards one delivery
    ///
    /// `signature` is the raw `X-Hub-Signature` header value.
    pub fn handle(
        &self,
        signature: Option<&str>,
        body: &[u8],
    ) -> Result<IngressOutcome, IngressError> {
        signature::verify_header(self.secret.expose_secret().as_bytes(), signature, body)?;

        let push: PushEvent = serde_json::from_slice(body).map_err(IngressError::Decode)?;
        let repository = push.repository.name.clone();
        debug!(
            repository = %repository,
            branch = push.branch().unwrap_or(&push.git_ref),
            "Verified push event"
        );

        let request = Message::WorkRequest(WorkRequest { github_data: push });
        match self.sessions.send_message(Role::Worker, &request) {
            Ok(()) => {
                info!(repository = %repository, "Build requested");
                Ok(IngressOutcome::Dispatched)
            }
            Err(SessionError::NotAttached(_)) => {
                info!(repository = %repository, "No worker available, skipping build");
                Ok(IngressOutcome::NoWorker)
            }
            Err(e) => Err(IngressError::Dispatch(e)),
        }
    }
}
