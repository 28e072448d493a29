//! Persistent Connection Handlers
//!
//! Workers and routers attach with `GET /worker/{key}` and `GET /router/{key}`.
//! The key is checked before the upgrade. Each accepted socket gets a writer
//! task draining its outbound channel, while the reader loop feeds inbound
//! frames to the hub in arrival order.

use std::fmt::Display;
use std::sync::Arc;

use axum::{
    extract::{
        Path, State, WebSocketUpgrade,
        ws::{Message as WsMessage, WebSocket, rejection::WebSocketUpgradeRejection},
    },
    response::Response,
};
use futures::{Sink, SinkExt, Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};

use crate::api::AppState;
use crate::api::error::{ApiError, ApiResult};
use crate::service::session::{Outbound, outbound_channel};
use crate::service::{ConnectionId, Role, SessionHub};
use crate::service::signature::keys_match;

/// Keys workers and routers must present to attach
#[derive(Debug)]
pub struct ConnectionKeys {
    worker: SecretString,
    router: SecretString,
}

impl ConnectionKeys {
    pub fn new(worker: SecretString, router: SecretString) -> Self {
        Self { worker, router }
    }

    /// Constant-time check of a presented key
    pub fn matches(&self, role: Role, presented: &str) -> bool {
        let expected = match role {
            Role::Worker => &self.worker,
            Role::Router => &self.router,
        };
        keys_match(expected.expose_secret(), presented)
    }
}

/// GET /worker/{key}
pub async fn worker_socket(
    State(state): State<AppState>,
    Path(key): Path<String>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> ApiResult<Response> {
    accept(state, Role::Worker, &key, upgrade)
}

/// GET /router/{key}
pub async fn router_socket(
    State(state): State<AppState>,
    Path(key): Path<String>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> ApiResult<Response> {
    accept(state, Role::Router, &key, upgrade)
}

fn accept(
    state: AppState,
    role: Role,
    key: &str,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> ApiResult<Response> {
    if !state.keys.matches(role, key) {
        return Err(ApiError::InvalidKey(role));
    }

    let mut upgrade = upgrade?;
    if role == Role::Worker {
        upgrade = upgrade.max_message_size(state.worker_max_message_size);
    }

    let hub = Arc::clone(&state.hub);
    Ok(upgrade.on_upgrade(move |socket| handle_socket(socket, role, hub)))
}

async fn handle_socket(socket: WebSocket, role: Role, hub: Arc<SessionHub>) {
    let (sink, stream) = socket.split();
    run_connection(sink, stream, role, hub).await;
}

/// Drives one connection until either side goes away
pub(crate) async fn run_connection<S, R, E>(
    mut sink: S,
    mut stream: R,
    role: Role,
    hub: Arc<SessionHub>,
) where
    S: Sink<WsMessage> + Unpin + Send + 'static,
    R: Stream<Item = Result<WsMessage, E>> + Unpin,
    E: Display,
{
    let id = ConnectionId::new();
    let (tx, mut rx) = outbound_channel();
    let attached = hub.on_connect(role, id, tx);

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            let sent = match frame {
                Outbound::Text(text) => sink.send(WsMessage::Text(text.into())).await,
                Outbound::Close => {
                    let _ = sink.send(WsMessage::Close(None)).await;
                    break;
                }
            };

            if sent.is_err() {
                debug!(connection = %id, "Send failed, peer disconnected");
                break;
            }
        }
        let _ = sink.close().await;
    });

    if !attached {
        // Let the writer deliver the close frame
        let _ = writer.await;
        return;
    }

    loop {
        tokio::select! {
            frame = stream.next() => match frame {
                Some(Ok(WsMessage::Text(text))) => {
                    hub.on_message(role, id, text.as_str().as_bytes()).await
                }
                Some(Ok(WsMessage::Binary(bytes))) => hub.on_message(role, id, &bytes).await,
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(role = %role, connection = %id, "Connection error: {}", e);
                    break;
                }
            },
            _ = &mut writer => break,
        }
    }

    hub.on_disconnect(role, id);
    writer.abort();
    info!(role = %role, connection = %id, "Connection closed");
}
