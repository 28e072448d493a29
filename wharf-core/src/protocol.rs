//! Persistent-connection protocol
//!
//! Every frame exchanged with a worker is an envelope of the form
//! `{ "type": <int>, "messageData": <payload> }`, where the integer tag selects
//! the payload shape:
//!
//! | type | kind |
//! |------|------|
//! | 0 | [`MessageKind::WorkRequest`] |
//! | 1 | [`MessageKind::WorkResponse`] |
//! | 2 | [`MessageKind::PingRequest`] |
//! | 3 | [`MessageKind::PingResponse`] |
//!
//! [`Message`] is the closed set of decoded envelopes. Decoding fails on an
//! unknown tag or on a payload that does not match its tag.

use std::fmt;

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use thiserror::Error;

use crate::domain::outcome::BuildOutcome;
use crate::domain::push::PushEvent;

/// Errors raised while decoding a frame
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed envelope: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("unknown message kind {0}")]
    UnknownKind(i64),

    #[error("malformed {kind} payload: {source}")]
    Payload {
        kind: MessageKind,
        #[source]
        source: serde_json::Error,
    },
}

/// Kind of a message, carried as the envelope's integer tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    WorkRequest,
    WorkResponse,
    PingRequest,
    PingResponse,
}

impl MessageKind {
    /// Wire tag of this kind
    pub fn tag(self) -> u8 {
        match self {
            MessageKind::WorkRequest => 0,
            MessageKind::WorkResponse => 1,
            MessageKind::PingRequest => 2,
            MessageKind::PingResponse => 3,
        }
    }
}

impl TryFrom<i64> for MessageKind {
    type Error = ProtocolError;

    fn try_from(tag: i64) -> Result<Self, Self::Error> {
        match tag {
            0 => Ok(MessageKind::WorkRequest),
            1 => Ok(MessageKind::WorkResponse),
            2 => Ok(MessageKind::PingRequest),
            3 => Ok(MessageKind::PingResponse),
            other => Err(ProtocolError::UnknownKind(other)),
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageKind::WorkRequest => write!(f, "WorkRequest"),
            MessageKind::WorkResponse => write!(f, "WorkResponse"),
            MessageKind::PingRequest => write!(f, "PingRequest"),
            MessageKind::PingResponse => write!(f, "PingResponse"),
        }
    }
}

/// Raw wire envelope, before the payload is interpreted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: i64,

    #[serde(rename = "messageData", default)]
    pub message_data: serde_json::Value,
}

/// Build instruction sent from the controller to the worker
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkRequest {
    #[serde(rename = "githubData", default)]
    pub github_data: PushEvent,
}

/// Liveness probe sent from the controller to the worker
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRequest {}

/// Worker's answer to a [`PingRequest`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {
    #[serde(default)]
    pub state: WorkerState,
}

/// What the worker is doing, as reported in a [`PingResponse`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum WorkerState {
    #[default]
    Idle,
    Building,
}

impl From<WorkerState> for u8 {
    fn from(state: WorkerState) -> Self {
        match state {
            WorkerState::Idle => 0,
            WorkerState::Building => 1,
        }
    }
}

impl TryFrom<u8> for WorkerState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(WorkerState::Idle),
            1 => Ok(WorkerState::Building),
            other => Err(format!("unknown worker state {}", other)),
        }
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerState::Idle => write!(f, "Idle"),
            WorkerState::Building => write!(f, "Building"),
        }
    }
}

/// A decoded envelope
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Envelope")]
pub enum Message {
    WorkRequest(WorkRequest),
    WorkResponse(BuildOutcome),
    PingRequest(PingRequest),
    PingResponse(PingResponse),
}

impl Message {
    /// Kind of this message
    pub fn kind(&self) -> MessageKind {
        match self {
            Message::WorkRequest(_) => MessageKind::WorkRequest,
            Message::WorkResponse(_) => MessageKind::WorkResponse,
            Message::PingRequest(_) => MessageKind::PingRequest,
            Message::PingResponse(_) => MessageKind::PingResponse,
        }
    }

    /// Decodes a frame into a message
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let envelope: Envelope = serde_json::from_slice(bytes)?;
        Self::try_from(envelope)
    }

    /// Encodes this message as an envelope frame
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl TryFrom<Envelope> for Message {
    type Error = ProtocolError;

    fn try_from(envelope: Envelope) -> Result<Self, Self::Error> {
        let kind = MessageKind::try_from(envelope.kind)?;

        // Payload-less kinds may be sent with a null or missing messageData
        let data = if envelope.message_data.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            envelope.message_data
        };

        let decoded = match kind {
            MessageKind::WorkRequest => serde_json::from_value(data).map(Message::WorkRequest),
            MessageKind::WorkResponse => serde_json::from_value(data).map(Message::WorkResponse),
            MessageKind::PingRequest => serde_json::from_value(data).map(Message::PingRequest),
            MessageKind::PingResponse => serde_json::from_value(data).map(Message::PingResponse),
        };

        decoded.map_err(|source| ProtocolError::Payload { kind, source })
    }
}

impl Serialize for Message {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut envelope = serializer.serialize_struct("Envelope", 2)?;
        envelope.serialize_field("type", &self.kind().tag())?;
        match self {
            Message::WorkRequest(payload) => envelope.serialize_field("messageData", payload)?,
            Message::WorkResponse(payload) => envelope.serialize_field("messageData", payload)?,
            Message::PingRequest(payload) => envelope.serialize_field("messageData", payload)?,
            Message::PingResponse(payload) => envelope.serialize_field("messageData", payload)?,
        }
        envelope.end()
    }
}
