use axum::extract::ws::Utf8Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::connection_manager::{ConnectionId, PresenceSnapshot};

pub const MESSAGE_FROM_CLIENT: &str = "message-from-client";
pub const MESSAGE_FROM_SERVER: &str = "message-from-server";
pub const UPDATED_CLIENTS: &str = "updated-clients";

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("Malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Unknown event: {0}")]
    UnknownEvent(String),
}

/// Raw inbound frame: `{"type": "<event>", "payload": {...}}`
#[derive(Debug, Deserialize)]
struct ClientFrame {
    #[serde(rename = "type")]
    event: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
struct NewMessagePayload {
    #[serde(default)]
    message: Option<String>,
}

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// Chat line; an absent or null `message` is an empty string
    MessageFromClient { message: String },
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        let frame: ClientFrame = serde_json::from_str(text)?;

        match frame.event.as_str() {
            MESSAGE_FROM_CLIENT => {
                let payload = if frame.payload.is_null() {
                    NewMessagePayload::default()
                } else {
                    serde_json::from_value(frame.payload)?
                };
                Ok(Self::MessageFromClient {
                    message: payload.message.unwrap_or_default(),
                })
            }
            other => Err(MessageError::UnknownEvent(other.to_string())),
        }
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    #[serde(rename = "message-from-server")]
    MessageFromServer {
        #[serde(rename = "fullName")]
        full_name: String,
        message: String,
    },
    #[serde(rename = "updated-clients")]
    UpdatedClients {
        #[serde(rename = "connectedClients")]
        connected_clients: Vec<ConnectionId>,
        /// Registry version of the snapshot; internal only
        #[serde(skip)]
        version: u64,
    },
}

impl ServerMessage {
    pub fn message_from_server(full_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MessageFromServer {
            full_name: full_name.into(),
            message: message.into(),
        }
    }

    pub fn updated_clients(snapshot: PresenceSnapshot) -> Self {
        Self::UpdatedClients {
            connected_clients: snapshot.connection_ids,
            version: snapshot.version,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            Self::MessageFromServer { .. } => MESSAGE_FROM_SERVER,
            Self::UpdatedClients { .. } => UPDATED_CLIENTS,
        }
    }

    pub fn presence_version(&self) -> Option<u64> {
        match self {
            Self::UpdatedClients { version, .. } => Some(*version),
            Self::MessageFromServer { .. } => None,
        }
    }
}

/// A serialized server message ready to be queued to many connections.
///
/// Serialized once per broadcast; cloning only bumps a reference count.
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    text: Utf8Bytes,
    presence_version: Option<u64>,
}

impl OutboundMessage {
    pub fn encode(message: &ServerMessage) -> Result<Self, serde_json::Error> {
        let json = serde_json::to_string(message)?;
        Ok(Self {
            text: Utf8Bytes::from(json),
            presence_version: message.presence_version(),
        })
    }

    pub fn text(&self) -> &Utf8Bytes {
        &self.text
    }

    pub fn into_text(self) -> Utf8Bytes {
        self.text
    }

    pub fn presence_version(&self) -> Option<u64> {
        self.presence_version
    }
}

/// Drops presence snapshots that are not newer than the last one forwarded,
/// so a peer never sees the connected list go back in time.
#[derive(Debug, Default)]
pub struct PresenceOrdering {
    last_forwarded: Option<u64>,
}

impl PresenceOrdering {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the message should be written to the socket
    pub fn should_forward(&mut self, message: &OutboundMessage) -> bool {
        let Some(version) = message.presence_version() else {
            return true;
        };

        match self.last_forwarded {
            Some(last) if version <= last => false,
            _ => {
                self.last_forwarded = Some(version);
                true
            }
        }
    }
}
