use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

/// Transport-assigned identifier of one WebSocket session
pub type ConnectionId = Uuid;

/// One live, admitted connection
#[derive(Debug, Clone)]
pub struct ConnectionEntry {
    pub connection_id: ConnectionId,
    pub identity: String,
    /// Resolved once at admission; never refreshed
    pub display_name: String,
    pub connected_at: DateTime<Utc>,
}

impl ConnectionEntry {
    pub fn new(connection_id: ConnectionId, identity: String, display_name: String) -> Self {
        Self {
            connection_id,
            identity,
            display_name,
            connected_at: Utc::now(),
        }
    }
}

/// Point-in-time view of the registered connection ids.
///
/// `version` increases with every registry mutation, so two snapshots can be
/// ordered even when they are delivered out of order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceSnapshot {
    pub version: u64,
    pub connection_ids: Vec<ConnectionId>,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Connection {0} is already registered")]
    DuplicateConnection(ConnectionId),
}
