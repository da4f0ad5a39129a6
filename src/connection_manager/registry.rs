use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{ConnectionEntry, ConnectionId, ConnectionStats, PresenceSnapshot, RegistryError};

#[derive(Default)]
struct RegistryState {
    /// connection_id -> ConnectionEntry
    entries: HashMap<ConnectionId, ConnectionEntry>,
    /// Bumped on every successful mutation
    version: u64,
}

/// Authoritative set of live, authenticated connections.
///
/// Every operation takes the internal lock for its whole duration, so readers
/// never observe a partially inserted entry and snapshots are linearized with
/// `register`/`remove`.
#[derive(Default)]
pub struct ConnectionRegistry {
    state: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Poisoning is ignored: every mutation is a single map insert or remove.
    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register an admitted connection
    pub fn register(
        &self,
        connection_id: ConnectionId,
        identity: String,
        display_name: String,
    ) -> Result<(), RegistryError> {
        let mut state = self.write();
        if state.entries.contains_key(&connection_id) {
            return Err(RegistryError::DuplicateConnection(connection_id));
        }

        state.entries.insert(
            connection_id,
            ConnectionEntry::new(connection_id, identity, display_name),
        );
        state.version += 1;

        tracing::info!(
            connection_id = %connection_id,
            total = state.entries.len(),
            "Connection registered"
        );
        Ok(())
    }

    /// Remove a connection. Unknown ids are ignored.
    pub fn remove(&self, connection_id: ConnectionId) -> Option<ConnectionEntry> {
        let mut state = self.write();
        let removed = state.entries.remove(&connection_id);

        match &removed {
            Some(entry) => {
                state.version += 1;
                tracing::info!(
                    connection_id = %connection_id,
                    identity = %entry.identity,
                    total = state.entries.len(),
                    "Connection removed"
                );
            }
            None => {
                tracing::debug!(connection_id = %connection_id, "Remove of unknown connection ignored");
            }
        }

        removed
    }

    pub fn display_name_of(&self, connection_id: ConnectionId) -> Option<String> {
        self.read()
            .entries
            .get(&connection_id)
            .map(|entry| entry.display_name.clone())
    }

    /// Snapshot of all registered connection ids
    pub fn all_connection_ids(&self) -> Vec<ConnectionId> {
        self.read().entries.keys().copied().collect()
    }

    /// Connection ids together with the registry version they were read at
    pub fn snapshot(&self) -> PresenceSnapshot {
        let state = self.read();
        PresenceSnapshot {
            version: state.version,
            connection_ids: state.entries.keys().copied().collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.read().entries.len()
    }

    pub fn stats(&self) -> ConnectionStats {
        let state = self.read();
        let unique: HashSet<&str> = state
            .entries
            .values()
            .map(|entry| entry.identity.as_str())
            .collect();

        ConnectionStats {
            total_connections: state.entries.len(),
            unique_identities: unique.len(),
        }
    }
}
