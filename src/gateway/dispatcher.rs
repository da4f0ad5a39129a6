use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::connection_manager::{ConnectionId, ConnectionRegistry};
use crate::metrics::{FanoutMetrics, InboundMetrics};
use crate::websocket::ServerMessage;

/// Event reported for a single connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayEvent {
    /// The connection was just registered
    Admitted,
    /// The transport closed; `remove` has already run
    Disconnected,
    /// Inbound `message-from-client`
    ClientMessage { text: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Admitted,
    Disconnected,
    ClientMessage,
}

impl GatewayEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Admitted => EventKind::Admitted,
            Self::Disconnected => EventKind::Disconnected,
            Self::ClientMessage { .. } => EventKind::ClientMessage,
        }
    }
}

/// One server message addressed to a fixed set of connections
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    pub recipients: Vec<ConnectionId>,
    pub message: ServerMessage,
}

type Handler = fn(&ConnectionRegistry, ConnectionId, GatewayEvent) -> Vec<Broadcast>;

/// Statistics for the gateway dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    pub presence_broadcasts: AtomicU64,
    pub messages_relayed: AtomicU64,
    /// Client messages from connections that were not registered
    pub messages_dropped: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            presence_broadcasts: self.presence_broadcasts.load(Ordering::Relaxed),
            messages_relayed: self.messages_relayed.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub presence_broadcasts: u64,
    pub messages_relayed: u64,
    pub messages_dropped: u64,
}

/// Routes per-connection events to handlers.
///
/// Handlers only read the registry and return the broadcasts to perform;
/// delivery is left to the caller.
pub struct GatewayDispatcher {
    registry: Arc<ConnectionRegistry>,
    handlers: HashMap<EventKind, Handler>,
    stats: DispatcherStats,
}

impl GatewayDispatcher {
    pub fn new(registry: Arc<ConnectionRegistry>) -> Self {
        let mut handlers: HashMap<EventKind, Handler> = HashMap::new();
        handlers.insert(EventKind::Admitted, handle_presence_change);
        handlers.insert(EventKind::Disconnected, handle_presence_change);
        handlers.insert(EventKind::ClientMessage, handle_client_message);

        Self {
            registry,
            handlers,
            stats: DispatcherStats::default(),
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    #[tracing::instrument(
        name = "dispatcher.dispatch",
        skip(self, event),
        fields(kind = ?event.kind())
    )]
    pub fn dispatch(&self, connection_id: ConnectionId, event: GatewayEvent) -> Vec<Broadcast> {
        let kind = event.kind();
        let Some(handler) = self.handlers.get(&kind) else {
            tracing::warn!(kind = ?kind, "No handler registered for event");
            return Vec::new();
        };

        let broadcasts = handler(self.registry.as_ref(), connection_id, event);
        self.record(kind, connection_id, &broadcasts);
        broadcasts
    }

    /// Announce the new presence list after `register`
    pub fn on_admitted(&self, connection_id: ConnectionId) -> Vec<Broadcast> {
        self.dispatch(connection_id, GatewayEvent::Admitted)
    }

    /// Announce the new presence list after `remove`, even if nothing was removed
    pub fn on_disconnected(&self, connection_id: ConnectionId) -> Vec<Broadcast> {
        self.dispatch(connection_id, GatewayEvent::Disconnected)
    }

    /// Relay a chat line from `connection_id` to every registered connection
    pub fn on_client_message(
        &self,
        connection_id: ConnectionId,
        text: impl Into<String>,
    ) -> Vec<Broadcast> {
        self.dispatch(
            connection_id,
            GatewayEvent::ClientMessage { text: text.into() },
        )
    }

    fn record(&self, kind: EventKind, connection_id: ConnectionId, broadcasts: &[Broadcast]) {
        match kind {
            EventKind::Admitted | EventKind::Disconnected => {
                self.stats
                    .presence_broadcasts
                    .fetch_add(broadcasts.len() as u64, Ordering::Relaxed);
                for _ in broadcasts {
                    FanoutMetrics::record_presence_broadcast();
                }
            }
            EventKind::ClientMessage if broadcasts.is_empty() => {
                self.stats.messages_dropped.fetch_add(1, Ordering::Relaxed);
                InboundMetrics::record_dropped();
                tracing::debug!(
                    connection_id = %connection_id,
                    "Dropped message from unregistered connection"
                );
            }
            EventKind::ClientMessage => {
                self.stats.messages_relayed.fetch_add(1, Ordering::Relaxed);
                InboundMetrics::record_accepted();
                FanoutMetrics::record_message_relayed();
            }
        }
    }
}

/// Current presence list to everyone currently registered
fn handle_presence_change(
    registry: &ConnectionRegistry,
    _connection_id: ConnectionId,
    _event: GatewayEvent,
) -> Vec<Broadcast> {
    let snapshot = registry.snapshot();
    vec![Broadcast {
        recipients: snapshot.connection_ids.clone(),
        message: ServerMessage::updated_clients(snapshot),
    }]
}

fn handle_client_message(
    registry: &ConnectionRegistry,
    connection_id: ConnectionId,
    event: GatewayEvent,
) -> Vec<Broadcast> {
    let GatewayEvent::ClientMessage { text } = event else {
        return Vec::new();
    };

    let Some(display_name) = registry.display_name_of(connection_id) else {
        return Vec::new();
    };

    vec![Broadcast {
        recipients: registry.all_connection_ids(),
        message: ServerMessage::message_from_server(display_name, text),
    }]
}
