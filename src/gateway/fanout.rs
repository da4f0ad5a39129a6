use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::connection_manager::ConnectionId;
use crate::metrics::FanoutMetrics;
use crate::websocket::OutboundMessage;

use super::Broadcast;

/// Result of delivering a batch of broadcasts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    /// Frames queued to a connection
    pub delivered: usize,
    /// Recipients whose queue was full, closed, or already gone
    pub failed: usize,
}

/// Outbound queues of open connections, keyed by connection id.
///
/// A sink is installed before the connection is registered and removed after
/// it is unregistered, so every registered connection has one.
#[derive(Default)]
pub struct PeerSinks {
    sinks: DashMap<ConnectionId, mpsc::Sender<OutboundMessage>>,
}

impl PeerSinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, connection_id: ConnectionId, sender: mpsc::Sender<OutboundMessage>) {
        self.sinks.insert(connection_id, sender);
    }

    pub fn remove(&self, connection_id: ConnectionId) {
        self.sinks.remove(&connection_id);
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Queue every broadcast to its recipients. Best effort: never waits and
    /// never retries.
    pub fn deliver(&self, broadcasts: &[Broadcast]) -> DeliveryResult {
        let mut result = DeliveryResult::default();

        for broadcast in broadcasts {
            let outbound = match OutboundMessage::encode(&broadcast.message) {
                Ok(outbound) => outbound,
                Err(e) => {
                    tracing::error!(
                        event = broadcast.message.event_name(),
                        error = %e,
                        "Failed to serialize broadcast"
                    );
                    result.failed += broadcast.recipients.len();
                    continue;
                }
            };

            for connection_id in &broadcast.recipients {
                if self.send_to(*connection_id, outbound.clone()) {
                    result.delivered += 1;
                } else {
                    result.failed += 1;
                }
            }
        }

        FanoutMetrics::record_delivered(result.delivered as u64);
        FanoutMetrics::record_failed(result.failed as u64);
        result
    }

    fn send_to(&self, connection_id: ConnectionId, message: OutboundMessage) -> bool {
        // Clone the sender so no shard lock is held while sending
        let Some(sender) = self.sinks.get(&connection_id).map(|s| s.value().clone()) else {
            return false;
        };

        match sender.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(connection_id = %connection_id, "Outbound queue full, frame dropped");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(connection_id = %connection_id, "Outbound queue closed");
                false
            }
        }
    }
}
