//! Gateway core: turns registry changes and client events into broadcasts,
//! and fans those broadcasts out to connection queues.

mod dispatcher;
mod fanout;

pub use dispatcher::{
    Broadcast, DispatcherStats, DispatcherStatsSnapshot, EventKind, GatewayDispatcher,
    GatewayEvent,
};
pub use fanout::{DeliveryResult, PeerSinks};
