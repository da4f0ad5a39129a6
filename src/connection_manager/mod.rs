//! Registry of live, authenticated connections.

mod registry;
mod stats;
mod types;

pub use registry::ConnectionRegistry;
pub use stats::ConnectionStats;
pub use types::{ConnectionEntry, ConnectionId, PresenceSnapshot, RegistryError};
