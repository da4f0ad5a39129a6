//! Connection statistics

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ConnectionStats {
    pub total_connections: usize,
    pub unique_identities: usize,
}
