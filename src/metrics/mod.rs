//! Prometheus metrics for the presence gateway.
//!
//! - Connection metrics (registered connections, admissions, rejections)
//! - Fan-out metrics (presence broadcasts, relayed chat messages, deliveries)
//! - Inbound metrics (dropped and malformed client events)

mod helpers;

pub use helpers::{encode_metrics, AdmissionMetrics, ConnectionMetrics, FanoutMetrics, InboundMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "presence";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    /// Number of registered (admitted, open) connections
    pub static ref CONNECTIONS_REGISTERED: IntGauge = register_int_gauge!(
        format!("{}_connections_registered", METRIC_PREFIX),
        "Number of registered WebSocket connections"
    ).unwrap();

    /// Successful admissions
    pub static ref ADMISSIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_admissions_total", METRIC_PREFIX),
        "Total connections admitted"
    ).unwrap();

    /// Rejected admissions by cause
    pub static ref REJECTIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_rejections_total", METRIC_PREFIX),
        "Total connection attempts rejected during authentication",
        &["reason"]
    ).unwrap();

    /// Connection lifetime
    pub static ref CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_connection_duration_seconds", METRIC_PREFIX),
        "Registered connection duration in seconds",
        vec![1.0, 5.0, 10.0, 30.0, 60.0, 300.0, 600.0, 1800.0, 3600.0]
    ).unwrap();

    // ============================================================================
    // Fan-out Metrics
    // ============================================================================

    /// updated-clients broadcasts emitted
    pub static ref PRESENCE_BROADCASTS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_presence_broadcasts_total", METRIC_PREFIX),
        "Total updated-clients broadcasts"
    ).unwrap();

    /// message-from-server broadcasts emitted
    pub static ref MESSAGES_RELAYED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_relayed_total", METRIC_PREFIX),
        "Total chat messages relayed to peers"
    ).unwrap();

    /// Per-connection enqueues that succeeded
    pub static ref DELIVERIES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_deliveries_total", METRIC_PREFIX),
        "Total outbound frames queued to connections"
    ).unwrap();

    /// Per-connection enqueues that failed (queue full or closed)
    pub static ref DELIVERIES_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_deliveries_failed_total", METRIC_PREFIX),
        "Total outbound frames that could not be queued"
    ).unwrap();

    // ============================================================================
    // Inbound Metrics
    // ============================================================================

    /// Inbound client events by outcome
    pub static ref INBOUND_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_inbound_events_total", METRIC_PREFIX),
        "Inbound client events by outcome",
        &["outcome"]
    ).unwrap();
}
