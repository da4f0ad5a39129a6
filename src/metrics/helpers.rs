//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    ADMISSIONS_TOTAL, CONNECTIONS_REGISTERED, CONNECTION_DURATION, DELIVERIES_FAILED_TOTAL,
    DELIVERIES_TOTAL, INBOUND_EVENTS_TOTAL, MESSAGES_RELAYED_TOTAL, PRESENCE_BROADCASTS_TOTAL,
    REJECTIONS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording admission outcomes
pub struct AdmissionMetrics;

impl AdmissionMetrics {
    pub fn record_admitted() {
        ADMISSIONS_TOTAL.inc();
    }

    /// `reason` is one of: missing_credential, invalid_token, unknown_identity,
    /// resolver_error, timeout
    pub fn record_rejected(reason: &str) {
        REJECTIONS_TOTAL.with_label_values(&[reason]).inc();
    }
}

/// Helper struct for registry-level metrics
pub struct ConnectionMetrics;

impl ConnectionMetrics {
    pub fn set_registered(count: usize) {
        CONNECTIONS_REGISTERED.set(count as i64);
    }

    pub fn observe_duration(seconds: f64) {
        CONNECTION_DURATION.observe(seconds);
    }
}

/// Helper struct for fan-out metrics
pub struct FanoutMetrics;

impl FanoutMetrics {
    pub fn record_presence_broadcast() {
        PRESENCE_BROADCASTS_TOTAL.inc();
    }

    pub fn record_message_relayed() {
        MESSAGES_RELAYED_TOTAL.inc();
    }

    pub fn record_delivered(count: u64) {
        DELIVERIES_TOTAL.inc_by(count);
    }

    pub fn record_failed(count: u64) {
        DELIVERIES_FAILED_TOTAL.inc_by(count);
    }
}

/// Helper struct for inbound client event metrics
pub struct InboundMetrics;

impl InboundMetrics {
    pub fn record_accepted() {
        INBOUND_EVENTS_TOTAL.with_label_values(&["accepted"]).inc();
    }

    /// Event from a connection that is no longer registered
    pub fn record_dropped() {
        INBOUND_EVENTS_TOTAL.with_label_values(&["dropped"]).inc();
    }

    pub fn record_malformed() {
        INBOUND_EVENTS_TOTAL.with_label_values(&["malformed"]).inc();
    }
}
