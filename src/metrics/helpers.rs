//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::connection_manager::ConnectionStats;
use crate::redis::RedisDiagnostics;

use super::{
    CONNECTIONS_ACTIVE, MESSAGES_DELIVERED_TOTAL, MESSAGES_FAILED_TOTAL,
    REDIS_CIRCUIT_BREAKER_STATE, REDIS_RECOVERIES, STORE_ERRORS_TOTAL, STORE_HEALTHY,
    TICK_CYCLES_TOTAL, TICK_DURATION, TICK_USER_UPDATES_TOTAL, USERS_CONNECTED,
    WS_CONNECTIONS_CLOSED, WS_CONNECTIONS_OPENED, WS_CONNECTIONS_REJECTED,
    WS_CONNECTION_DURATION, WS_MESSAGES_RECEIVED,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

pub struct ConnectionMetrics;

impl ConnectionMetrics {
    pub fn record_opened() {
        WS_CONNECTIONS_OPENED.inc();
    }

    pub fn record_closed(duration_secs: f64) {
        WS_CONNECTIONS_CLOSED.inc();
        WS_CONNECTION_DURATION.observe(duration_secs);
    }

    pub fn record_rejected() {
        WS_CONNECTIONS_REJECTED.inc();
    }
}

pub struct WsMessageMetrics;

impl WsMessageMetrics {
    pub fn record_action(action: &str) {
        WS_MESSAGES_RECEIVED.with_label_values(&[action]).inc();
    }

    pub fn record_ignored() {
        WS_MESSAGES_RECEIVED.with_label_values(&["ignored"]).inc();
    }
}

pub struct DeliveryMetrics;

impl DeliveryMetrics {
    pub fn record(delivered: u64, failed: u64) {
        MESSAGES_DELIVERED_TOTAL.inc_by(delivered);
        MESSAGES_FAILED_TOTAL.inc_by(failed);
    }
}

pub struct TickMetrics;

impl TickMetrics {
    pub fn record_cycle(duration_secs: f64, succeeded: u64, failed: u64) {
        TICK_CYCLES_TOTAL.inc();
        TICK_DURATION.observe(duration_secs);
        TICK_USER_UPDATES_TOTAL
            .with_label_values(&["ok"])
            .inc_by(succeeded);
        TICK_USER_UPDATES_TOTAL
            .with_label_values(&["error"])
            .inc_by(failed);
    }
}

pub struct StoreMetrics;

impl StoreMetrics {
    pub fn record_error(path: &str) {
        STORE_ERRORS_TOTAL.with_label_values(&[path]).inc();
    }
}

/// Gauges refreshed from live state at scrape time
pub struct GaugeMetrics;

impl GaugeMetrics {
    pub fn update_connections(stats: &ConnectionStats) {
        CONNECTIONS_ACTIVE.set(stats.total_connections as i64);
        USERS_CONNECTED.set(stats.unique_users as i64);
    }

    pub fn update_store_health(healthy: bool) {
        STORE_HEALTHY.set(if healthy { 1 } else { 0 });
    }

    pub fn update_redis(diagnostics: &RedisDiagnostics) {
        REDIS_CIRCUIT_BREAKER_STATE.set(diagnostics.circuit_state as i64);
        REDIS_RECOVERIES.set(diagnostics.recoveries as i64);
    }
}
