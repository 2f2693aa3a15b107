//! Prometheus metrics for the clicker sync service.
//!
//! - Connection metrics (opened, closed, rejected, active)
//! - Inbound message metrics by action
//! - Tick metrics (cycles, duration, per-user outcomes)
//! - Delivery and store error metrics

mod helpers;

pub use helpers::{
    encode_metrics, ConnectionMetrics, DeliveryMetrics, GaugeMetrics, StoreMetrics, TickMetrics,
    WsMessageMetrics,
};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "clicker";

lazy_static! {
    // ============================================================================
    // Connection Metrics
    // ============================================================================

    pub static ref CONNECTIONS_ACTIVE: IntGauge = register_int_gauge!(
        format!("{}_connections_active", METRIC_PREFIX),
        "Number of live WebSocket connections"
    ).unwrap();

    pub static ref USERS_CONNECTED: IntGauge = register_int_gauge!(
        format!("{}_users_connected", METRIC_PREFIX),
        "Number of users with at least one live connection"
    ).unwrap();

    pub static ref WS_CONNECTIONS_OPENED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_opened_total", METRIC_PREFIX),
        "Total WebSocket connections opened"
    ).unwrap();

    pub static ref WS_CONNECTIONS_CLOSED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_closed_total", METRIC_PREFIX),
        "Total WebSocket connections closed"
    ).unwrap();

    pub static ref WS_CONNECTIONS_REJECTED: IntCounter = register_int_counter!(
        format!("{}_ws_connections_rejected_total", METRIC_PREFIX),
        "Total WebSocket connections rejected by connection limits"
    ).unwrap();

    pub static ref WS_CONNECTION_DURATION: Histogram = register_histogram!(
        format!("{}_ws_connection_duration_seconds", METRIC_PREFIX),
        "WebSocket connection lifetime in seconds",
        vec![1.0, 10.0, 60.0, 300.0, 900.0, 3600.0, 14400.0]
    ).unwrap();

    // ============================================================================
    // Message Metrics
    // ============================================================================

    /// Inbound frames by action ("increment", "set_increment", "ignored")
    pub static ref WS_MESSAGES_RECEIVED: IntCounterVec = register_int_counter_vec!(
        format!("{}_ws_messages_received_total", METRIC_PREFIX),
        "Total inbound WebSocket messages by action",
        &["action"]
    ).unwrap();

    pub static ref MESSAGES_DELIVERED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_delivered_total", METRIC_PREFIX),
        "Total broadcast messages queued on connections"
    ).unwrap();

    pub static ref MESSAGES_FAILED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_messages_failed_total", METRIC_PREFIX),
        "Total broadcast sends that failed or timed out"
    ).unwrap();

    // ============================================================================
    // Tick Metrics
    // ============================================================================

    pub static ref TICK_CYCLES_TOTAL: IntCounter = register_int_counter!(
        format!("{}_tick_cycles_total", METRIC_PREFIX),
        "Total tick cycles run"
    ).unwrap();

    pub static ref TICK_DURATION: Histogram = register_histogram!(
        format!("{}_tick_duration_seconds", METRIC_PREFIX),
        "Time to update and broadcast all users in one tick",
        vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]
    ).unwrap();

    /// Per-user tick updates by result ("ok", "error")
    pub static ref TICK_USER_UPDATES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_tick_user_updates_total", METRIC_PREFIX),
        "Total per-user tick updates by result",
        &["result"]
    ).unwrap();

    // ============================================================================
    // Store Metrics
    // ============================================================================

    /// Store failures by path ("tick", "action", "snapshot")
    pub static ref STORE_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_store_errors_total", METRIC_PREFIX),
        "Total state store failures by path",
        &["path"]
    ).unwrap();

    /// 1 when the state store reports healthy
    pub static ref STORE_HEALTHY: IntGauge = register_int_gauge!(
        format!("{}_store_healthy", METRIC_PREFIX),
        "State store health (1=healthy, 0=unhealthy)"
    ).unwrap();

    /// Redis circuit breaker state (0=closed, 1=open, 2=half_open)
    pub static ref REDIS_CIRCUIT_BREAKER_STATE: IntGauge = register_int_gauge!(
        format!("{}_redis_circuit_breaker_state", METRIC_PREFIX),
        "Redis circuit breaker state (0=closed, 1=open, 2=half_open)"
    ).unwrap();

    pub static ref REDIS_RECOVERIES: IntGauge = register_int_gauge!(
        format!("{}_redis_recoveries", METRIC_PREFIX),
        "Times the Redis connection returned to healthy"
    ).unwrap();
}
