//! Prometheus metrics endpoint.

use axum::{extract::State, http::header::CONTENT_TYPE, response::IntoResponse};

use crate::error::{AppError, Result};
use crate::metrics::{self, GaugeMetrics};
use crate::server::AppState;

/// GET /metrics - Prometheus metrics endpoint
pub async fn prometheus_metrics(State(state): State<AppState>) -> Result<impl IntoResponse> {
    GaugeMetrics::update_connections(&state.registry.stats());
    GaugeMetrics::update_store_health(state.store.is_healthy());
    if let Some(diagnostics) = state.store.redis_diagnostics() {
        GaugeMetrics::update_redis(&diagnostics);
    }

    let output = metrics::encode_metrics()
        .map_err(|e| AppError::Internal(format!("Failed to encode metrics: {}", e)))?;

    Ok((
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    ))
}
