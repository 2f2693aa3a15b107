//! Redis access for the state store
//!
//! - `RedisPool`: shared multiplexed connection, re-established lazily after drops
//! - `CircuitBreaker`: stops hammering Redis while it is unavailable
//! - `RedisHealth`: connection status, surfaced through `RedisPool::diagnostics`

mod circuit_breaker;
mod health;
mod pool;

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState,
};
pub use health::{RedisDiagnostics, RedisHealth, RedisHealthStatus};
pub use pool::{PoolError, RedisPool};

/// Get current time in milliseconds since epoch
pub(crate) fn current_time_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
