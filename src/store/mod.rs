//! Key/value persistence for per-user state.
//!
//! The store itself only knows integers under string keys. Key layout and
//! default values live in [`UserStateRepository`].

mod factory;
mod memory;
mod redis_store;
mod repository;

pub use factory::create_state_store;
pub use memory::MemoryStateStore;
pub use redis_store::RedisStateStore;
pub use repository::{StateKeys, UserStateRepository};

use async_trait::async_trait;
use thiserror::Error;

use crate::redis::{PoolError, RedisDiagnostics};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Circuit breaker open, the command was never sent
    #[error("Store temporarily unavailable")]
    CircuitOpen,

    /// The stored text is not a decimal integer
    #[error("Invalid value for key {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

impl From<PoolError> for StoreError {
    fn from(err: PoolError) -> Self {
        match err {
            PoolError::Redis(e) => StoreError::Redis(e),
            PoolError::CircuitOpen => StoreError::CircuitOpen,
        }
    }
}

/// External key/value store holding integer values.
///
/// Individual `get`/`set` calls are assumed atomic; nothing spanning
/// several calls is.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read an integer, `None` when the key was never written.
    async fn get(&self, key: &str) -> Result<Option<i64>, StoreError>;

    async fn set(&self, key: &str, value: i64) -> Result<(), StoreError>;

    /// Backend identifier for health output
    fn backend_name(&self) -> &'static str;

    fn is_healthy(&self) -> bool {
        true
    }

    /// Connection and circuit breaker details, for Redis-backed stores
    fn redis_diagnostics(&self) -> Option<RedisDiagnostics> {
        None
    }
}

/// Parse a stored decimal integer, tolerating surrounding whitespace.
pub(crate) fn parse_stored_int(key: &str, raw: &str) -> Result<i64, StoreError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| StoreError::InvalidValue {
            key: key.to_string(),
            value: raw.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_stored_int() {
        assert_eq!(parse_stored_int("k", "42").unwrap(), 42);
        assert_eq!(parse_stored_int("k", " 7\n").unwrap(), 7);
        assert_eq!(parse_stored_int("k", "-3").unwrap(), -3);

        let err = parse_stored_int("u_energy", "full").unwrap_err();
        assert!(matches!(err, StoreError::InvalidValue { ref key, .. } if key == "u_energy"));
        assert!(parse_stored_int("k", "1.5").is_err());
    }

    #[test]
    fn test_pool_error_conversion() {
        assert!(matches!(
            StoreError::from(PoolError::CircuitOpen),
            StoreError::CircuitOpen
        ));
    }
}
