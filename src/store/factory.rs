use std::sync::Arc;

use crate::config::{Settings, StoreBackend};
use crate::redis::{CircuitBreaker, CircuitBreakerConfig, RedisHealth, RedisPool};

use super::{MemoryStateStore, RedisStateStore, StateStore, StoreError};

/// Build the configured state store backend.
///
/// The Redis backend connects lazily; only a malformed URL fails here.
pub fn create_state_store(settings: &Settings) -> Result<Arc<dyn StateStore>, StoreError> {
    match settings.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory state store, state is lost on restart");
            Ok(Arc::new(MemoryStateStore::new()))
        }
        StoreBackend::Redis => {
            let circuit_breaker = Arc::new(CircuitBreaker::with_config(
                CircuitBreakerConfig::from(&settings.redis),
            ));
            let health = Arc::new(RedisHealth::new());
            let pool = RedisPool::new(settings.redis.clone(), circuit_breaker, health)?;
            tracing::info!(url = %pool.url(), "Using Redis state store");
            Ok(Arc::new(RedisStateStore::new(Arc::new(pool))))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::redis::CircuitState;

    #[test]
    fn test_memory_backend_selected() {
        let settings = Settings {
            store: StoreConfig {
                backend: StoreBackend::Memory,
            },
            ..Default::default()
        };
        let store = create_state_store(&settings).unwrap();
        assert_eq!(store.backend_name(), "memory");
        assert!(store.is_healthy());
        assert!(store.redis_diagnostics().is_none());
    }

    #[test]
    fn test_redis_backend_selected() {
        let store = create_state_store(&Settings::default()).unwrap();
        assert_eq!(store.backend_name(), "redis");
        // Not connected yet
        assert!(!store.is_healthy());

        let diagnostics = store.redis_diagnostics().unwrap();
        assert_eq!(diagnostics.circuit_state, CircuitState::Closed);
        assert_eq!(diagnostics.recoveries, 0);
    }
}
