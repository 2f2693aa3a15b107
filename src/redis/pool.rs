//! Shared Redis connection for the state store.

use std::future::Future;
use std::sync::Arc;

use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError, RedisResult};
use tokio::sync::RwLock;

use crate::config::RedisConfig;

use super::{CircuitBreaker, CircuitState, RedisDiagnostics, RedisHealth};

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("Redis error: {0}")]
    Redis(#[from] RedisError),

    #[error("Circuit breaker is open")]
    CircuitOpen,
}

/// One multiplexed connection shared by every task, guarded by a circuit breaker.
///
/// The connection is opened lazily on first use. When a command fails because
/// the connection dropped, it is discarded and the next command reconnects.
pub struct RedisPool {
    client: Client,
    connection: RwLock<Option<MultiplexedConnection>>,
    circuit_breaker: Arc<CircuitBreaker>,
    health: Arc<RedisHealth>,
    config: RedisConfig,
}

impl RedisPool {
    pub fn new(
        config: RedisConfig,
        circuit_breaker: Arc<CircuitBreaker>,
        health: Arc<RedisHealth>,
    ) -> Result<Self, PoolError> {
        let client = Client::open(config.url.as_str())?;

        Ok(Self {
            client,
            connection: RwLock::new(None),
            circuit_breaker,
            health,
            config,
        })
    }

    pub async fn get_connection(&self) -> Result<MultiplexedConnection, PoolError> {
        if !self.circuit_breaker.allow_request() {
            self.health.mark_circuit_open();
            return Err(PoolError::CircuitOpen);
        }

        if let Some(conn) = self.connection.read().await.as_ref() {
            return Ok(conn.clone());
        }

        self.connect().await
    }

    async fn connect(&self) -> Result<MultiplexedConnection, PoolError> {
        let mut guard = self.connection.write().await;

        // Another task may have connected while we waited for the lock
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        match self.client.get_multiplexed_async_connection().await {
            Ok(conn) => {
                *guard = Some(conn.clone());
                self.record_success();
                tracing::info!(url = %self.config.url, "Redis connection established");
                Ok(conn)
            }
            Err(e) => {
                self.health.record_failed_connect();
                self.circuit_breaker.record_failure();
                tracing::error!(error = %e, "Failed to connect to Redis");
                Err(PoolError::Redis(e))
            }
        }
    }

    /// Run one command on the shared connection, recording the outcome
    /// on the circuit breaker.
    pub async fn execute<F, T, Fut>(&self, f: F) -> Result<T, PoolError>
    where
        F: FnOnce(MultiplexedConnection) -> Fut,
        Fut: Future<Output = RedisResult<T>>,
    {
        let conn = self.get_connection().await?;

        match f(conn).await {
            Ok(result) => {
                self.record_success();
                Ok(result)
            }
            Err(e) => {
                if e.is_connection_dropped() || e.is_io_error() {
                    *self.connection.write().await = None;
                    self.health.mark_disconnected();
                }
                self.circuit_breaker.record_failure();
                Err(PoolError::Redis(e))
            }
        }
    }

    /// A successful round trip closes a half-open breaker and clears any
    /// unhealthy status, including one left by a previously open circuit.
    fn record_success(&self) {
        self.circuit_breaker.record_success();
        if !self.health.is_healthy() {
            self.health.mark_healthy();
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.health.is_healthy() && self.circuit_breaker.state() == CircuitState::Closed
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }

    pub fn diagnostics(&self) -> RedisDiagnostics {
        let breaker = self.circuit_breaker.stats();
        RedisDiagnostics {
            status: self.health.status(),
            circuit_state: breaker.state,
            circuit_failures: breaker.failure_count,
            failed_connects: self.health.failed_connects(),
            recoveries: self.health.recoveries(),
            last_healthy_ms: self.health.last_healthy_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redis::{CircuitBreakerConfig, RedisHealthStatus};

    fn pool() -> (RedisPool, Arc<CircuitBreaker>) {
        let cb = Arc::new(CircuitBreaker::with_config(CircuitBreakerConfig {
            failure_threshold: 5,
            success_threshold: 1,
            reset_timeout_ms: 0,
        }));
        let health = Arc::new(RedisHealth::new());
        let pool = RedisPool::new(RedisConfig::default(), cb.clone(), health).unwrap();
        (pool, cb)
    }

    #[test]
    fn test_pool_creation_is_lazy() {
        let (pool, _) = pool();
        assert_eq!(pool.url(), "redis://localhost:6379/0");
        // No connection attempted yet
        assert!(!pool.is_healthy());
        assert_eq!(pool.diagnostics().last_healthy_ms, 0);
    }

    #[test]
    fn test_invalid_url_is_rejected() {
        let config = RedisConfig {
            url: "not a url".to_string(),
            ..Default::default()
        };
        let result = RedisPool::new(
            config,
            Arc::new(CircuitBreaker::new()),
            Arc::new(RedisHealth::new()),
        );
        assert!(matches!(result, Err(PoolError::Redis(_))));
    }

    #[tokio::test]
    async fn test_open_circuit_rejects_without_connecting() {
        let cb = Arc::new(CircuitBreaker::new());
        let pool =
            RedisPool::new(RedisConfig::default(), cb.clone(), Arc::new(RedisHealth::new()))
                .unwrap();
        for _ in 0..5 {
            cb.record_failure();
        }

        let result = pool.get_connection().await;
        assert!(matches!(result, Err(PoolError::CircuitOpen)));

        let diagnostics = pool.diagnostics();
        assert_eq!(diagnostics.status, RedisHealthStatus::CircuitOpen);
        assert_eq!(diagnostics.circuit_state, CircuitState::Open);
    }

    #[test]
    fn test_success_after_open_circuit_restores_health() {
        let (pool, cb) = pool();
        pool.record_success();
        for _ in 0..5 {
            cb.record_failure();
        }
        pool.health.mark_circuit_open();
        assert!(!pool.is_healthy());

        // Half-open trial succeeds on the kept connection
        assert!(cb.allow_request());
        pool.record_success();

        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(pool.is_healthy());
        assert_eq!(pool.diagnostics().status, RedisHealthStatus::Healthy);
    }
}
