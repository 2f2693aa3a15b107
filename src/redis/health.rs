//! Connection status of the shared Redis connection.

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU8, Ordering};

use serde::Serialize;

use super::{current_time_ms, CircuitState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum RedisHealthStatus {
    /// Last command or connect attempt succeeded
    Healthy = 0,
    /// No live connection, the next command will reconnect
    Reconnecting = 1,
    /// Circuit breaker is rejecting commands
    CircuitOpen = 2,
}

impl From<u8> for RedisHealthStatus {
    fn from(value: u8) -> Self {
        match value {
            0 => RedisHealthStatus::Healthy,
            2 => RedisHealthStatus::CircuitOpen,
            _ => RedisHealthStatus::Reconnecting,
        }
    }
}

/// Lock-free status cell updated by the pool on every outcome.
///
/// Starts in `Reconnecting` since the pool connects lazily.
#[derive(Debug)]
pub struct RedisHealth {
    status: AtomicU8,
    last_healthy_ms: AtomicI64,
    failed_connects: AtomicU32,
    recoveries: AtomicU32,
}

impl RedisHealth {
    pub fn new() -> Self {
        Self {
            status: AtomicU8::new(RedisHealthStatus::Reconnecting as u8),
            last_healthy_ms: AtomicI64::new(0),
            failed_connects: AtomicU32::new(0),
            recoveries: AtomicU32::new(0),
        }
    }

    fn transition(&self, next: RedisHealthStatus) -> RedisHealthStatus {
        RedisHealthStatus::from(self.status.swap(next as u8, Ordering::AcqRel))
    }

    /// Record a successful command or connect. Leaving any other status
    /// counts as a recovery.
    pub fn mark_healthy(&self) {
        self.last_healthy_ms.store(current_time_ms(), Ordering::Release);
        if self.transition(RedisHealthStatus::Healthy) != RedisHealthStatus::Healthy {
            self.recoveries.fetch_add(1, Ordering::AcqRel);
            self.failed_connects.store(0, Ordering::Release);
        }
    }

    /// The shared connection is gone
    pub fn mark_disconnected(&self) {
        self.transition(RedisHealthStatus::Reconnecting);
    }

    pub fn record_failed_connect(&self) {
        self.transition(RedisHealthStatus::Reconnecting);
        self.failed_connects.fetch_add(1, Ordering::AcqRel);
    }

    pub fn mark_circuit_open(&self) {
        self.transition(RedisHealthStatus::CircuitOpen);
    }

    pub fn status(&self) -> RedisHealthStatus {
        RedisHealthStatus::from(self.status.load(Ordering::Acquire))
    }

    pub fn is_healthy(&self) -> bool {
        self.status() == RedisHealthStatus::Healthy
    }

    /// Connect attempts failed since the last healthy outcome
    pub fn failed_connects(&self) -> u32 {
        self.failed_connects.load(Ordering::Acquire)
    }

    /// Times the status returned to `Healthy`, the first connect included
    pub fn recoveries(&self) -> u32 {
        self.recoveries.load(Ordering::Acquire)
    }

    /// Epoch millis of the last healthy outcome, 0 if none yet
    pub fn last_healthy_ms(&self) -> i64 {
        self.last_healthy_ms.load(Ordering::Acquire)
    }
}

impl Default for RedisHealth {
    fn default() -> Self {
        Self::new()
    }
}

/// Redis section of `/health`, built by `RedisPool::diagnostics`
#[derive(Debug, Clone, Serialize)]
pub struct RedisDiagnostics {
    pub status: RedisHealthStatus,
    pub circuit_state: CircuitState,
    pub circuit_failures: u32,
    pub failed_connects: u32,
    pub recoveries: u32,
    pub last_healthy_ms: i64,
}
