//! Fan-out of state messages to every connection of a user.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use serde::Serialize;
use tokio::time::timeout;

use crate::connection_manager::ConnectionRegistry;
use crate::metrics::DeliveryMetrics;
use crate::websocket::{OutboundMessage, ServerMessage};

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryResult {
    /// Connections the message was queued for
    pub delivered: usize,
    /// Connections whose writer was gone or did not accept in time
    pub failed: usize,
}

#[derive(Debug, Default)]
pub struct BroadcastStats {
    pub total_broadcasts: AtomicU64,
    pub total_delivered: AtomicU64,
    pub total_failed: AtomicU64,
}

impl BroadcastStats {
    pub fn snapshot(&self) -> BroadcastStatsSnapshot {
        BroadcastStatsSnapshot {
            total_broadcasts: self.total_broadcasts.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BroadcastStatsSnapshot {
    pub total_broadcasts: u64,
    pub total_delivered: u64,
    pub total_failed: u64,
}

/// Sends a message to all live connections registered for a user.
pub struct Broadcaster {
    registry: Arc<ConnectionRegistry>,
    send_timeout: Duration,
    stats: BroadcastStats,
}

impl Broadcaster {
    pub fn new(registry: Arc<ConnectionRegistry>, send_timeout: Duration) -> Self {
        Self {
            registry,
            send_timeout,
            stats: BroadcastStats::default(),
        }
    }

    pub fn stats(&self) -> BroadcastStatsSnapshot {
        self.stats.snapshot()
    }

    /// Queue `message` on every connection of `user_id`.
    ///
    /// The message is serialized once. Sends run concurrently; a slow or
    /// closed connection only counts as a failure for itself. Connections
    /// that have not received their snapshot yet are skipped.
    pub async fn broadcast(&self, user_id: &str, message: &ServerMessage) -> DeliveryResult {
        let connections: Vec<_> = self
            .registry
            .list_connections(user_id)
            .into_iter()
            .filter(|handle| handle.is_active())
            .collect();
        if connections.is_empty() {
            return DeliveryResult::default();
        }

        let outbound = match OutboundMessage::preserialize(message) {
            Ok(m) => m,
            Err(e) => {
                tracing::error!(user_id = %user_id, error = %e, "Failed to serialize broadcast");
                OutboundMessage::Raw(message.clone())
            }
        };

        let mut sends: FuturesUnordered<_> = connections
            .iter()
            .map(|handle| {
                let outbound = outbound.clone();
                async move {
                    match timeout(self.send_timeout, handle.send_preserialized(outbound)).await {
                        Ok(Ok(())) => true,
                        Ok(Err(_)) => {
                            tracing::debug!(connection_id = %handle.id, "Connection closed, broadcast dropped");
                            false
                        }
                        Err(_) => {
                            tracing::debug!(connection_id = %handle.id, "Broadcast send timed out");
                            false
                        }
                    }
                }
            })
            .collect();

        let mut result = DeliveryResult::default();
        while let Some(ok) = sends.next().await {
            if ok {
                result.delivered += 1;
            } else {
                result.failed += 1;
            }
        }

        self.stats.total_broadcasts.fetch_add(1, Ordering::Relaxed);
        self.stats
            .total_delivered
            .fetch_add(result.delivered as u64, Ordering::Relaxed);
        self.stats
            .total_failed
            .fetch_add(result.failed as u64, Ordering::Relaxed);
        DeliveryMetrics::record(result.delivered as u64, result.failed as u64);

        result
    }
}
