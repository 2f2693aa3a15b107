use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{broadcast, Semaphore};
use tokio::task::JoinSet;

use crate::broadcast::Broadcaster;
use crate::config::TickConfig;
use crate::connection_manager::ConnectionRegistry;
use crate::game::{StateService, UserState};
use crate::metrics::{StoreMetrics, TickMetrics};
use crate::store::StoreError;
use crate::websocket::ServerMessage;

/// Outcome of a single tick cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickReport {
    /// Users present in the registry snapshot
    pub users: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Cumulative tick counters, shared with the stats endpoint
#[derive(Debug, Default)]
pub struct TickStats {
    cycles: AtomicU64,
    user_updates: AtomicU64,
    user_failures: AtomicU64,
}

impl TickStats {
    fn record(&self, report: &TickReport) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.user_updates
            .fetch_add(report.succeeded as u64, Ordering::Relaxed);
        self.user_failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> TickStatsSnapshot {
        TickStatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            user_updates: self.user_updates.load(Ordering::Relaxed),
            user_failures: self.user_failures.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TickStatsSnapshot {
    pub cycles: u64,
    pub user_updates: u64,
    pub user_failures: u64,
}

/// Periodic passive regeneration for every connected user.
///
/// Each cycle snapshots the registered users once, updates each of them in
/// its own task and waits for all of them before sleeping again. A failing
/// user is logged and skipped for that cycle only.
pub struct TickScheduler {
    config: TickConfig,
    registry: Arc<ConnectionRegistry>,
    service: Arc<StateService>,
    broadcaster: Arc<Broadcaster>,
    stats: Arc<TickStats>,
}

impl TickScheduler {
    pub fn new(
        config: TickConfig,
        registry: Arc<ConnectionRegistry>,
        service: Arc<StateService>,
        broadcaster: Arc<Broadcaster>,
        stats: Arc<TickStats>,
    ) -> Self {
        Self {
            config,
            registry,
            service,
            broadcaster,
            stats,
        }
    }

    /// Run until the shutdown signal fires
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let interval = self.config.interval();

        tracing::info!(
            interval_ms = interval.as_millis() as u64,
            max_concurrent_updates = self.config.max_concurrent_updates,
            "Tick scheduler started"
        );

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Tick scheduler received shutdown signal");
                    break;
                }
                _ = tokio::time::sleep(interval) => {
                    let start = Instant::now();
                    let report = self.run_cycle().await;
                    let elapsed = start.elapsed();

                    if elapsed > interval {
                        tracing::warn!(
                            elapsed_ms = elapsed.as_millis() as u64,
                            interval_ms = interval.as_millis() as u64,
                            users = report.users,
                            "Tick cycle took longer than the tick interval"
                        );
                    }
                }
            }
        }

        tracing::info!("Tick scheduler stopped");
    }

    /// Apply one tick to every user currently registered.
    pub async fn run_cycle(&self) -> TickReport {
        let start = Instant::now();
        let users = self.registry.user_ids();
        let mut report = TickReport {
            users: users.len(),
            ..Default::default()
        };

        if users.is_empty() {
            return report;
        }

        let permits = Arc::new(Semaphore::new(self.config.max_concurrent_updates.max(1)));
        let mut updates = JoinSet::new();

        for user_id in users {
            let service = self.service.clone();
            let broadcaster = self.broadcaster.clone();
            let permits = permits.clone();

            updates.spawn(async move {
                // The semaphore is never closed, so acquire cannot fail
                let _permit = permits.acquire_owned().await.ok();
                let result = update_user(&service, &broadcaster, &user_id).await;
                (user_id, result)
            });
        }

        while let Some(joined) = updates.join_next().await {
            match joined {
                Ok((_, Ok(_))) => report.succeeded += 1,
                Ok((user_id, Err(e))) => {
                    report.failed += 1;
                    StoreMetrics::record_error("tick");
                    tracing::error!(user_id = %user_id, error = %e, "Tick update failed");
                }
                Err(e) => {
                    report.failed += 1;
                    tracing::error!(error = %e, "Tick update task panicked");
                }
            }
        }

        self.stats.record(&report);
        TickMetrics::record_cycle(
            start.elapsed().as_secs_f64(),
            report.succeeded as u64,
            report.failed as u64,
        );
        tracing::debug!(
            users = report.users,
            succeeded = report.succeeded,
            failed = report.failed,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Tick cycle completed"
        );

        report
    }
}

async fn update_user(
    service: &StateService,
    broadcaster: &Broadcaster,
    user_id: &str,
) -> Result<UserState, StoreError> {
    let state = service.tick(user_id).await?;
    broadcaster
        .broadcast(user_id, &ServerMessage::tick(&state))
        .await;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStateStore;
    use crate::websocket::OutboundMessage;
    use std::time::Duration;
    use tokio::sync::mpsc;

    struct Fixture {
        scheduler: TickScheduler,
        registry: Arc<ConnectionRegistry>,
        service: Arc<StateService>,
        stats: Arc<TickStats>,
    }

    fn fixture(interval_ms: u64) -> Fixture {
        let registry = Arc::new(ConnectionRegistry::new());
        let service = Arc::new(StateService::new(Arc::new(MemoryStateStore::new())));
        let broadcaster = Arc::new(Broadcaster::new(
            registry.clone(),
            Duration::from_millis(100),
        ));
        let stats = Arc::new(TickStats::default());
        let config = TickConfig {
            interval_ms,
            ..Default::default()
        };

        Fixture {
            scheduler: TickScheduler::new(
                config,
                registry.clone(),
                service.clone(),
                broadcaster,
                stats.clone(),
            ),
            registry,
            service,
            stats,
        }
    }

    fn parse(message: OutboundMessage) -> ServerMessage {
        serde_json::from_str(&message.to_json().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_cycle_without_users() {
        let f = fixture(1000);
        assert_eq!(f.scheduler.run_cycle().await, TickReport::default());
        assert_eq!(f.stats.snapshot().cycles, 0);
    }

    #[tokio::test]
    async fn test_cycle_updates_and_broadcasts() {
        let f = fixture(1000);
        let (tx, mut rx) = mpsc::channel(4);
        f.registry.connect("alice".to_string(), tx).unwrap().activate();

        let report = f.scheduler.run_cycle().await;
        assert_eq!(
            report,
            TickReport {
                users: 1,
                succeeded: 1,
                failed: 0
            }
        );

        assert_eq!(
            parse(rx.recv().await.unwrap()),
            ServerMessage::TickUpdate {
                counter: 1,
                energy: 100,
                increment_value: 1
            }
        );
        assert_eq!(f.stats.snapshot().user_updates, 1);
    }

    #[tokio::test]
    async fn test_disconnected_users_are_not_ticked() {
        let f = fixture(1000);
        let handle = f
            .registry
            .connect("alice".to_string(), mpsc::channel(4).0)
            .unwrap();
        f.registry.disconnect(handle.id);

        assert_eq!(f.scheduler.run_cycle().await.users, 0);
        assert_eq!(f.service.snapshot("alice").await.unwrap().counter, 0);
    }

    #[tokio::test]
    async fn test_run_ticks_until_shutdown() {
        let f = fixture(20);
        let (tx, mut rx) = mpsc::channel(16);
        f.registry.connect("alice".to_string(), tx).unwrap().activate();

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let task = tokio::spawn(f.scheduler.run(shutdown_rx));

        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("should receive a tick")
            .unwrap();
        assert!(matches!(parse(first), ServerMessage::TickUpdate { .. }));

        shutdown_tx.send(()).unwrap();
        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("scheduler should stop")
            .unwrap();
    }
}
