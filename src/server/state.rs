use std::sync::Arc;
use std::time::Instant;

use crate::broadcast::Broadcaster;
use crate::config::Settings;
use crate::connection_manager::{ConnectionLimits, ConnectionRegistry};
use crate::game::StateService;
use crate::store::StateStore;
use crate::tasks::{TickScheduler, TickStats};

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<ConnectionRegistry>,
    pub store: Arc<dyn StateStore>,
    pub service: Arc<StateService>,
    pub broadcaster: Arc<Broadcaster>,
    pub tick_stats: Arc<TickStats>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(settings: Settings, store: Arc<dyn StateStore>) -> Self {
        let registry = Arc::new(ConnectionRegistry::with_limits(ConnectionLimits::from(
            &settings.websocket,
        )));
        let service = Arc::new(StateService::new(store.clone()));
        let broadcaster = Arc::new(Broadcaster::new(
            registry.clone(),
            settings.tick.send_timeout(),
        ));

        Self {
            settings: Arc::new(settings),
            registry,
            store,
            service,
            broadcaster,
            tick_stats: Arc::new(TickStats::default()),
            start_time: Instant::now(),
        }
    }

    /// Build the tick scheduler sharing this state's registry, service and stats
    pub fn tick_scheduler(&self) -> TickScheduler {
        TickScheduler::new(
            self.settings.tick.clone(),
            self.registry.clone(),
            self.service.clone(),
            self.broadcaster.clone(),
            self.tick_stats.clone(),
        )
    }
}
