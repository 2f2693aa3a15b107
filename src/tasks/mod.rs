mod tick;

pub use tick::{TickReport, TickScheduler, TickStats, TickStatsSnapshot};
