//! API layer - HTTP endpoint handlers.

mod health;
mod metrics;
mod routes;
mod user;

pub use health::{health, stats, HealthResponse, StatsResponse};
pub use metrics::prometheus_metrics;
pub use routes::api_routes;
pub use user::get_user_state;
