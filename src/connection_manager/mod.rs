//! Live WebSocket connections, indexed by user.

mod registry;
mod stats;
mod types;

pub use registry::ConnectionRegistry;
pub use stats::ConnectionStats;
pub use types::{ConnectionError, ConnectionHandle, ConnectionLimits};
