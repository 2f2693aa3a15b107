//! Per-user clicker state and the rules that mutate it.

mod locks;
mod service;
mod state;

pub use locks::{UserLockGuard, UserLocks};
pub use service::StateService;
pub use state::{
    normalize_increment, UserState, DEFAULT_COUNTER, DEFAULT_ENERGY, DEFAULT_INCREMENT,
    MAX_ENERGY, MIN_ENERGY, MIN_INCREMENT,
};
