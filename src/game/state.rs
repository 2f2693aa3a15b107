use serde::Serialize;

pub const DEFAULT_COUNTER: i64 = 0;
pub const DEFAULT_ENERGY: i64 = 100;
pub const DEFAULT_INCREMENT: i64 = 1;

pub const MIN_ENERGY: i64 = 0;
pub const MAX_ENERGY: i64 = 100;
pub const MIN_INCREMENT: i64 = 1;

/// Snapshot of one user's persisted state.
///
/// Invariants: `counter >= 0` and never decreases, `energy` stays in
/// `[MIN_ENERGY, MAX_ENERGY]`, `increment >= MIN_INCREMENT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserState {
    pub counter: i64,
    pub energy: i64,
    pub increment: i64,
}

impl Default for UserState {
    fn default() -> Self {
        Self {
            counter: DEFAULT_COUNTER,
            energy: DEFAULT_ENERGY,
            increment: DEFAULT_INCREMENT,
        }
    }
}

/// Raise an increment below the minimum to the minimum.
pub fn normalize_increment(value: i64) -> i64 {
    value.max(MIN_INCREMENT)
}

impl UserState {
    /// Build from raw stored values, clamping anything outside the invariants.
    pub fn from_stored(counter: i64, energy: i64, increment: i64) -> Self {
        Self {
            counter: counter.max(0),
            energy: energy.clamp(MIN_ENERGY, MAX_ENERGY),
            increment: normalize_increment(increment),
        }
    }

    /// A click always advances the counter by `value`; energy is only spent
    /// when there is enough of it to cover the whole click.
    pub fn apply_click(&mut self, value: i64) {
        let value = value.max(0);
        self.counter = self.counter.saturating_add(value);
        if self.energy >= value {
            self.energy -= value;
        }
    }

    /// Passive regeneration: one point of energy, `increment` points of counter.
    pub fn apply_tick(&mut self) {
        self.energy = (self.energy + 1).min(MAX_ENERGY);
        self.counter = self.counter.saturating_add(self.increment);
    }

    pub fn holds_invariants(&self) -> bool {
        self.counter >= 0
            && (MIN_ENERGY..=MAX_ENERGY).contains(&self.energy)
            && self.increment >= MIN_INCREMENT
    }
}
