use serde::{Deserialize, Serialize};

/// Default per-cycle learning-rate decay.
pub const DECAY_PER_CYCLE: f64 = 0.9;
/// Default learning-rate floor.
pub const LR_LOWER_BOUND: f64 = 1e-7;
/// Default multiplier applied to the decay after a non-improving validation.
pub const DECAY_PENALTY: f64 = 0.95;

/// Parameters of the exponential learning-rate schedule.
///
/// A "cycle" is one pass over the training partition, so the rate after
/// `n` examples is `initial * decay_per_cycle^(n / train_size)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    pub decay_per_cycle: f64,
    pub lower_bound: f64,
    pub penalty: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            decay_per_cycle: DECAY_PER_CYCLE,
            lower_bound: LR_LOWER_BOUND,
            penalty: DECAY_PENALTY,
        }
    }
}

impl ScheduleConfig {
    /// Set the learning-rate floor.
    pub fn with_lower_bound(mut self, lower_bound: f64) -> Self {
        self.lower_bound = lower_bound.max(0.0);
        self
    }

    /// Set the decay multiplier.
    pub fn with_decay_per_cycle(mut self, decay: f64) -> Self {
        self.decay_per_cycle = decay.clamp(0.0, 1.0);
        self
    }
}
