//! Exponential learning-rate decay with a floor.

use vocation_core::ScheduleConfig;

/// Learning rate as a function of training progress.
///
/// `rate = max(initial * decay^(examples_seen / train_size), lower_bound)`.
/// The decay itself shrinks by `penalty` every time validation fails to
/// improve, so a stalled run cools down faster.
#[derive(Debug, Clone, PartialEq)]
pub struct LearningRateSchedule {
    initial: f64,
    decay: f64,
    lower_bound: f64,
    penalty: f64,
}

impl LearningRateSchedule {
    pub fn new(initial: f64, config: ScheduleConfig) -> Self {
        Self {
            initial,
            decay: config.decay_per_cycle,
            lower_bound: config.lower_bound,
            penalty: config.penalty,
        }
    }

    /// Rate after `examples_seen` examples of a `train_size` partition.
    pub fn rate_at(&self, examples_seen: usize, train_size: usize) -> f64 {
        let cycles = examples_seen as f64 / train_size.max(1) as f64;
        let rate = self.initial * self.decay.powf(cycles);
        if rate.is_finite() {
            rate.max(self.lower_bound)
        } else {
            self.lower_bound
        }
    }

    /// Applies one non-improvement penalty to the decay.
    pub fn penalize(&mut self) {
        self.decay *= self.penalty;
    }

    pub fn decay(&self) -> f64 {
        self.decay
    }

    pub fn initial(&self) -> f64 {
        self.initial
    }

    pub fn lower_bound(&self) -> f64 {
        self.lower_bound
    }
}
