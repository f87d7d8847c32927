//! Validation improvement tracking for early stopping.

/// Outcome of one validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Loss or accuracy got better.
    Improved,
    /// Neither got better; `fails` consecutive validations so far.
    NotImproved { fails: usize },
    /// The tolerance is exhausted.
    Stop { fails: usize },
}

/// Tracks the best validation loss and accuracy seen so far.
///
/// A validation counts as a failure only when the loss did not go down
/// *and* the accuracy did not go up. Any improvement resets the counter,
/// and the two bests are updated independently of each other.
#[derive(Debug, Clone, PartialEq)]
pub struct ImprovementTracker {
    best_loss: f64,
    best_accuracy: f64,
    fails: usize,
    tolerance: usize,
}

impl ImprovementTracker {
    pub fn new(tolerance: usize) -> Self {
        Self {
            best_loss: f64::INFINITY,
            best_accuracy: 0.0,
            fails: 0,
            tolerance,
        }
    }

    pub fn observe(&mut self, loss: f64, accuracy: f64) -> Verdict {
        if loss >= self.best_loss && accuracy <= self.best_accuracy {
            self.fails += 1;
            if self.fails >= self.tolerance {
                Verdict::Stop { fails: self.fails }
            } else {
                Verdict::NotImproved { fails: self.fails }
            }
        } else {
            self.fails = 0;
            self.best_loss = self.best_loss.min(loss);
            self.best_accuracy = self.best_accuracy.max(accuracy);
            Verdict::Improved
        }
    }

    pub fn best_loss(&self) -> f64 {
        self.best_loss
    }

    pub fn best_accuracy(&self) -> f64 {
        self.best_accuracy
    }

    /// Consecutive non-improving validations.
    pub fn fails(&self) -> usize {
        self.fails
    }

    pub fn tolerance(&self) -> usize {
        self.tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_validation_always_improves() {
        let mut t = ImprovementTracker::new(1);
        assert_eq!(t.observe(5.0, 0.0), Verdict::Improved);
        assert_eq!(t.best_loss(), 5.0);
        assert_eq!(t.best_accuracy(), 0.0);
    }

    #[test]
    fn stops_after_tolerance_failures() {
        let mut t = ImprovementTracker::new(3);
        t.observe(1.0, 0.5);
        assert_eq!(t.observe(1.0, 0.5), Verdict::NotImproved { fails: 1 });
        assert_eq!(t.observe(1.2, 0.4), Verdict::NotImproved { fails: 2 });
        assert_eq!(t.observe(1.0, 0.5), Verdict::Stop { fails: 3 });
    }

    #[test]
    fn either_metric_counts_as_improvement() {
        let mut t = ImprovementTracker::new(2);
        t.observe(1.0, 0.5);
        t.observe(1.0, 0.5);
        assert_eq!(t.fails(), 1);

        // Worse loss, better accuracy.
        assert_eq!(t.observe(2.0, 0.6), Verdict::Improved);
        assert_eq!(t.fails(), 0);
        assert_eq!(t.best_loss(), 1.0);
        assert_eq!(t.best_accuracy(), 0.6);

        // Better loss, worse accuracy.
        assert_eq!(t.observe(0.8, 0.1), Verdict::Improved);
        assert_eq!(t.best_loss(), 0.8);
        assert_eq!(t.best_accuracy(), 0.6);
    }

    #[test]
    fn zero_tolerance_stops_on_first_failure() {
        let mut t = ImprovementTracker::new(0);
        t.observe(1.0, 0.5);
        assert_eq!(t.observe(1.0, 0.5), Verdict::Stop { fails: 1 });
    }
}
