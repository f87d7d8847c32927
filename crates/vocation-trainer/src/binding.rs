//! The seam between the control loop and whatever computes gradients.

use std::path::Path;

use vocation_core::PaddedBatch;

/// Result of one optimization step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepOutput {
    pub loss: f64,
    pub accuracy: f64,
    /// Extra scalars to log under their own tag.
    pub summaries: Vec<(String, f64)>,
}

/// Result of evaluating one batch without updating parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvalOutput {
    /// Mean loss over the batch.
    pub loss: f64,
    /// Fraction of the batch classified correctly.
    pub accuracy: f64,
    pub true_labels: Vec<usize>,
    pub predicted_labels: Vec<usize>,
}

/// A trainable classifier over padded batches.
///
/// Calls are blocking and never overlap; the control loop owns the binding
/// for the whole run.
pub trait ModelBinding {
    /// One forward/backward/update step.
    fn train_step(&mut self, batch: &PaddedBatch) -> anyhow::Result<StepOutput>;

    /// Forward pass only, with dropout disabled.
    fn evaluate(&mut self, batch: &PaddedBatch) -> anyhow::Result<EvalOutput>;

    fn set_learning_rate(&mut self, lr: f64) -> anyhow::Result<()>;

    fn learning_rate(&self) -> f64;

    /// The rate the schedule decays from.
    fn initial_learning_rate(&self) -> f64;

    /// Writes every trainable parameter to `path`.
    fn save_parameters(&self, path: &Path) -> anyhow::Result<()>;
}

impl<M: ModelBinding + ?Sized> ModelBinding for Box<M> {
    fn train_step(&mut self, batch: &PaddedBatch) -> anyhow::Result<StepOutput> {
        (**self).train_step(batch)
    }

    fn evaluate(&mut self, batch: &PaddedBatch) -> anyhow::Result<EvalOutput> {
        (**self).evaluate(batch)
    }

    fn set_learning_rate(&mut self, lr: f64) -> anyhow::Result<()> {
        (**self).set_learning_rate(lr)
    }

    fn learning_rate(&self) -> f64 {
        (**self).learning_rate()
    }

    fn initial_learning_rate(&self) -> f64 {
        (**self).initial_learning_rate()
    }

    fn save_parameters(&self, path: &Path) -> anyhow::Result<()> {
        (**self).save_parameters(path)
    }
}
