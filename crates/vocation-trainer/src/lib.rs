//! # Vocation Trainer
//!
//! Training control loop for the occupation classifier: learning-rate
//! schedule, periodic validation with early stopping, checkpoints, metric
//! logs and the final test pass. The loop talks to the model only through
//! [`ModelBinding`]; [`RnnClassifier`] is the candle implementation used by
//! the `train` binary.

pub mod binding;
pub mod checkpoint;
pub mod evaluate;
pub mod metrics;
pub mod model;
pub mod monitor;
pub mod report;
pub mod run;
pub mod schedule;
pub mod trainer;

pub use binding::{EvalOutput, ModelBinding, StepOutput};
pub use checkpoint::{CheckpointIndex, CheckpointManager};
pub use evaluate::{Evaluation, evaluate_in_batches};
pub use metrics::{MetricSinks, ScalarLog, ScalarRecord, read_scalars};
pub use model::RnnClassifier;
pub use monitor::{ImprovementTracker, Verdict};
pub use run::{RunDir, RunLog, init_logging};
pub use schedule::LearningRateSchedule;
pub use trainer::{RunSummary, TestSummary, TrainerOptions, TrainingContext, train};
