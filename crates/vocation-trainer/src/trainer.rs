//! # Training control loop
//!
//! ```text
//! INIT ─► TRAIN_STEP ─┬─────────────────────────────► TRAIN_STEP ...
//!                     └─(step % every == 0)─► VALIDATE ─► DECIDE ─┬─ continue
//!                                                                 └─ stop ─► TEST ─► DONE
//! ```
//!
//! [`TrainingContext`] owns every piece of mutable run state: the reader's
//! cursor, the learning-rate schedule, the improvement tracker and the
//! checkpoint and metric sinks. It is consumed by [`TrainingContext::run`].

use std::path::Path;
use std::time::Instant;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use vocation_core::{DataReader, PadMode, Partition, RunConfig, ScheduleConfig};

use crate::binding::ModelBinding;
use crate::checkpoint::CheckpointManager;
use crate::evaluate::{Evaluation, evaluate_in_batches};
use crate::metrics::MetricSinks;
use crate::monitor::{ImprovementTracker, Verdict};
use crate::report::{ClassAccuracy, log_test_report, per_class_accuracy};
use crate::schedule::LearningRateSchedule;

/// Knobs that are not part of a scale preset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrainerOptions {
    pub pad_mode: PadMode,
    /// Log training progress every this many steps.
    pub log_train_every: usize,
    pub seed: u64,
}

impl Default for TrainerOptions {
    fn default() -> Self {
        Self {
            pad_mode: PadMode::Local,
            log_train_every: 1,
            seed: 0,
        }
    }
}

/// Test-partition results of a finished run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSummary {
    pub loss: f64,
    pub accuracy: f64,
    pub count: usize,
    pub per_class: Vec<ClassAccuracy>,
}

/// What a finished run reports back.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub steps_run: usize,
    pub examples_seen: usize,
    pub validations: usize,
    pub stopped_early: bool,
    pub best_loss: f64,
    pub best_accuracy: f64,
    pub final_learning_rate: f64,
    pub test: TestSummary,
    pub elapsed_secs: f64,
}

/// All mutable state of one training run.
pub struct TrainingContext<'a, M: ModelBinding + ?Sized> {
    reader: &'a mut DataReader,
    model: &'a mut M,
    run: RunConfig,
    options: TrainerOptions,
    schedule: LearningRateSchedule,
    monitor: ImprovementTracker,
    checkpoints: CheckpointManager,
    metrics: MetricSinks,
    examples_seen: usize,
    steps_run: usize,
    validations: usize,
    started: Instant,
}

impl<'a, M: ModelBinding + ?Sized> TrainingContext<'a, M> {
    /// INIT: checks the run against the data, rewinds the reader and
    /// opens the run's sinks under `run_dir`.
    pub fn new(
        reader: &'a mut DataReader,
        model: &'a mut M,
        run: RunConfig,
        schedule: ScheduleConfig,
        options: TrainerOptions,
        run_dir: &Path,
    ) -> anyhow::Result<Self> {
        run.validate()?;
        if run.batch_size == 0 || run.batch_size > reader.train_size() {
            return Err(vocation_core::VocationError::InvalidBatchSize {
                requested: run.batch_size,
                available: reader.train_size(),
            }
            .into());
        }
        for partition in [Partition::Valid, Partition::Test] {
            if reader.partition_len(partition) == 0 {
                return Err(vocation_core::VocationError::EmptyDataset(format!(
                    "{partition} partition is empty"
                ))
                .into());
            }
        }

        reader.rewind();
        run.log();
        tracing::info!(
            target: "config.run",
            "train : validation : test = {} : {} : {}",
            reader.train_size(),
            reader.partition_len(Partition::Valid),
            reader.partition_len(Partition::Test)
        );

        let schedule = LearningRateSchedule::new(model.initial_learning_rate(), schedule);
        tracing::info!(
            target: "config.run",
            "learning rate starts at {} and decays {} per cycle, floor {}",
            schedule.initial(),
            schedule.decay(),
            schedule.lower_bound()
        );
        Ok(Self {
            reader,
            model,
            run,
            options,
            schedule,
            monitor: ImprovementTracker::new(run.fail_to_improve_tolerance),
            checkpoints: CheckpointManager::create(run_dir)?,
            metrics: MetricSinks::create(run_dir)?,
            examples_seen: 0,
            steps_run: 0,
            validations: 0,
            started: Instant::now(),
        })
    }

    /// Drives the loop to completion and runs the test pass.
    pub fn run(mut self) -> anyhow::Result<RunSummary> {
        let mut stopped_early = false;
        for step in 0..self.run.num_steps {
            self.train_step(step)
                .with_context(|| format!("training step {step}"))?;

            if step % self.run.log_validation_every == 0 {
                let verdict = self
                    .validate(step)
                    .with_context(|| format!("validation at step {step}"))?;
                if let Verdict::Stop { fails } = verdict {
                    tracing::info!(
                        target: "run.validate",
                        "Stopping early after {fails} validations without improvement"
                    );
                    stopped_early = true;
                    break;
                }
            }
        }
        self.test(stopped_early).context("test pass")
    }

    fn train_step(&mut self, step: usize) -> anyhow::Result<()> {
        let batch_size = self.run.batch_size;
        let examples_seen = (step + 1) * batch_size;
        let lr = self
            .schedule
            .rate_at(examples_seen, self.reader.train_size());
        self.model.set_learning_rate(lr)?;

        let batch = self.reader.next_batch(batch_size, self.options.pad_mode)?;
        let out = self.model.train_step(&batch)?;

        let index = step * batch_size;
        self.metrics.train.write(index, "loss", out.loss)?;
        self.metrics.train.write(index, "accuracy", out.accuracy)?;
        self.metrics.train.write(index, "learning_rate", lr)?;
        for (tag, value) in &out.summaries {
            self.metrics.train.write(index, tag, *value)?;
        }

        if step % self.options.log_train_every.max(1) == 0 {
            tracing::info!(
                target: "run.train",
                "Step {step} ({examples_seen} data pts); lr = {lr:.6}; loss = {:.3}, accuracy = {:.3}",
                out.loss,
                out.accuracy
            );
        }

        self.examples_seen = examples_seen;
        self.steps_run = step + 1;
        Ok(())
    }

    fn validate(&mut self, step: usize) -> anyhow::Result<Verdict> {
        let eval = self.evaluate(Partition::Valid)?;
        self.validations += 1;
        tracing::info!(
            target: "run.validate",
            "Step {step} validation: loss = {:.3}, accuracy = {:.3}",
            eval.loss,
            eval.accuracy
        );

        self.checkpoints.save_step(&*self.model, self.examples_seen)?;

        let index = step * self.run.batch_size;
        self.metrics.valid.write(index, "loss", eval.loss)?;
        self.metrics.valid.write(index, "accuracy", eval.accuracy)?;

        let verdict = self.monitor.observe(eval.loss, eval.accuracy);
        match verdict {
            Verdict::Improved => {
                tracing::debug!(
                    target: "run.validate",
                    "best loss = {:.3}, best accuracy = {:.3}",
                    self.monitor.best_loss(),
                    self.monitor.best_accuracy()
                );
            }
            Verdict::NotImproved { fails } | Verdict::Stop { fails } => {
                self.schedule.penalize();
                tracing::info!(
                    target: "run.validate",
                    "No improvement ({fails}/{}); decay per cycle now {:.4}",
                    self.monitor.tolerance(),
                    self.schedule.decay()
                );
            }
        }
        Ok(verdict)
    }

    fn evaluate(&mut self, partition: Partition) -> anyhow::Result<Evaluation> {
        evaluate_in_batches(
            &mut *self.model,
            self.reader,
            partition,
            self.run.batch_size,
            self.options.pad_mode,
        )
    }

    fn test(mut self, stopped_early: bool) -> anyhow::Result<RunSummary> {
        let elapsed = self.started.elapsed().as_secs_f64();
        tracing::info!(target: "run.test", "Time elapsed: {elapsed:.1} s");

        let eval = self.evaluate(Partition::Test)?;
        tracing::info!(
            target: "run.test",
            "Test: loss = {:.3}, accuracy = {:.3}",
            eval.loss,
            eval.accuracy
        );
        log_test_report(&eval, self.reader.classes());

        self.metrics.test.write(self.examples_seen, "loss", eval.loss)?;
        self.metrics
            .test
            .write(self.examples_seen, "accuracy", eval.accuracy)?;

        self.checkpoints.save_final(&*self.model)?;
        self.metrics.flush()?;

        Ok(RunSummary {
            steps_run: self.steps_run,
            examples_seen: self.examples_seen,
            validations: self.validations,
            stopped_early,
            best_loss: self.monitor.best_loss(),
            best_accuracy: self.monitor.best_accuracy(),
            final_learning_rate: self.model.learning_rate(),
            test: TestSummary {
                loss: eval.loss,
                accuracy: eval.accuracy,
                count: eval.count,
                per_class: per_class_accuracy(&eval, self.reader.classes()),
            },
            elapsed_secs: elapsed,
        })
    }
}

/// Builds a [`TrainingContext`] and runs it.
pub fn train<M: ModelBinding + ?Sized>(
    reader: &mut DataReader,
    model: &mut M,
    run: RunConfig,
    schedule: ScheduleConfig,
    options: TrainerOptions,
    run_dir: &Path,
) -> anyhow::Result<RunSummary> {
    TrainingContext::new(reader, model, run, schedule, options, run_dir)?.run()
}
