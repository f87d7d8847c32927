//! Whole-partition evaluation in fixed-size batches.

use anyhow::Context;
use vocation_core::{DataReader, PadMode, Partition};

use crate::binding::ModelBinding;

/// Aggregate of a partition-wide evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    /// Example-weighted mean loss.
    pub loss: f64,
    /// Example-weighted mean accuracy.
    pub accuracy: f64,
    pub count: usize,
    pub ids: Vec<String>,
    pub true_labels: Vec<usize>,
    pub predicted_labels: Vec<usize>,
}

/// Running, example-weighted mean over evaluated batches.
#[derive(Debug, Clone, Default)]
pub struct WeightedMean {
    loss: f64,
    accuracy: f64,
    count: usize,
}

impl WeightedMean {
    pub fn add(&mut self, loss: f64, accuracy: f64, count: usize) {
        self.loss += loss * count as f64;
        self.accuracy += accuracy * count as f64;
        self.count += count;
    }

    /// `(loss, accuracy)`; zero when nothing was added.
    pub fn get(&self) -> (f64, f64) {
        if self.count == 0 {
            return (0.0, 0.0);
        }
        let n = self.count as f64;
        (self.loss / n, self.accuracy / n)
    }

    pub fn count(&self) -> usize {
        self.count
    }
}

/// Evaluates every example of `partition` once, `batch_size` at a time.
///
/// Batches are weighted by their actual size, so a short final batch
/// contributes proportionally.
pub fn evaluate_in_batches<M>(
    model: &mut M,
    reader: &DataReader,
    partition: Partition,
    batch_size: usize,
    pad: PadMode,
) -> anyhow::Result<Evaluation>
where
    M: ModelBinding + ?Sized,
{
    let mut mean = WeightedMean::default();
    let mut out = Evaluation::default();

    for batch in reader.batches_of(partition, batch_size, pad)? {
        let batch = batch?;
        let eval = model
            .evaluate(&batch)
            .with_context(|| format!("evaluating {partition} batch at offset {}", mean.count()))?;
        mean.add(eval.loss, eval.accuracy, batch.len());
        out.ids.extend(batch.ids);
        out.true_labels.extend(eval.true_labels);
        out.predicted_labels.extend(eval.predicted_labels);
    }

    (out.loss, out.accuracy) = mean.get();
    out.count = mean.count();
    Ok(out)
}
