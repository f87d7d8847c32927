//! # Bidirectional stacked RNN classifier
//!
//! A forward and a backward stack of recurrent cells read the padded batch,
//! their per-step outputs are concatenated, and the output at each
//! sequence's last real step goes through a linear layer to the class
//! logits. Layers with a keep probability below one are GRU cells with
//! output dropout; the others are LSTM cells.
//!
//! Padding is handled without masks: the forward stack never looks past a
//! sequence's last real row before it is read, and the backward stack reads
//! each sequence reversed in place (real rows reversed, padding left at the
//! end), so its outputs over real rows never see padding either.

use std::path::Path;

use anyhow::Context;
use candle_core::{DType, Device, Tensor};
use candle_nn::{
    AdamW, GRU, GRUConfig, LSTM, LSTMConfig, Linear, Module, Optimizer, ParamsAdamW, RNN,
    VarBuilder, VarMap,
};
use vocation_core::{CellKind, LayerSpec, NetworkConfig, PaddedBatch};

use crate::binding::{EvalOutput, ModelBinding, StepOutput};

enum Cell {
    Lstm(LSTM),
    Gru(GRU),
}

impl Cell {
    /// `[batch, seq, in]` → `[batch, seq, hidden]`.
    ///
    /// `states_to_tensor` flattens the steps into `[batch, seq * hidden]`,
    /// so the per-step hidden states are stacked on a new step axis here.
    fn forward_seq(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let hidden: Vec<Tensor> = match self {
            Self::Lstm(cell) => cell.seq(xs)?.iter().map(|s| s.h().clone()).collect(),
            Self::Gru(cell) => cell.seq(xs)?.iter().map(|s| s.h().clone()).collect(),
        };
        Tensor::stack(&hidden, 1)
    }
}

struct Layer {
    cell: Cell,
    keep_prob: f32,
}

fn build_stack(specs: &[LayerSpec], input_dim: usize, vb: VarBuilder) -> anyhow::Result<Vec<Layer>> {
    let mut layers = Vec::with_capacity(specs.len());
    let mut in_dim = input_dim;
    for (i, spec) in specs.iter().enumerate() {
        let vb = vb.pp(format!("layer{i}"));
        let cell = match spec.cell {
            CellKind::Lstm => Cell::Lstm(candle_nn::lstm(in_dim, spec.hidden, LSTMConfig::default(), vb)?),
            CellKind::Gru => Cell::Gru(candle_nn::gru(in_dim, spec.hidden, GRUConfig::default(), vb)?),
        };
        layers.push(Layer {
            cell,
            keep_prob: spec.keep_prob,
        });
        in_dim = spec.hidden;
    }
    Ok(layers)
}

fn run_stack(layers: &[Layer], xs: &Tensor, train: bool) -> candle_core::Result<Tensor> {
    let mut hidden = xs.clone();
    for layer in layers {
        hidden = layer.cell.forward_seq(&hidden)?;
        if train && layer.keep_prob < 1.0 {
            hidden = candle_nn::ops::dropout(&hidden, 1.0 - layer.keep_prob)?;
        }
    }
    Ok(hidden)
}

/// Flat row indices that reverse the first `len` steps of every sequence
/// and leave the padding in place. The permutation is its own inverse.
pub(crate) fn reverse_index(lengths: &[usize], seq_len: usize) -> Vec<u32> {
    let mut index = Vec::with_capacity(lengths.len() * seq_len);
    for (b, &len) in lengths.iter().enumerate() {
        for t in 0..seq_len {
            let src = if t < len { len - 1 - t } else { t };
            index.push((b * seq_len + src) as u32);
        }
    }
    index
}

/// Flat row index of every sequence's last real step.
pub(crate) fn last_step_index(lengths: &[usize], seq_len: usize) -> Vec<u32> {
    lengths
        .iter()
        .enumerate()
        .map(|(b, &len)| (b * seq_len + len.max(1) - 1) as u32)
        .collect()
}

fn select_rows(xs: &Tensor, index: Vec<u32>) -> candle_core::Result<Tensor> {
    let (b, s, f) = xs.dims3()?;
    let n = index.len();
    let index = Tensor::from_vec(index, n, xs.device())?;
    xs.reshape((b * s, f))?.index_select(&index, 0)
}

fn permute_steps(xs: &Tensor, index: Vec<u32>) -> candle_core::Result<Tensor> {
    let (b, s, f) = xs.dims3()?;
    select_rows(xs, index)?.reshape((b, s, f))
}

/// Candle implementation of [`ModelBinding`].
pub struct RnnClassifier {
    varmap: VarMap,
    forward: Vec<Layer>,
    backward: Vec<Layer>,
    head: Linear,
    optimizer: AdamW,
    initial_lr: f64,
    device: Device,
}

impl RnnClassifier {
    pub fn new(
        config: &NetworkConfig,
        feature_dim: usize,
        num_classes: usize,
        device: Device,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let layers = config.layers();

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let forward = build_stack(&layers, feature_dim, vb.pp("forward"))?;
        let backward = build_stack(&layers, feature_dim, vb.pp("backward"))?;
        let head = candle_nn::linear(2 * config.output_features(), num_classes, vb.pp("head"))?;

        let optimizer = AdamW::new(
            varmap.all_vars(),
            ParamsAdamW {
                lr: config.initial_learning_rate,
                weight_decay: 0.0,
                ..Default::default()
            },
        )?;

        tracing::debug!(
            layers = layers.len(),
            feature_dim,
            num_classes,
            "built bidirectional classifier"
        );

        Ok(Self {
            varmap,
            forward,
            backward,
            head,
            optimizer,
            initial_lr: config.initial_learning_rate,
            device,
        })
    }

    fn logits(&self, batch: &PaddedBatch, train: bool) -> anyhow::Result<Tensor> {
        let xs = batch.to_tensor(&self.device)?;
        let seq_len = batch.pad_len;

        let fw = run_stack(&self.forward, &xs, train)?;
        let reversed = permute_steps(&xs, reverse_index(&batch.lengths, seq_len))?;
        let bw = run_stack(&self.backward, &reversed, train)?;
        let bw = permute_steps(&bw, reverse_index(&batch.lengths, seq_len))?;

        let outputs = Tensor::cat(&[&fw, &bw], 2)?;
        let last = select_rows(&outputs, last_step_index(&batch.lengths, seq_len))?;
        Ok(self.head.forward(&last)?)
    }

    fn score(logits: &Tensor, targets: &Tensor) -> anyhow::Result<(f64, f64, Vec<usize>)> {
        let loss = candle_nn::loss::cross_entropy(logits, targets)?.to_scalar::<f32>()?;
        let predicted = logits.argmax(1)?;
        let accuracy = predicted
            .eq(targets)?
            .to_dtype(DType::F32)?
            .mean_all()?
            .to_scalar::<f32>()?;
        let predicted = predicted
            .to_vec1::<u32>()?
            .into_iter()
            .map(|p| p as usize)
            .collect();
        Ok((f64::from(loss), f64::from(accuracy), predicted))
    }
}

impl ModelBinding for RnnClassifier {
    fn train_step(&mut self, batch: &PaddedBatch) -> anyhow::Result<StepOutput> {
        let logits = self.logits(batch, true)?;
        let targets = batch.labels_tensor(&self.device)?;
        let loss = candle_nn::loss::cross_entropy(&logits, &targets)?;
        self.optimizer
            .backward_step(&loss)
            .context("optimizer step")?;

        let (loss, accuracy, _) = Self::score(&logits, &targets)?;
        Ok(StepOutput {
            loss,
            accuracy,
            summaries: vec![("cost".to_string(), loss)],
        })
    }

    fn evaluate(&mut self, batch: &PaddedBatch) -> anyhow::Result<EvalOutput> {
        let logits = self.logits(batch, false)?;
        let targets = batch.labels_tensor(&self.device)?;
        let (loss, accuracy, predicted_labels) = Self::score(&logits, &targets)?;
        Ok(EvalOutput {
            loss,
            accuracy,
            true_labels: batch.labels.clone(),
            predicted_labels,
        })
    }

    fn set_learning_rate(&mut self, lr: f64) -> anyhow::Result<()> {
        self.optimizer.set_learning_rate(lr);
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.optimizer.learning_rate()
    }

    fn initial_learning_rate(&self) -> f64 {
        self.initial_lr
    }

    fn save_parameters(&self, path: &Path) -> anyhow::Result<()> {
        self.varmap
            .save(path)
            .with_context(|| format!("writing parameters to {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use vocation_core::data::pad_examples;
    use vocation_core::{Example, Matrix, Scale};

    fn batch() -> PaddedBatch {
        let a = Example::new("a", Matrix::from_flat(2, 3, vec![0.1; 6]).unwrap(), "x");
        let b = Example::new("b", Matrix::from_flat(4, 3, vec![-0.2; 12]).unwrap(), "y");
        let c = Example::new("c", Matrix::from_flat(1, 3, vec![0.3; 3]).unwrap(), "x");
        pad_examples(&[&a, &b, &c], &[0, 1, 0], None, 3, 2).unwrap()
    }

    #[test]
    fn reverse_index_keeps_padding_in_place() {
        assert_eq!(reverse_index(&[2, 4], 4), vec![1, 0, 2, 3, 7, 6, 5, 4]);
        let once = reverse_index(&[3, 1], 3);
        let twice: Vec<u32> = once.iter().map(|&i| once[i as usize]).collect();
        assert_eq!(twice, (0..6).collect::<Vec<u32>>());
    }

    #[test]
    fn last_step_index_points_at_final_real_row() {
        assert_eq!(last_step_index(&[2, 4, 1], 4), vec![1, 7, 8]);
    }

    #[test]
    fn stacks_keep_a_step_axis() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let specs = [
            LayerSpec {
                cell: CellKind::Gru,
                hidden: 5,
                keep_prob: 0.5,
            },
            LayerSpec {
                cell: CellKind::Lstm,
                hidden: 4,
                keep_prob: 1.0,
            },
        ];
        let layers = build_stack(&specs, 3, vb).unwrap();

        let xs = batch().to_tensor(&Device::Cpu).unwrap();
        assert_eq!(layers[0].cell.forward_seq(&xs).unwrap().dims(), &[3, 4, 5]);
        assert_eq!(run_stack(&layers, &xs, true).unwrap().dims(), &[3, 4, 4]);
    }

    #[test]
    fn train_and_evaluate_shapes() {
        let config = NetworkConfig::preset(Scale::Tiny);
        let mut model = RnnClassifier::new(&config, 3, 2, Device::Cpu).unwrap();
        let batch = batch();

        let step = model.train_step(&batch).unwrap();
        assert!(step.loss.is_finite());
        assert!((0.0..=1.0).contains(&step.accuracy));

        let eval = model.evaluate(&batch).unwrap();
        assert_eq!(eval.true_labels, vec![0, 1, 0]);
        assert_eq!(eval.predicted_labels.len(), 3);
        assert!(eval.predicted_labels.iter().all(|&p| p < 2));
    }

    #[test]
    fn evaluation_ignores_padding_length() {
        let config = NetworkConfig::preset(Scale::Basic);
        let mut model = RnnClassifier::new(&config, 3, 2, Device::Cpu).unwrap();
        let a = Example::new("a", Matrix::from_flat(2, 3, vec![0.5; 6]).unwrap(), "x");

        let short = pad_examples(&[&a], &[0], None, 3, 2).unwrap();
        let long = pad_examples(&[&a], &[0], Some(7), 3, 2).unwrap();
        let l1 = model.evaluate(&short).unwrap().loss;
        let l2 = model.evaluate(&long).unwrap().loss;
        assert!((l1 - l2).abs() < 1e-5);
    }

    #[test]
    fn learning_rate_round_trip() {
        let config = NetworkConfig::preset(Scale::Basic);
        let mut model = RnnClassifier::new(&config, 3, 2, Device::Cpu).unwrap();
        assert!((model.learning_rate() - 0.002).abs() < 1e-12);
        model.set_learning_rate(0.0005).unwrap();
        assert!((model.learning_rate() - 0.0005).abs() < 1e-12);
        assert!((model.initial_learning_rate() - 0.002).abs() < 1e-12);
    }

    #[test]
    fn saves_safetensors() {
        let tmp = TempDir::new().unwrap();
        let config = NetworkConfig::preset(Scale::Basic);
        let model = RnnClassifier::new(&config, 3, 2, Device::Cpu).unwrap();
        let path = tmp.path().join("model.safetensors");
        model.save_parameters(&path).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }
}
