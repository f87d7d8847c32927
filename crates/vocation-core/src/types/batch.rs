use candle_core::{Device, Tensor};

use crate::error::Result;

/// A batch of sequences zero-padded to a common length.
///
/// `data` is laid out `[batch, pad_len, feature_dim]`. Rows of sequence `i`
/// at or beyond `lengths[i]` are zero, so a length-aware consumer can
/// ignore them.
#[derive(Debug, Clone, PartialEq)]
pub struct PaddedBatch {
    pub data: Vec<f32>,
    /// Unpadded sequence lengths.
    pub lengths: Vec<usize>,
    /// Dense class indices.
    pub labels: Vec<usize>,
    pub ids: Vec<String>,
    pub pad_len: usize,
    pub feature_dim: usize,
    pub num_classes: usize,
}

impl PaddedBatch {
    /// Number of sequences in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lengths.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lengths.is_empty()
    }

    /// Padded rows of sequence `i`, `pad_len * feature_dim` values.
    pub fn sequence(&self, i: usize) -> &[f32] {
        let stride = self.pad_len * self.feature_dim;
        &self.data[i * stride..(i + 1) * stride]
    }

    /// Row `row` of sequence `i`.
    pub fn row(&self, i: usize, row: usize) -> &[f32] {
        let seq = self.sequence(i);
        &seq[row * self.feature_dim..(row + 1) * self.feature_dim]
    }

    /// One-hot label matrix, `[batch, num_classes]` row-major.
    #[must_use]
    pub fn one_hot(&self) -> Vec<f32> {
        let mut out = vec![0.0; self.len() * self.num_classes];
        for (i, &label) in self.labels.iter().enumerate() {
            out[i * self.num_classes + label] = 1.0;
        }
        out
    }

    /// Inputs as a `[batch, pad_len, feature_dim]` tensor.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        Ok(Tensor::from_slice(
            &self.data,
            (self.len(), self.pad_len, self.feature_dim),
            device,
        )?)
    }

    /// Class indices as a `u32` tensor of shape `[batch]`.
    pub fn labels_tensor(&self, device: &Device) -> Result<Tensor> {
        let labels: Vec<u32> = self.labels.iter().map(|&l| l as u32).collect();
        Ok(Tensor::new(labels.as_slice(), device)?)
    }
}
