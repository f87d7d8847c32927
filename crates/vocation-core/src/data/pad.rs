use serde::{Deserialize, Serialize};

use crate::error::{Result, VocationError};
use crate::types::{Example, PaddedBatch};

/// How far a batch is padded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PadMode {
    /// Up to the longest sequence in the batch.
    #[default]
    Local,
    /// Up to the longest sequence in the whole dataset, giving every batch
    /// the same shape.
    Global,
}

/// Zero-pads `examples` to a common row count.
///
/// With `pad_to = None` the batch is padded to its own longest sequence;
/// a fixed length shorter than that is rejected rather than truncating.
pub fn pad_examples(
    examples: &[&Example],
    labels: &[usize],
    pad_to: Option<usize>,
    feature_dim: usize,
    num_classes: usize,
) -> Result<PaddedBatch> {
    let lengths: Vec<usize> = examples.iter().map(|e| e.len()).collect();
    let longest = lengths.iter().copied().max().unwrap_or(0);
    let pad_len = match pad_to {
        Some(requested) if requested < longest => {
            return Err(VocationError::PadTooShort { requested, longest });
        }
        Some(requested) => requested,
        None => longest,
    };

    let stride = pad_len * feature_dim;
    let mut data = vec![0.0f32; examples.len() * stride];
    for (i, example) in examples.iter().enumerate() {
        if example.matrix.cols() != feature_dim {
            return Err(VocationError::FeatureDimMismatch {
                id: example.id.clone(),
                expected: feature_dim,
                actual: example.matrix.cols(),
            });
        }
        let src = example.matrix.as_slice();
        data[i * stride..i * stride + src.len()].copy_from_slice(src);
    }

    Ok(PaddedBatch {
        data,
        lengths,
        labels: labels.to_vec(),
        ids: examples.iter().map(|e| e.id.clone()).collect(),
        pad_len,
        feature_dim,
        num_classes,
    })
}
