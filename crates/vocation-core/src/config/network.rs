use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::run::Scale;
use crate::error::{Result, VocationError};

/// Recurrent cell used by one layer of the stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellKind {
    Lstm,
    Gru,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Lstm => write!(f, "LSTM"),
            Self::Gru => write!(f, "GRU"),
        }
    }
}

/// One layer of the bidirectional stack.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub cell: CellKind,
    pub hidden: usize,
    /// Probability of keeping an output unit; 1.0 disables dropout.
    pub keep_prob: f32,
}

/// Shape of the recurrent classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub scale: Scale,
    pub initial_learning_rate: f64,
    pub hidden_layer_features: Vec<usize>,
    pub output_keep_probs: Vec<f32>,
}

impl NetworkConfig {
    /// Looks up the preset row for `scale`.
    #[must_use]
    pub fn preset(scale: Scale) -> Self {
        let (initial_learning_rate, hidden_layer_features, output_keep_probs) = match scale {
            Scale::Basic => (0.002, vec![8], vec![0.9]),
            Scale::Tiny => (0.002, vec![32, 8], vec![0.5, 0.9]),
            Scale::Small => (0.002, vec![32, 16, 8], vec![0.5, 0.7, 0.9]),
            Scale::Medium => (0.0015, vec![64, 32, 16], vec![0.5, 0.7, 0.9]),
            Scale::Full => (0.001, vec![256, 128, 32, 32], vec![0.5, 0.5, 0.9, 0.9]),
        };

        Self {
            scale,
            initial_learning_rate,
            hidden_layer_features,
            output_keep_probs,
        }
    }

    /// Checks that every layer has a keep probability in `(0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if self.hidden_layer_features.is_empty() {
            return Err(VocationError::InvalidNetwork("no hidden layers".into()));
        }
        if self.hidden_layer_features.len() != self.output_keep_probs.len() {
            return Err(VocationError::InvalidNetwork(format!(
                "{} hidden layers but {} keep probabilities",
                self.hidden_layer_features.len(),
                self.output_keep_probs.len()
            )));
        }
        if let Some(p) = self
            .output_keep_probs
            .iter()
            .find(|p| !(**p > 0.0 && **p <= 1.0))
        {
            return Err(VocationError::InvalidNetwork(format!(
                "keep probability {p} outside (0, 1]"
            )));
        }
        if self.hidden_layer_features.contains(&0) {
            return Err(VocationError::InvalidNetwork("zero-width layer".into()));
        }
        if !(self.initial_learning_rate > 0.0) {
            return Err(VocationError::InvalidNetwork(format!(
                "initial learning rate {} must be positive",
                self.initial_learning_rate
            )));
        }
        Ok(())
    }

    /// Expands the table row into per-layer specs. Layers with dropout use a
    /// GRU cell, layers without use an LSTM cell.
    #[must_use]
    pub fn layers(&self) -> Vec<LayerSpec> {
        self.hidden_layer_features
            .iter()
            .zip(&self.output_keep_probs)
            .map(|(&hidden, &keep_prob)| LayerSpec {
                cell: if keep_prob < 1.0 {
                    CellKind::Gru
                } else {
                    CellKind::Lstm
                },
                hidden,
                keep_prob,
            })
            .collect()
    }

    /// Width of the last layer's output in one direction.
    #[must_use]
    pub fn output_features(&self) -> usize {
        self.hidden_layer_features.last().copied().unwrap_or(0)
    }

    /// Writes the configuration to the `config.network` log target.
    pub fn log(&self) {
        tracing::info!(target: "config.network", "SHUFFLED {} hidden layer(s)", self.hidden_layer_features.len());
        tracing::info!(target: "config.network", "number of cell units: {:?}", self.hidden_layer_features);
        tracing::info!(target: "config.network", "dropout keep probs: {:?}", self.output_keep_probs);
        tracing::info!(target: "config.network", "initial learning rate: {:.4}", self.initial_learning_rate);
    }
}
