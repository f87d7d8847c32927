use serde::{Deserialize, Serialize};

use crate::types::Matrix;

/// One labeled sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Example {
    /// Identifier in the backing store (a person's name).
    pub id: String,
    /// Embedding matrix, `[sequence_length, feature_dim]`.
    pub matrix: Matrix,
    /// Raw occupation label.
    pub label: String,
}

impl Example {
    pub fn new(id: impl Into<String>, matrix: Matrix, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            matrix,
            label: label.into(),
        }
    }

    /// Number of tokens in the sequence.
    #[must_use]
    pub fn len(&self) -> usize {
        self.matrix.rows()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matrix.rows() == 0
    }
}

/// The three disjoint dataset partitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Partition {
    Train,
    Valid,
    Test,
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Train => write!(f, "train"),
            Self::Valid => write!(f, "validation"),
            Self::Test => write!(f, "test"),
        }
    }
}
