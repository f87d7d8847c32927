//! Dense integer encoding of occupation labels.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, VocationError};

/// Maps raw labels to dense indices in sorted order.
///
/// The same set of labels always yields the same mapping, regardless of the
/// order they were seen in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelEncoder {
    classes: Vec<String>,
}

impl LabelEncoder {
    /// Builds the mapping from every label in `labels`.
    pub fn fit<'a, I>(labels: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let classes: BTreeSet<&str> = labels.into_iter().collect();
        Self {
            classes: classes.into_iter().map(str::to_string).collect(),
        }
    }

    /// Index of `label`.
    pub fn encode(&self, label: &str) -> Result<usize> {
        self.classes
            .binary_search_by(|c| c.as_str().cmp(label))
            .map_err(|_| VocationError::UnknownLabel(label.to_string()))
    }

    /// Encodes every label in order.
    pub fn encode_all<'a, I>(&self, labels: I) -> Result<Vec<usize>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        labels.into_iter().map(|l| self.encode(l)).collect()
    }

    /// Label of class `index`, if it exists.
    pub fn decode(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    /// One-hot vector of width [`LabelEncoder::num_classes`].
    pub fn one_hot(&self, index: usize) -> Result<Vec<f32>> {
        if index >= self.classes.len() {
            return Err(VocationError::UnknownLabel(format!("class index {index}")));
        }
        let mut v = vec![0.0; self.classes.len()];
        v[index] = 1.0;
        Ok(v)
    }

    pub fn num_classes(&self) -> usize {
        self.classes.len()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }
}
