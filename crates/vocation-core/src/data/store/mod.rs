//! # Backing stores
//!
//! A store answers one question: given an identifier, what is its embedding
//! matrix and (if recorded) its occupation label? Absence is not an error;
//! the loader counts missing identifiers and moves on.

mod json_dir;
mod sqlite;
mod text;

pub use json_dir::JsonDirStore;
pub use sqlite::SqliteStore;
pub use text::TextEmbeddingStore;

use crate::error::Result;
use crate::types::Matrix;

/// A matrix as it comes out of a store.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSequence {
    pub matrix: Matrix,
    /// Label recorded next to the matrix. `None` when the store does not
    /// keep labels, in which case the expected label is trusted.
    pub label: Option<String>,
}

/// Identifier → sequence lookup.
pub trait SequenceStore {
    /// Looks up `id`, returning `Ok(None)` when the store has no entry.
    fn fetch(&self, id: &str) -> Result<Option<StoredSequence>>;

    /// Short human-readable description for logs.
    fn describe(&self) -> String;
}

impl<S: SequenceStore + ?Sized> SequenceStore for Box<S> {
    fn fetch(&self, id: &str) -> Result<Option<StoredSequence>> {
        (**self).fetch(id)
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}
