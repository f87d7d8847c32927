//! # Data pipeline
//!
//! Loading, splitting, padding and sampling of labeled embedding sequences.
//!
//! ```text
//! SequenceStore ──► load_dataset ──► stratified_split ──► DataReader
//!   (json/sqlite/text)  (PeopleIndex)                       │
//!                                                next_batch / batches_of
//!                                                           ▼
//!                                                      PaddedBatch
//! ```

pub mod embedding;
pub mod loader;
pub mod manifest;
pub mod pad;
pub mod reader;
pub mod splitter;
pub mod store;

pub use embedding::{Tokenizer, WordEmbeddings};
pub use loader::{LoadedDataset, load_dataset};
pub use manifest::PeopleIndex;
pub use pad::{PadMode, pad_examples};
pub use reader::{Batches, DataReader};
pub use splitter::{Split, SplitFractions, SplitSummary, stratified_split};
pub use store::{JsonDirStore, SequenceStore, SqliteStore, StoredSequence, TextEmbeddingStore};

use oorandom::Rand64;

/// In-place Fisher-Yates shuffle driven by a seeded generator.
pub(crate) fn shuffle<T>(items: &mut [T], rng: &mut Rand64) {
    for i in (1..items.len()).rev() {
        let j = rng.rand_range(0..(i as u64 + 1)) as usize;
        items.swap(i, j);
    }
}
