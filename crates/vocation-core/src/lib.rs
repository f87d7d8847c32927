//! # Vocation Core
//!
//! Data side of the Vocation occupation classifier: sequence stores,
//! stratified splitting, zero-padded batching and the run presets that size
//! a training run.
//!
//! ## Quick Start
//!
//! ```rust
//! use vocation_core::data::{DataReader, PadMode};
//! use vocation_core::types::{Example, Matrix};
//!
//! let train: Vec<Example> = (0..6)
//!     .map(|i| Example::new(format!("p{i}"), Matrix::zeros(i + 1, 4), ["poet", "judge"][i % 2]))
//!     .collect();
//! let mut reader = DataReader::from_partitions(train, vec![], vec![], 0).unwrap();
//!
//! let batch = reader.next_batch(4, PadMode::Local).unwrap();
//! assert_eq!(batch.len(), 4);
//! assert_eq!(reader.position(), 4);
//! ```
pub mod config;
pub mod data;
pub mod error;
pub mod labels;
pub mod types;

// Re-export primary API
pub use config::{CellKind, LayerSpec, NetworkConfig, RunConfig, Scale, ScheduleConfig};
pub use data::{
    DataReader, JsonDirStore, LoadedDataset, PadMode, PeopleIndex, SequenceStore, SplitFractions,
    SqliteStore, TextEmbeddingStore, Tokenizer, WordEmbeddings, load_dataset, stratified_split,
};
pub use error::{Result, VocationError};
pub use labels::LabelEncoder;
pub use types::{Example, Matrix, PaddedBatch, Partition};
