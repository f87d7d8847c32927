//! # Vocation
//!
//! Occupation classification from biographical embedding sequences.
//!
//! - [`vocation_core`]: stores, loading, stratified splitting, padded
//!   batching and run presets.
//! - [`vocation_trainer`]: the training control loop and the candle
//!   reference model.

pub use vocation_core;
pub use vocation_trainer;

pub use vocation_core::{
    DataReader, Example, LabelEncoder, Matrix, NetworkConfig, PadMode, PaddedBatch, Partition,
    PeopleIndex, Result, RunConfig, Scale, ScheduleConfig, SequenceStore, SplitFractions,
    VocationError, load_dataset, stratified_split,
};
pub use vocation_trainer::{ModelBinding, RnnClassifier, RunSummary, TrainerOptions, train};
