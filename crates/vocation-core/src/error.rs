use thiserror::Error;

/// Errors that can occur while building or sampling a dataset.
#[derive(Debug, Error)]
pub enum VocationError {
    /// The scale name does not match any preset.
    #[error("unknown scale {name:?}; expected one of basic, tiny, small, medium, full")]
    InvalidScale {
        /// The name that was requested.
        name: String,
    },

    /// Split fractions do not add up to one.
    #[error("split fractions do not add up to 1: {train} + {valid} + {test} = {sum}")]
    FractionMismatch {
        train: f64,
        valid: f64,
        test: f64,
        sum: f64,
    },

    /// A split fraction is negative or not a finite number.
    #[error("invalid split fraction: {0}")]
    InvalidFraction(f64),

    /// The requested batch size cannot be drawn from the training partition.
    #[error("batch size {requested} is invalid for a partition of {available} examples")]
    InvalidBatchSize { requested: usize, available: usize },

    /// A fixed pad length is shorter than a sequence in the batch.
    #[error("pad length {requested} is shorter than the longest sequence ({longest})")]
    PadTooShort { requested: usize, longest: usize },

    /// A network preset is internally inconsistent.
    #[error("invalid network configuration: {0}")]
    InvalidNetwork(String),

    /// A run setting is out of range.
    #[error("invalid run configuration: {0}")]
    InvalidRun(String),

    /// The label in the store disagrees with the expected label.
    #[error("label mismatch for {id:?}: expected {expected:?}, store has {stored:?}")]
    LabelMismatch {
        id: String,
        expected: String,
        stored: String,
    },

    /// A class has too few examples to appear in every partition.
    #[error("class {label:?} has {count} example(s), at least {needed} are needed to stratify")]
    StratificationInfeasible {
        label: String,
        count: usize,
        needed: usize,
    },

    /// An embedding matrix has the wrong number of columns.
    #[error("feature dimension mismatch for {id:?}: expected {expected}, got {actual}")]
    FeatureDimMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    /// Matrix rows are not all the same width.
    #[error("ragged matrix: row {row} has {actual} columns, expected {expected}")]
    RaggedMatrix {
        row: usize,
        expected: usize,
        actual: usize,
    },

    /// An index entry lists no occupation.
    #[error("no occupation recorded for {id:?}")]
    MissingLabel { id: String },

    /// A sequence has no rows.
    #[error("sequence {id:?} is empty")]
    EmptySequence { id: String },

    /// A label is not known to the encoder.
    #[error("unknown label: {0:?}")]
    UnknownLabel(String),

    /// Nothing was loaded, or a partition came out empty.
    #[error("dataset is empty: {0}")]
    EmptyDataset(String),

    /// The embedding table could not be read.
    #[error("embedding error: {0}")]
    Embedding(String),

    /// Filesystem failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed JSON record.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// SQLite store failure.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Tokenizer pattern failed to compile.
    #[error("Regex error: {0}")]
    RegexError(#[from] regex::Error),

    /// Candle tensor construction failure.
    #[error("tensor error: {0}")]
    CandleError(String),
}

impl VocationError {
    /// Errors caused by a bad run configuration.
    #[must_use]
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidScale { .. }
                | Self::FractionMismatch { .. }
                | Self::InvalidFraction(_)
                | Self::InvalidBatchSize { .. }
                | Self::PadTooShort { .. }
                | Self::InvalidNetwork(_)
                | Self::InvalidRun(_)
        )
    }

    /// Errors caused by inconsistent data.
    #[must_use]
    pub fn is_data_integrity(&self) -> bool {
        matches!(
            self,
            Self::LabelMismatch { .. }
                | Self::StratificationInfeasible { .. }
                | Self::FeatureDimMismatch { .. }
                | Self::RaggedMatrix { .. }
                | Self::EmptySequence { .. }
                | Self::MissingLabel { .. }
                | Self::UnknownLabel(_)
                | Self::EmptyDataset(_)
        )
    }
}

impl From<candle_core::Error> for VocationError {
    fn from(err: candle_core::Error) -> Self {
        Self::CandleError(err.to_string())
    }
}

/// Result type alias for Vocation operations.
pub type Result<T> = std::result::Result<T, VocationError>;
