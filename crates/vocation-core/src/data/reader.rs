//! # Cyclic batch sampling over the training partition
//!
//! The reader owns the three partitions and the training cursor. Training
//! batches are drawn as consecutive windows that wrap from the tail of the
//! partition back to its head, so every example is seen once per pass no
//! matter whether the batch size divides the partition size. Evaluation
//! partitions are only ever read in order.

use oorandom::Rand64;

use crate::data::loader::LoadedDataset;
use crate::data::pad::{PadMode, pad_examples};
use crate::data::shuffle;
use crate::data::splitter::{SplitFractions, stratified_split};
use crate::error::{Result, VocationError};
use crate::labels::LabelEncoder;
use crate::types::{Example, PaddedBatch, Partition};

#[derive(Debug)]
struct Part {
    examples: Vec<Example>,
    labels: Vec<usize>,
}

impl Part {
    fn new(examples: Vec<Example>, encoder: &LabelEncoder) -> Result<Self> {
        let labels = encoder.encode_all(examples.iter().map(|e| e.label.as_str()))?;
        Ok(Self { examples, labels })
    }

    fn len(&self) -> usize {
        self.examples.len()
    }
}

/// Partitioned dataset with a training cursor.
#[derive(Debug)]
pub struct DataReader {
    train: Part,
    valid: Part,
    test: Part,
    encoder: LabelEncoder,
    max_len: usize,
    feature_dim: usize,
    cursor: usize,
    rng: Rand64,
    shuffle_within_batch: bool,
}

impl DataReader {
    /// Splits a loaded dataset with the stratified splitter and shuffles the
    /// training partition once.
    pub fn new(dataset: LoadedDataset, fractions: SplitFractions, seed: u64) -> Result<Self> {
        let labels: Vec<&str> = dataset.examples.iter().map(|e| e.label.as_str()).collect();
        let split = stratified_split(&labels, fractions, seed)?;

        let mut slots: Vec<Option<Example>> = dataset.examples.into_iter().map(Some).collect();
        let mut take = |indices: &[usize]| -> Vec<Example> {
            indices.iter().filter_map(|&i| slots[i].take()).collect()
        };
        let mut train = take(&split.train);
        let valid = take(&split.valid);
        let test = take(&split.test);

        let mut rng = Rand64::new(u128::from(seed));
        shuffle(&mut train, &mut rng);

        Self::assemble(train, valid, test, rng)
    }

    /// Uses the given partitions as they are, without splitting or shuffling.
    pub fn from_partitions(
        train: Vec<Example>,
        valid: Vec<Example>,
        test: Vec<Example>,
        seed: u64,
    ) -> Result<Self> {
        Self::assemble(train, valid, test, Rand64::new(u128::from(seed)))
    }

    fn assemble(
        train: Vec<Example>,
        valid: Vec<Example>,
        test: Vec<Example>,
        rng: Rand64,
    ) -> Result<Self> {
        if train.is_empty() {
            return Err(VocationError::EmptyDataset("training partition is empty".into()));
        }

        let all = || train.iter().chain(&valid).chain(&test);
        let encoder = LabelEncoder::fit(all().map(|e| e.label.as_str()));
        let max_len = all().map(Example::len).max().unwrap_or(0);
        let feature_dim = train[0].matrix.cols();
        if let Some(bad) = all().find(|e| e.matrix.cols() != feature_dim) {
            return Err(VocationError::FeatureDimMismatch {
                id: bad.id.clone(),
                expected: feature_dim,
                actual: bad.matrix.cols(),
            });
        }

        Ok(Self {
            train: Part::new(train, &encoder)?,
            valid: Part::new(valid, &encoder)?,
            test: Part::new(test, &encoder)?,
            encoder,
            max_len,
            feature_dim,
            cursor: 0,
            rng,
            shuffle_within_batch: true,
        })
    }

    /// Enable or disable the random permutation applied inside each batch.
    pub fn within_batch_shuffle(mut self, enabled: bool) -> Self {
        self.shuffle_within_batch = enabled;
        self
    }

    /// Draws the next `batch_size` training examples, wrapping around the
    /// end of the partition.
    pub fn next_batch(&mut self, batch_size: usize, pad: PadMode) -> Result<PaddedBatch> {
        let total = self.train.len();
        if batch_size == 0 || batch_size > total {
            return Err(VocationError::InvalidBatchSize {
                requested: batch_size,
                available: total,
            });
        }

        let mut indices: Vec<usize> = (self.cursor..self.cursor + batch_size)
            .map(|i| i % total)
            .collect();
        self.cursor = (self.cursor + batch_size) % total;

        if self.shuffle_within_batch {
            shuffle(&mut indices, &mut self.rng);
        }

        let batch = self.pad(Partition::Train, &indices, pad)?;
        tracing::trace!(
            "indices {:?} --> lengths {:?} --> labels {:?}",
            indices,
            batch.lengths,
            batch.labels
        );
        Ok(batch)
    }

    /// Moves the training cursor back to the first example.
    pub fn rewind(&mut self) {
        self.cursor = 0;
    }

    /// Current training cursor.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// A whole partition as one batch, in stored order.
    pub fn all_of(&self, partition: Partition, pad: PadMode) -> Result<PaddedBatch> {
        let indices: Vec<usize> = (0..self.partition_len(partition)).collect();
        self.pad(partition, &indices, pad)
    }

    /// Consecutive batches covering `partition` exactly once, in stored
    /// order. The last batch may be short.
    pub fn batches_of(
        &self,
        partition: Partition,
        batch_size: usize,
        pad: PadMode,
    ) -> Result<Batches<'_>> {
        if batch_size == 0 {
            return Err(VocationError::InvalidBatchSize {
                requested: 0,
                available: self.partition_len(partition),
            });
        }
        Ok(Batches {
            reader: self,
            partition,
            batch_size,
            pad,
            offset: 0,
        })
    }

    fn part(&self, partition: Partition) -> &Part {
        match partition {
            Partition::Train => &self.train,
            Partition::Valid => &self.valid,
            Partition::Test => &self.test,
        }
    }

    fn pad(&self, partition: Partition, indices: &[usize], pad: PadMode) -> Result<PaddedBatch> {
        let part = self.part(partition);
        let examples: Vec<&Example> = indices.iter().map(|&i| &part.examples[i]).collect();
        let labels: Vec<usize> = indices.iter().map(|&i| part.labels[i]).collect();
        let pad_to = match pad {
            PadMode::Local => None,
            PadMode::Global => Some(self.max_len),
        };
        pad_examples(
            &examples,
            &labels,
            pad_to,
            self.feature_dim,
            self.encoder.num_classes(),
        )
    }

    pub fn partition_len(&self, partition: Partition) -> usize {
        self.part(partition).len()
    }

    /// Identifiers of a partition, in stored order.
    pub fn ids(&self, partition: Partition) -> Vec<&str> {
        self.part(partition)
            .examples
            .iter()
            .map(|e| e.id.as_str())
            .collect()
    }

    pub fn train_size(&self) -> usize {
        self.train.len()
    }

    /// Longest sequence across all partitions.
    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn feature_dim(&self) -> usize {
        self.feature_dim
    }

    pub fn classes(&self) -> &[String] {
        self.encoder.classes()
    }

    pub fn num_classes(&self) -> usize {
        self.encoder.num_classes()
    }
}

/// Iterator returned by [`DataReader::batches_of`].
pub struct Batches<'a> {
    reader: &'a DataReader,
    partition: Partition,
    batch_size: usize,
    pad: PadMode,
    offset: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<PaddedBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        let total = self.reader.partition_len(self.partition);
        if self.offset >= total {
            return None;
        }
        let end = (self.offset + self.batch_size).min(total);
        let indices: Vec<usize> = (self.offset..end).collect();
        self.offset = end;
        Some(self.reader.pad(self.partition, &indices, self.pad))
    }
}
