use crate::data::manifest::PeopleIndex;
use crate::data::store::SequenceStore;
use crate::error::{Result, VocationError};
use crate::types::Example;

/// Every example the store could supply for an index.
#[derive(Debug, Clone)]
pub struct LoadedDataset {
    pub examples: Vec<Example>,
    /// Longest sequence across the whole dataset.
    pub max_len: usize,
    pub feature_dim: usize,
    /// Identifiers the store had no entry for.
    pub missing: usize,
    /// Identifiers listed in the index.
    pub expected: usize,
}

/// Reads every identifier in `index` from `store`.
///
/// Missing entries are counted and skipped. A stored label that disagrees
/// with the index, an empty sequence, or a feature width that differs from
/// the first example aborts the load.
pub fn load_dataset<S>(store: &S, index: &PeopleIndex) -> Result<LoadedDataset>
where
    S: SequenceStore + ?Sized,
{
    tracing::info!("reading sequences from {}", store.describe());

    let mut examples = Vec::with_capacity(index.len());
    let mut missing = 0;
    let mut feature_dim = None;

    for (id, expected) in index.iter() {
        let Some(stored) = store.fetch(id)? else {
            tracing::debug!("{id} does not exist");
            missing += 1;
            continue;
        };

        match stored.label {
            Some(stored_label) if stored_label != expected => {
                return Err(VocationError::LabelMismatch {
                    id: id.to_string(),
                    expected: expected.to_string(),
                    stored: stored_label,
                });
            }
            _ => {}
        }
        if stored.matrix.rows() == 0 {
            return Err(VocationError::EmptySequence { id: id.to_string() });
        }

        let dim = *feature_dim.get_or_insert(stored.matrix.cols());
        if stored.matrix.cols() != dim {
            return Err(VocationError::FeatureDimMismatch {
                id: id.to_string(),
                expected: dim,
                actual: stored.matrix.cols(),
            });
        }

        examples.push(Example::new(id, stored.matrix, expected));
    }

    let expected = index.len();
    if missing > 0 {
        tracing::warn!("{missing} / {expected} do not exist");
    } else {
        tracing::info!("{missing} / {expected} do not exist");
    }

    let Some(feature_dim) = feature_dim else {
        return Err(VocationError::EmptyDataset(format!(
            "none of the {expected} indexed identifiers were found"
        )));
    };
    let max_len = examples.iter().map(Example::len).max().unwrap_or(0);

    Ok(LoadedDataset {
        examples,
        max_len,
        feature_dim,
        missing,
        expected,
    })
}
