use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::{SequenceStore, StoredSequence};
use crate::error::Result;
use crate::types::Matrix;

#[derive(Serialize, Deserialize)]
struct Record {
    mat: Vec<Vec<f32>>,
    occupation: String,
}

/// One `<id>.json` file per identifier, holding `{"mat": [[..]], "occupation": ".."}`.
#[derive(Debug, Clone)]
pub struct JsonDirStore {
    dir: PathBuf,
}

impl JsonDirStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Writes (or overwrites) the record for `id`, creating the directory
    /// if needed.
    pub fn write(&self, id: &str, matrix: &Matrix, label: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let record = Record {
            mat: matrix.to_rows(),
            occupation: label.to_string(),
        };
        fs::write(self.path_for(id), serde_json::to_vec(&record)?)?;
        Ok(())
    }
}

impl SequenceStore for JsonDirStore {
    fn fetch(&self, id: &str) -> Result<Option<StoredSequence>> {
        let path = self.path_for(id);
        if !path.is_file() {
            return Ok(None);
        }
        let record: Record = serde_json::from_slice(&fs::read(&path)?)?;
        Ok(Some(StoredSequence {
            matrix: Matrix::from_rows(&record.mat)?,
            label: Some(record.occupation),
        }))
    }

    fn describe(&self) -> String {
        format!("json directory {}", self.dir.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_then_fetch() {
        let tmp = TempDir::new().unwrap();
        let store = JsonDirStore::new(tmp.path().join("vectors"));
        let m = Matrix::from_rows(&[vec![0.5, -1.0], vec![2.0, 0.0]]).unwrap();
        store.write("Ada_Lovelace", &m, "mathematician").unwrap();

        let got = store.fetch("Ada_Lovelace").unwrap().unwrap();
        assert_eq!(got.matrix, m);
        assert_eq!(got.label.as_deref(), Some("mathematician"));
    }

    #[test]
    fn missing_file_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = JsonDirStore::new(tmp.path());
        assert!(store.fetch("nobody").unwrap().is_none());
    }

    #[test]
    fn reads_hand_written_record() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("x.json"),
            r#"{"mat": [[1, 2, 3]], "occupation": "painter"}"#,
        )
        .unwrap();
        let got = JsonDirStore::new(tmp.path()).fetch("x").unwrap().unwrap();
        assert_eq!(got.matrix.cols(), 3);
        assert_eq!(got.matrix.row(0), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn ragged_record_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(
            tmp.path().join("x.json"),
            r#"{"mat": [[1, 2], [3]], "occupation": "painter"}"#,
        )
        .unwrap();
        let err = JsonDirStore::new(tmp.path()).fetch("x").unwrap_err();
        assert!(err.is_data_integrity());
    }
}
