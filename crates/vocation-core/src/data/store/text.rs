use std::fs;
use std::path::PathBuf;

use super::{SequenceStore, StoredSequence};
use crate::data::embedding::{Tokenizer, WordEmbeddings};
use crate::error::Result;

/// Converts `<dir>/<id>.txt` through a word-embedding table on every fetch.
///
/// Raw texts carry no label, so the expected label is used as is.
pub struct TextEmbeddingStore {
    dir: PathBuf,
    embeddings: WordEmbeddings,
    tokenizer: Tokenizer,
}

impl TextEmbeddingStore {
    pub fn new(dir: impl Into<PathBuf>, embeddings: WordEmbeddings) -> Result<Self> {
        Ok(Self {
            dir: dir.into(),
            embeddings,
            tokenizer: Tokenizer::new()?,
        })
    }

    pub fn embeddings(&self) -> &WordEmbeddings {
        &self.embeddings
    }
}

impl SequenceStore for TextEmbeddingStore {
    fn fetch(&self, id: &str) -> Result<Option<StoredSequence>> {
        let path = self.dir.join(format!("{id}.txt"));
        if !path.is_file() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        Ok(Some(StoredSequence {
            matrix: self.embeddings.text_to_matrix(&text, &self.tokenizer)?,
            label: None,
        }))
    }

    fn describe(&self) -> String {
        format!(
            "text directory {} ({}-d embeddings, {} tokens)",
            self.dir.display(),
            self.embeddings.dim(),
            self.embeddings.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn converts_text_on_fetch() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("Ada.txt"), "She was born in London.").unwrap();
        let emb =
            WordEmbeddings::from_reader(Cursor::new("she 1 0\nborn 0 1\nlondon 1 1\n"), None)
                .unwrap();
        let store = TextEmbeddingStore::new(tmp.path(), emb).unwrap();

        let got = store.fetch("Ada").unwrap().unwrap();
        assert_eq!(got.matrix.rows(), 6);
        assert_eq!(got.matrix.row(4), &[1.0, 1.0]);
        assert!(got.label.is_none());
        assert!(store.fetch("Bob").unwrap().is_none());
    }
}
