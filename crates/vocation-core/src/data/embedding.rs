//! # Word-embedding lookup
//!
//! Reads a GloVe-style text table (`token v1 v2 ... vd` per line), keeping
//! only the tokens a corpus actually uses, and turns texts into embedding
//! matrices one row per token. Tokens missing from the table map to a
//! shared unknown vector, the mean of every retained vector.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;

use crate::error::{Result, VocationError};
use crate::types::Matrix;

/// Lowercasing word tokenizer.
///
/// Words keep inner apostrophes (`o'brien`, `don't`); every other
/// non-space, non-alphanumeric character is a token on its own.
#[derive(Debug, Clone)]
pub struct Tokenizer {
    re_token: Regex,
}

impl Tokenizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            re_token: Regex::new(r"[\p{L}\p{N}]+(?:'[\p{L}]+)*|[^\s\p{L}\p{N}]")?,
        })
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        self.re_token
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }

    /// Distinct tokens of `corpus`.
    pub fn token_set(&self, corpus: &str) -> HashSet<String> {
        self.re_token
            .find_iter(corpus)
            .map(|m| m.as_str().to_lowercase())
            .collect()
    }
}

/// Embedding table restricted to a set of relevant tokens.
#[derive(Debug, Clone)]
pub struct WordEmbeddings {
    index: HashMap<String, usize>,
    vectors: Vec<f32>,
    unknown: Vec<f32>,
    dim: usize,
}

impl WordEmbeddings {
    /// Loads the table at `path`. See [`WordEmbeddings::from_reader`].
    pub fn from_file(path: &Path, relevant: Option<&HashSet<String>>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), relevant)
    }

    /// Parses a table, keeping every token when `relevant` is `None`.
    ///
    /// The dimension is taken from the first line; a later line with a
    /// different width is an error.
    pub fn from_reader<R: BufRead>(reader: R, relevant: Option<&HashSet<String>>) -> Result<Self> {
        let mut index = HashMap::new();
        let mut vectors = Vec::new();
        let mut dim = 0;

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let mut parts = line.split_whitespace();
            let Some(token) = parts.next() else {
                continue;
            };

            let values = parts
                .map(str::parse::<f32>)
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| VocationError::Embedding(format!("line {}: {e}", lineno + 1)))?;

            if dim == 0 {
                dim = values.len();
            }
            if values.is_empty() || values.len() != dim {
                return Err(VocationError::Embedding(format!(
                    "line {}: expected {dim} values, found {}",
                    lineno + 1,
                    values.len()
                )));
            }

            if relevant.is_some_and(|set| !set.contains(token)) || index.contains_key(token) {
                continue;
            }
            index.insert(token.to_string(), index.len());
            vectors.extend_from_slice(&values);
        }

        if index.is_empty() {
            return Err(VocationError::Embedding("no relevant vectors in table".into()));
        }

        let mut unknown = vec![0.0f32; dim];
        for vector in vectors.chunks_exact(dim) {
            for (acc, v) in unknown.iter_mut().zip(vector) {
                *acc += v;
            }
        }
        let count = index.len() as f32;
        unknown.iter_mut().for_each(|v| *v /= count);

        tracing::debug!(tokens = index.len(), dim, "loaded word embeddings");

        Ok(Self {
            index,
            vectors,
            unknown,
            dim,
        })
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of known tokens.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Vector of a known token.
    pub fn get(&self, token: &str) -> Option<&[f32]> {
        self.index
            .get(token)
            .map(|&i| &self.vectors[i * self.dim..(i + 1) * self.dim])
    }

    /// Vector of `token`, or the unknown vector.
    pub fn lookup(&self, token: &str) -> &[f32] {
        self.get(token).unwrap_or(&self.unknown)
    }

    pub fn unknown(&self) -> &[f32] {
        &self.unknown
    }

    /// One row per token of `text`.
    pub fn text_to_matrix(&self, text: &str, tokenizer: &Tokenizer) -> Result<Matrix> {
        let tokens = tokenizer.tokenize(text);
        let mut data = Vec::with_capacity(tokens.len() * self.dim);
        for token in &tokens {
            data.extend_from_slice(self.lookup(token));
        }
        Matrix::from_flat(tokens.len(), self.dim, data)
    }
}
