//! Parameter checkpoints under `<run>/saved/`.
//!
//! ```text
//! saved/
//!   save.ckpt-40.safetensors   after the validation at 40 examples
//!   save.ckpt-160.safetensors
//!   save.ckpt.safetensors      at the end of the run
//!   checkpoint.json            {"latest": "save.ckpt.safetensors", "all": [...]}
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::binding::ModelBinding;

const PREFIX: &str = "save.ckpt";
const EXTENSION: &str = "safetensors";
const INDEX_FILE: &str = "checkpoint.json";

/// Contents of `checkpoint.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointIndex {
    pub latest: String,
    pub all: Vec<String>,
}

pub struct CheckpointManager {
    dir: PathBuf,
    index: CheckpointIndex,
}

impl CheckpointManager {
    /// Creates `<run_dir>/saved`, removing anything a previous run left there.
    pub fn create(run_dir: &Path) -> anyhow::Result<Self> {
        let dir = run_dir.join("saved");
        if dir.exists() {
            fs::remove_dir_all(&dir)
                .with_context(|| format!("clearing checkpoint directory {}", dir.display()))?;
        }
        fs::create_dir_all(&dir)
            .with_context(|| format!("creating checkpoint directory {}", dir.display()))?;
        Ok(Self {
            dir,
            index: CheckpointIndex::default(),
        })
    }

    /// File name of the checkpoint taken after `examples` training examples,
    /// or of the final checkpoint when `None`.
    pub fn file_name(examples: Option<usize>) -> String {
        match examples {
            Some(n) => format!("{PREFIX}-{n}.{EXTENSION}"),
            None => format!("{PREFIX}.{EXTENSION}"),
        }
    }

    /// Saves a checkpoint keyed by the number of examples seen.
    pub fn save_step<M>(&mut self, model: &M, examples: usize) -> anyhow::Result<PathBuf>
    where
        M: ModelBinding + ?Sized,
    {
        self.save(model, Self::file_name(Some(examples)))
    }

    /// Saves the end-of-run checkpoint.
    pub fn save_final<M>(&mut self, model: &M) -> anyhow::Result<PathBuf>
    where
        M: ModelBinding + ?Sized,
    {
        self.save(model, Self::file_name(None))
    }

    fn save<M>(&mut self, model: &M, name: String) -> anyhow::Result<PathBuf>
    where
        M: ModelBinding + ?Sized,
    {
        let path = self.dir.join(&name);
        model
            .save_parameters(&path)
            .with_context(|| format!("saving checkpoint to {}", path.display()))?;

        if !self.index.all.contains(&name) {
            self.index.all.push(name.clone());
        }
        self.index.latest = name;
        fs::write(
            self.dir.join(INDEX_FILE),
            serde_json::to_string_pretty(&self.index)?,
        )
        .context("writing checkpoint.json")?;

        tracing::debug!("saved checkpoint {}", path.display());
        Ok(path)
    }
}
