//! Scalar metric logs, one JSON object per line.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// One logged scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalarRecord {
    /// Training examples seen when the value was recorded.
    pub index: usize,
    pub tag: String,
    pub value: f64,
}

/// Append-only JSONL scalar sink.
pub struct ScalarLog {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl ScalarLog {
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening metric log {}", path.display()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    pub fn write(&mut self, index: usize, tag: &str, value: f64) -> anyhow::Result<()> {
        let record = ScalarRecord {
            index,
            tag: tag.to_string(),
            value,
        };
        serde_json::to_writer(&mut self.writer, &record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.writer
            .flush()
            .with_context(|| format!("flushing {}", self.path.display()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The train/valid/test logs of one run.
pub struct MetricSinks {
    pub train: ScalarLog,
    pub valid: ScalarLog,
    pub test: ScalarLog,
}

impl MetricSinks {
    pub fn create(run_dir: &Path) -> anyhow::Result<Self> {
        Ok(Self {
            train: ScalarLog::create(&run_dir.join("train.jsonl"))?,
            valid: ScalarLog::create(&run_dir.join("valid.jsonl"))?,
            test: ScalarLog::create(&run_dir.join("test.jsonl"))?,
        })
    }

    pub fn flush(&mut self) -> anyhow::Result<()> {
        self.train.flush()?;
        self.valid.flush()?;
        self.test.flush()
    }
}

/// Reads back a JSONL scalar log.
pub fn read_scalars(path: &Path) -> anyhow::Result<Vec<ScalarRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading metric log {}", path.display()))?;
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(anyhow::Error::from))
        .collect()
}
