//! Run directories and log routing.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// `<base>/<timestamp>-<label>`, holding the logs, metric files, config
/// and checkpoints of one training run.
#[derive(Debug, Clone)]
pub struct RunDir {
    path: PathBuf,
}

impl RunDir {
    /// Creates a fresh, timestamped run directory under `base`.
    pub fn create(base: &Path, label: &str) -> anyhow::Result<Self> {
        let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
        let mut path = base.join(format!("{stamp}-{label}"));
        let mut n = 1;
        while path.exists() {
            path = base.join(format!("{stamp}-{label}-{n}"));
            n += 1;
        }
        fs::create_dir_all(&path)
            .with_context(|| format!("creating run directory {}", path.display()))?;
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log_file(&self) -> PathBuf {
        self.path.join("log.txt")
    }

    /// Writes `config` as `config.json`.
    pub fn write_config<T: Serialize>(&self, config: &T) -> anyhow::Result<PathBuf> {
        let path = self.path.join("config.json");
        fs::write(&path, serde_json::to_string_pretty(config)?)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}

/// Log sink that can be pointed at a new file between runs.
///
/// Writes are dropped while no file is attached.
#[derive(Debug, Clone, Default)]
pub struct RunLog {
    file: Arc<Mutex<Option<File>>>,
}

impl RunLog {
    /// Sends subsequent log lines to `path` (appending).
    pub fn attach(&self, path: &Path) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if let Ok(mut slot) = self.file.lock() {
            *slot = Some(file);
        }
        Ok(())
    }

    pub fn detach(&self) {
        if let Ok(mut slot) = self.file.lock() {
            *slot = None;
        }
    }
}

impl Write for RunLog {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.file.lock() {
            Ok(mut slot) => match slot.as_mut() {
                Some(file) => file.write(buf),
                None => Ok(buf.len()),
            },
            Err(_) => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file.lock() {
            Ok(mut slot) => slot.as_mut().map_or(Ok(()), File::flush),
            Err(_) => Ok(()),
        }
    }
}

/// Installs the global subscriber: human-readable lines on stderr plus
/// plain lines on the returned [`RunLog`]. `RUST_LOG` overrides
/// `default_directive`.
pub fn init_logging(default_directive: &str) -> RunLog {
    let run_log = RunLog::default();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    let file_writer = run_log.clone();
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(move || file_writer.clone()),
        )
        .try_init();
    if let Err(err) = installed {
        eprintln!("logging already initialized: {err}");
    }
    run_log
}
