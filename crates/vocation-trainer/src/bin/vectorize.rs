//! Converts raw biography texts into a JSON-directory or SQLite store of
//! embedding matrices.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;
use tracing::{debug, info, warn};
use vocation_core::{JsonDirStore, Matrix, PeopleIndex, SqliteStore, Tokenizer, WordEmbeddings};
use vocation_trainer::init_logging;

#[derive(Parser)]
#[command(name = "vectorize")]
#[command(about = "Convert biography texts into embedding matrices")]
#[command(version)]
struct Cli {
    /// People index mapping identifiers to their occupations
    #[arg(long, env = "VOCATION_PEOPLE", default_value = "data/peopleData/processed_names.json")]
    people: PathBuf,

    /// Directory of `<id>.txt` texts
    #[arg(long, default_value = "data/peopleData/earlyLifesTexts")]
    texts: PathBuf,

    /// GloVe-style embedding table
    #[arg(long, env = "VOCATION_EMBEDDINGS")]
    embeddings: PathBuf,

    /// Corpus whose tokens restrict the embedding table
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Write `<id>.json` files into this directory
    #[arg(long, conflicts_with = "sqlite")]
    out_dir: Option<PathBuf>,

    /// Write into this SQLite database
    #[arg(long)]
    sqlite: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,
}

enum Sink {
    Json(JsonDirStore),
    Sqlite(SqliteStore),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.verbose { "debug" } else { "info" });

    let mut sink = match (&cli.out_dir, &cli.sqlite) {
        (Some(dir), None) => Sink::Json(JsonDirStore::new(dir)),
        (None, Some(path)) => Sink::Sqlite(
            SqliteStore::open(path).with_context(|| format!("opening {}", path.display()))?,
        ),
        _ => bail!("exactly one of --out-dir or --sqlite is required"),
    };

    let tokenizer = Tokenizer::new()?;
    let relevant = match &cli.corpus {
        Some(corpus) => Some(
            tokenizer.token_set(
                &fs::read_to_string(corpus)
                    .with_context(|| format!("reading corpus {}", corpus.display()))?,
            ),
        ),
        None => None,
    };
    let embeddings = WordEmbeddings::from_file(&cli.embeddings, relevant.as_ref())
        .with_context(|| format!("loading embeddings {}", cli.embeddings.display()))?;
    info!(
        "Loaded {} token vectors of dimension {}",
        embeddings.len(),
        embeddings.dim()
    );

    let index = PeopleIndex::from_file(&cli.people)
        .with_context(|| format!("reading people index {}", cli.people.display()))?;

    // SQLite rows are buffered and committed in one transaction.
    let mut pending: Vec<(String, Matrix, String)> = Vec::new();
    let mut written = 0usize;
    let mut missing = 0usize;
    let mut empty = 0usize;
    for (id, label) in index.iter() {
        let path = cli.texts.join(format!("{id}.txt"));
        if !path.is_file() {
            debug!("{} does not exist", path.display());
            missing += 1;
            continue;
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        let matrix = embeddings.text_to_matrix(&text, &tokenizer)?;
        if matrix.rows() == 0 {
            warn!("{id} has no tokens, skipping");
            empty += 1;
            continue;
        }

        match &sink {
            Sink::Json(store) => store.write(id, &matrix, label)?,
            Sink::Sqlite(_) => pending.push((id.to_string(), matrix, label.to_string())),
        }
        written += 1;
        if written % 500 == 0 {
            info!("{written} / {} converted", index.len());
        }
    }

    if let Sink::Sqlite(store) = &mut sink {
        let rows = pending
            .iter()
            .map(|(id, matrix, label)| (id.as_str(), matrix, label.as_str()));
        store.insert_all(rows).context("writing matrices to SQLite")?;
        info!("SQLite store now holds {} sequences", store.len()?);
    }

    if missing > 0 {
        warn!("{missing} / {} do not exist", index.len());
    }
    info!("Wrote {written} matrices ({empty} empty texts skipped)");
    Ok(())
}
