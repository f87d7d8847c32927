//! Trains one or more network presets on a labeled embedding store.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use candle_core::Device;
use clap::Parser;
use serde::Serialize;
use tracing::info;
use vocation_core::config::schedule::{DECAY_PER_CYCLE, LR_LOWER_BOUND};
use vocation_core::{
    DataReader, JsonDirStore, NetworkConfig, PadMode, PeopleIndex, RunConfig, Scale,
    ScheduleConfig, SequenceStore, SplitFractions, SqliteStore, TextEmbeddingStore, Tokenizer,
    WordEmbeddings, load_dataset,
};
use vocation_trainer::{RnnClassifier, RunDir, TrainerOptions, init_logging, train};

#[derive(Parser)]
#[command(name = "train")]
#[command(about = "Train bidirectional RNN occupation classifiers")]
#[command(version)]
struct Cli {
    /// People index mapping identifiers to their occupations
    #[arg(long, env = "VOCATION_PEOPLE", default_value = "data/peopleData/processed_names.json")]
    people: PathBuf,

    /// Directory of pre-computed `<id>.json` matrices
    #[arg(long, env = "VOCATION_VECTORS", conflicts_with_all = ["sqlite", "texts"])]
    vectors: Option<PathBuf>,

    /// SQLite database written by `vectorize --sqlite`
    #[arg(long, env = "VOCATION_SQLITE", conflicts_with = "texts")]
    sqlite: Option<PathBuf>,

    /// Directory of raw `<id>.txt` texts, converted on the fly
    #[arg(long, requires = "embeddings")]
    texts: Option<PathBuf>,

    /// GloVe-style embedding table used with `--texts`
    #[arg(long, env = "VOCATION_EMBEDDINGS")]
    embeddings: Option<PathBuf>,

    /// Corpus whose tokens restrict the embedding table
    #[arg(long)]
    corpus: Option<PathBuf>,

    /// Run preset: basic, tiny, small, medium or full
    #[arg(short, long, default_value = "basic")]
    scale: Scale,

    /// Network presets to train in turn (defaults to the run preset)
    #[arg(short, long, value_delimiter = ',')]
    networks: Vec<Scale>,

    /// Override the preset's number of steps
    #[arg(long)]
    num_steps: Option<usize>,

    /// Override the preset's batch size
    #[arg(long)]
    batch_size: Option<usize>,

    #[arg(long, default_value_t = 0.7)]
    train_fraction: f64,

    #[arg(long, default_value_t = 0.15)]
    valid_fraction: f64,

    #[arg(long, default_value_t = 0.15)]
    test_fraction: f64,

    /// Learning-rate decay per pass over the training partition
    #[arg(long, default_value_t = DECAY_PER_CYCLE)]
    decay_per_cycle: f64,

    /// Lowest learning rate the schedule may reach
    #[arg(long, default_value_t = LR_LOWER_BOUND)]
    lr_floor: f64,

    /// Seed for splitting and shuffling
    #[arg(long, env = "VOCATION_SEED", default_value_t = 0)]
    seed: u64,

    /// Pad every batch to the longest sequence in the dataset
    #[arg(long)]
    global_pad: bool,

    /// Log training progress every N steps
    #[arg(long, default_value_t = 1)]
    log_train_every: usize,

    /// Parent directory of the timestamped run directories
    #[arg(long, env = "VOCATION_RUNS_DIR", default_value = "runs")]
    runs_dir: PathBuf,

    /// Debug-level logging, including every missing identifier
    #[arg(short, long)]
    verbose: bool,
}

/// Everything that determines a run, written as `config.json`.
#[derive(Serialize)]
struct RunRecord<'a> {
    run: RunConfig,
    network: &'a NetworkConfig,
    schedule: ScheduleConfig,
    options: TrainerOptions,
    fractions: SplitFractions,
    classes: &'a [String],
    /// Index entries with no sequence in the store.
    missing: usize,
    expected: usize,
}

fn open_store(cli: &Cli) -> Result<Box<dyn SequenceStore>> {
    if let Some(dir) = &cli.vectors {
        return Ok(Box::new(JsonDirStore::new(dir)));
    }
    if let Some(path) = &cli.sqlite {
        let store = SqliteStore::open(path)
            .with_context(|| format!("opening {}", path.display()))?;
        return Ok(Box::new(store));
    }
    if let (Some(dir), Some(table)) = (&cli.texts, &cli.embeddings) {
        let relevant = match &cli.corpus {
            Some(corpus) => {
                let text = fs::read_to_string(corpus)
                    .with_context(|| format!("reading corpus {}", corpus.display()))?;
                Some(Tokenizer::new()?.token_set(&text))
            }
            None => None,
        };
        info!("Extracting embedding from {}", table.display());
        let embeddings = WordEmbeddings::from_file(table, relevant.as_ref())
            .with_context(|| format!("loading embeddings {}", table.display()))?;
        let store = TextEmbeddingStore::new(dir, embeddings)?;
        info!(
            "Loaded {} token vectors of dimension {}",
            store.embeddings().len(),
            store.embeddings().dim()
        );
        return Ok(Box::new(store));
    }
    bail!("one of --vectors, --sqlite or --texts with --embeddings is required")
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let run_log = init_logging(if cli.verbose { "debug" } else { "info" });

    let mut run = RunConfig::preset(cli.scale);
    if let Some(n) = cli.num_steps {
        run = run.with_num_steps(n);
    }
    if let Some(n) = cli.batch_size {
        run = run.with_batch_size(n);
    }
    let networks = if cli.networks.is_empty() {
        vec![cli.scale]
    } else {
        cli.networks.clone()
    };
    let fractions = SplitFractions::new(cli.train_fraction, cli.valid_fraction, cli.test_fraction)?;
    let options = TrainerOptions {
        pad_mode: if cli.global_pad {
            PadMode::Global
        } else {
            PadMode::Local
        },
        log_train_every: cli.log_train_every,
        seed: cli.seed,
    };
    let schedule = ScheduleConfig::default()
        .with_decay_per_cycle(cli.decay_per_cycle)
        .with_lower_bound(cli.lr_floor);

    let index = PeopleIndex::from_file(&cli.people)
        .with_context(|| format!("reading people index {}", cli.people.display()))?;
    let store = open_store(&cli)?;
    let dataset = load_dataset(&store, &index)?;
    let (missing, expected) = (dataset.missing, dataset.expected);
    let mut reader = DataReader::new(dataset, fractions, cli.seed)?;
    info!(
        "{} classes, feature dimension {}, longest sequence {}",
        reader.num_classes(),
        reader.feature_dim(),
        reader.max_len()
    );

    for scale in networks {
        let network = NetworkConfig::preset(scale);
        let run_dir = RunDir::create(&cli.runs_dir, &format!("{}-{}", run.scale, network.scale))?;
        run_log
            .attach(&run_dir.log_file())
            .with_context(|| format!("opening {}", run_dir.log_file().display()))?;
        info!("Run directory {}", run_dir.path().display());
        info!("Data from {}", store.describe());
        info!("{missing} / {expected} do not exist");
        info!(
            "{} classes, feature dimension {}, longest sequence {}",
            reader.num_classes(),
            reader.feature_dim(),
            reader.max_len()
        );
        network.log();

        run_dir.write_config(&RunRecord {
            run,
            network: &network,
            schedule,
            options,
            fractions,
            classes: reader.classes(),
            missing,
            expected,
        })?;

        let mut model =
            RnnClassifier::new(&network, reader.feature_dim(), reader.num_classes(), Device::Cpu)?;
        let summary = train(&mut reader, &mut model, run, schedule, options, run_dir.path())
            .with_context(|| format!("training network {scale}"))?;

        fs::write(
            run_dir.path().join("summary.json"),
            serde_json::to_string_pretty(&summary)?,
        )?;
        info!(
            "Network {scale}: {} steps, test loss = {:.3}, test accuracy = {:.3}{}",
            summary.steps_run,
            summary.test.loss,
            summary.test.accuracy,
            if summary.stopped_early { " (stopped early)" } else { "" }
        );
        run_log.detach();
    }

    Ok(())
}
