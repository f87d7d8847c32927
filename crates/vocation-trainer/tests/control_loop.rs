use std::fs;
use std::path::Path;

use anyhow::anyhow;
use tempfile::TempDir;
use vocation_core::{
    DataReader, Example, Matrix, PadMode, PaddedBatch, Partition, RunConfig, Scale,
    ScheduleConfig, VocationError,
};
use vocation_trainer::{
    EvalOutput, ModelBinding, RunDir, StepOutput, TrainerOptions, evaluate_in_batches,
    read_scalars, train,
};

/// Binding whose validation metrics follow a script.
struct Scripted {
    validation_script: Vec<(f64, f64)>,
    validations: usize,
    lr_history: Vec<f64>,
    first_train_ids: Vec<String>,
    train_calls: usize,
    fail_on_train_call: Option<usize>,
    initial_lr: f64,
    lr: f64,
}

impl Scripted {
    fn constant(loss: f64, accuracy: f64) -> Self {
        Self::with_script(vec![(loss, accuracy)])
    }

    fn with_script(validation_script: Vec<(f64, f64)>) -> Self {
        Self {
            validation_script,
            validations: 0,
            lr_history: Vec::new(),
            first_train_ids: Vec::new(),
            train_calls: 0,
            fail_on_train_call: None,
            initial_lr: 1.0,
            lr: 1.0,
        }
    }
}

impl ModelBinding for Scripted {
    fn train_step(&mut self, batch: &PaddedBatch) -> anyhow::Result<StepOutput> {
        if self.fail_on_train_call == Some(self.train_calls) {
            return Err(anyhow!("device lost"));
        }
        if self.train_calls == 0 {
            self.first_train_ids = batch.ids.clone();
            self.first_train_ids.sort();
        }
        self.train_calls += 1;
        self.lr_history.push(self.lr);
        Ok(StepOutput {
            loss: 1.0,
            accuracy: 0.5,
            summaries: vec![("batch".to_string(), batch.len() as f64)],
        })
    }

    fn evaluate(&mut self, batch: &PaddedBatch) -> anyhow::Result<EvalOutput> {
        let (loss, accuracy) = if batch.ids[0].starts_with('v') {
            let i = self.validations.min(self.validation_script.len() - 1);
            self.validations += 1;
            self.validation_script[i]
        } else {
            (0.25, 1.0)
        };
        Ok(EvalOutput {
            loss,
            accuracy,
            true_labels: batch.labels.clone(),
            predicted_labels: batch.labels.clone(),
        })
    }

    fn set_learning_rate(&mut self, lr: f64) -> anyhow::Result<()> {
        self.lr = lr;
        Ok(())
    }

    fn learning_rate(&self) -> f64 {
        self.lr
    }

    fn initial_learning_rate(&self) -> f64 {
        self.initial_lr
    }

    fn save_parameters(&self, path: &Path) -> anyhow::Result<()> {
        fs::write(path, b"params")?;
        Ok(())
    }
}

fn examples(n: usize, prefix: &str) -> Vec<Example> {
    (0..n)
        .map(|i| {
            let label = if i % 2 == 0 { "judge" } else { "poet" };
            Example::new(
                format!("{prefix}{i}"),
                Matrix::from_flat(i % 3 + 1, 2, vec![1.0; (i % 3 + 1) * 2]).unwrap(),
                label,
            )
        })
        .collect()
}

/// 10 training, 2 validation and 3 test examples.
fn reader() -> DataReader {
    DataReader::from_partitions(examples(10, "t"), examples(2, "v"), examples(3, "x"), 0).unwrap()
}

fn run_config(num_steps: usize, batch_size: usize, every: usize, tolerance: usize) -> RunConfig {
    RunConfig {
        scale: Scale::Basic,
        num_steps,
        batch_size,
        log_validation_every: every,
        fail_to_improve_tolerance: tolerance,
    }
}

#[test]
fn stops_after_exactly_tolerance_failures() {
    let tmp = TempDir::new().unwrap();
    let mut reader = reader();
    let mut model = Scripted::constant(1.0, 0.5);

    let summary = train(
        &mut reader,
        &mut model,
        run_config(50, 2, 1, 3),
        ScheduleConfig::default(),
        TrainerOptions::default(),
        tmp.path(),
    )
    .unwrap();

    // Step 0 sets the bests; steps 1, 2 and 3 fail to improve.
    assert!(summary.stopped_early);
    assert_eq!(summary.validations, 4);
    assert_eq!(summary.steps_run, 4);
    assert_eq!(model.train_calls, 4);
    assert_eq!(summary.examples_seen, 8);
    assert_eq!(summary.best_loss, 1.0);
    assert_eq!(summary.best_accuracy, 0.5);
}

#[test]
fn stop_counts_validations_not_steps() {
    let tmp = TempDir::new().unwrap();
    let mut reader = reader();
    let mut model = Scripted::constant(1.0, 0.5);

    let summary = train(
        &mut reader,
        &mut model,
        run_config(100, 2, 5, 2),
        ScheduleConfig::default(),
        TrainerOptions::default(),
        tmp.path(),
    )
    .unwrap();

    // Validations at steps 0, 5 and 10.
    assert!(summary.stopped_early);
    assert_eq!(summary.validations, 3);
    assert_eq!(summary.steps_run, 11);
}

#[test]
fn improving_in_either_metric_keeps_training() {
    let tmp = TempDir::new().unwrap();
    let mut reader = reader();
    let mut model = Scripted::with_script(vec![
        (1.0, 0.5),
        (0.9, 0.4),
        (1.1, 0.6),
        (0.8, 0.6),
        (0.7, 0.7),
    ]);

    let summary = train(
        &mut reader,
        &mut model,
        run_config(5, 2, 1, 1),
        ScheduleConfig::default(),
        TrainerOptions::default(),
        tmp.path(),
    )
    .unwrap();

    assert!(!summary.stopped_early);
    assert_eq!(summary.steps_run, 5);
    assert_eq!(summary.best_loss, 0.7);
    assert_eq!(summary.best_accuracy, 0.7);
}

#[test]
fn learning_rate_decays_to_floor() {
    let tmp = TempDir::new().unwrap();
    let mut reader = reader();
    let mut model = Scripted::constant(1.0, 0.5);
    let schedule = ScheduleConfig::default().with_lower_bound(0.05);

    let summary = train(
        &mut reader,
        &mut model,
        run_config(80, 5, 1000, 1),
        schedule,
        TrainerOptions::default(),
        tmp.path(),
    )
    .unwrap();

    assert_eq!(model.lr_history.len(), 80);
    assert!((model.lr_history[0] - 0.9f64.powf(0.5)).abs() < 1e-12);
    assert!(model.lr_history.iter().all(|&lr| lr >= 0.05));
    assert!(model.lr_history.windows(2).all(|w| w[1] <= w[0]));
    assert_eq!(*model.lr_history.last().unwrap(), 0.05);
    assert_eq!(summary.final_learning_rate, 0.05);
}

#[test]
fn failed_validation_steepens_decay() {
    let tmp = TempDir::new().unwrap();
    let mut reader = reader();
    let mut model = Scripted::constant(1.0, 0.5);

    train(
        &mut reader,
        &mut model,
        run_config(3, 2, 1, 10),
        ScheduleConfig::default(),
        TrainerOptions::default(),
        tmp.path(),
    )
    .unwrap();

    // Step 1 is set before its failed validation; step 2 sees the penalty.
    assert!((model.lr_history[1] - 0.9f64.powf(0.4)).abs() < 1e-12);
    assert!((model.lr_history[2] - (0.9f64 * 0.95).powf(0.6)).abs() < 1e-12);
}

#[test]
fn binding_error_aborts_with_step_context() {
    let tmp = TempDir::new().unwrap();
    let mut reader = reader();
    let mut model = Scripted::constant(1.0, 0.5);
    model.fail_on_train_call = Some(2);

    let err = train(
        &mut reader,
        &mut model,
        run_config(10, 2, 1, 5),
        ScheduleConfig::default(),
        TrainerOptions::default(),
        tmp.path(),
    )
    .unwrap_err();

    let message = format!("{err:#}");
    assert!(message.contains("training step 2"), "{message}");
    assert!(message.contains("device lost"), "{message}");
    assert_eq!(model.train_calls, 2);
    assert!(!tmp.path().join("saved/save.ckpt.safetensors").exists());
}

#[test]
fn oversized_batch_rejected_before_training() {
    let tmp = TempDir::new().unwrap();
    let mut reader = reader();
    let mut model = Scripted::constant(1.0, 0.5);

    let err = train(
        &mut reader,
        &mut model,
        run_config(10, 11, 1, 1),
        ScheduleConfig::default(),
        TrainerOptions::default(),
        tmp.path(),
    )
    .unwrap_err();

    let core = err.downcast_ref::<VocationError>().unwrap();
    assert!(core.is_configuration());
    assert_eq!(model.train_calls, 0);
}

#[test]
fn zero_validation_interval_is_configuration_error() {
    let tmp = TempDir::new().unwrap();
    let mut reader = reader();
    let mut model = Scripted::constant(1.0, 0.5);

    let err = train(
        &mut reader,
        &mut model,
        run_config(10, 2, 0, 1),
        ScheduleConfig::default(),
        TrainerOptions::default(),
        tmp.path(),
    )
    .unwrap_err();

    let core = err.downcast_ref::<VocationError>().unwrap();
    assert!(core.is_configuration());
    assert_eq!(model.train_calls, 0);
}

#[test]
fn sequential_networks_share_one_reader() {
    let tmp = TempDir::new().unwrap();
    let mut reader = reader();
    let run = run_config(3, 4, 1, 10);

    let mut dirs = Vec::new();
    let mut models = Vec::new();
    for _ in 0..2 {
        let run_dir = RunDir::create(tmp.path(), "basic-basic").unwrap();
        let mut model = Scripted::constant(1.0, 0.5);
        let summary = train(
            &mut reader,
            &mut model,
            run,
            ScheduleConfig::default(),
            TrainerOptions::default(),
            run_dir.path(),
        )
        .unwrap();
        assert_eq!(summary.steps_run, 3);
        assert_eq!(summary.examples_seen, 12);
        // 12 examples drawn from a partition of 10.
        assert_eq!(reader.position(), 2);
        dirs.push(run_dir);
        models.push(model);
    }

    let expected: Vec<String> = (0..4).map(|i| format!("t{i}")).collect();
    for model in &models {
        assert_eq!(model.first_train_ids, expected);
        assert_eq!(model.train_calls, 3);
    }

    assert_ne!(dirs[0].path(), dirs[1].path());
    for dir in &dirs {
        assert!(dir.path().join("saved/save.ckpt.safetensors").is_file());
        let train_log = read_scalars(&dir.path().join("train.jsonl")).unwrap();
        assert_eq!(train_log.len(), 3 * 4);
    }
}

#[test]
fn empty_validation_partition_rejected() {
    let tmp = TempDir::new().unwrap();
    let mut reader =
        DataReader::from_partitions(examples(10, "t"), vec![], examples(3, "x"), 0).unwrap();
    let mut model = Scripted::constant(1.0, 0.5);

    let err = train(
        &mut reader,
        &mut model,
        run_config(10, 2, 1, 1),
        ScheduleConfig::default(),
        TrainerOptions::default(),
        tmp.path(),
    )
    .unwrap_err();
    assert!(err.downcast_ref::<VocationError>().unwrap().is_data_integrity());
}

#[test]
fn writes_checkpoints_and_metrics() {
    let tmp = TempDir::new().unwrap();
    let mut reader = reader();
    let mut model = Scripted::constant(1.0, 0.5);

    let summary = train(
        &mut reader,
        &mut model,
        run_config(5, 2, 2, 10),
        ScheduleConfig::default(),
        TrainerOptions::default(),
        tmp.path(),
    )
    .unwrap();
    assert_eq!(summary.validations, 3);

    let saved = tmp.path().join("saved");
    for name in [
        "save.ckpt-2.safetensors",
        "save.ckpt-6.safetensors",
        "save.ckpt-10.safetensors",
        "save.ckpt.safetensors",
        "checkpoint.json",
    ] {
        assert!(saved.join(name).is_file(), "missing {name}");
    }

    let train_log = read_scalars(&tmp.path().join("train.jsonl")).unwrap();
    assert_eq!(train_log.len(), 5 * 4);
    assert_eq!(train_log[0].index, 0);
    assert_eq!(train_log[0].tag, "loss");
    assert!(train_log.iter().any(|r| r.index == 6 && r.tag == "batch" && r.value == 2.0));

    let valid_log = read_scalars(&tmp.path().join("valid.jsonl")).unwrap();
    let indices: Vec<usize> = valid_log.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 0, 4, 4, 8, 8]);

    let test_log = read_scalars(&tmp.path().join("test.jsonl")).unwrap();
    assert_eq!(test_log.len(), 2);
    assert_eq!(test_log[1].value, 1.0);

    assert_eq!(summary.test.count, 3);
    assert_eq!(summary.test.per_class.len(), 2);
    assert_eq!(summary.test.per_class[0].class, "judge");
    assert_eq!(summary.test.per_class[0].total, 2);
}

#[test]
fn rerun_in_same_directory_clears_checkpoints() {
    let tmp = TempDir::new().unwrap();
    let mut reader = reader();

    let mut first = Scripted::constant(1.0, 0.5);
    train(
        &mut reader,
        &mut first,
        run_config(5, 2, 2, 10),
        ScheduleConfig::default(),
        TrainerOptions::default(),
        tmp.path(),
    )
    .unwrap();

    let mut second = Scripted::constant(1.0, 0.5);
    train(
        &mut reader,
        &mut second,
        run_config(1, 2, 2, 10),
        ScheduleConfig::default(),
        TrainerOptions::default(),
        tmp.path(),
    )
    .unwrap();

    assert!(!tmp.path().join("saved/save.ckpt-6.safetensors").exists());
    assert!(tmp.path().join("saved/save.ckpt-2.safetensors").exists());
}

#[test]
fn reader_rewound_at_start_of_run() {
    let tmp = TempDir::new().unwrap();
    let mut reader = reader();
    reader.next_batch(3, PadMode::Local).unwrap();
    assert_eq!(reader.position(), 3);

    let mut model = Scripted::constant(1.0, 0.5);
    train(
        &mut reader,
        &mut model,
        run_config(2, 4, 10, 1),
        ScheduleConfig::default(),
        TrainerOptions::default(),
        tmp.path(),
    )
    .unwrap();
    assert_eq!(reader.position(), 8);
}

#[test]
fn evaluation_weighted_by_batch_size() {
    let reader =
        DataReader::from_partitions(examples(4, "t"), examples(3, "v"), examples(1, "x"), 0)
            .unwrap();

    struct SizeLoss;
    impl ModelBinding for SizeLoss {
        fn train_step(&mut self, _: &PaddedBatch) -> anyhow::Result<StepOutput> {
            Ok(StepOutput::default())
        }
        fn evaluate(&mut self, batch: &PaddedBatch) -> anyhow::Result<EvalOutput> {
            Ok(EvalOutput {
                loss: batch.len() as f64,
                accuracy: if batch.len() == 1 { 1.0 } else { 0.0 },
                true_labels: batch.labels.clone(),
                predicted_labels: batch.labels.clone(),
            })
        }
        fn set_learning_rate(&mut self, _: f64) -> anyhow::Result<()> {
            Ok(())
        }
        fn learning_rate(&self) -> f64 {
            0.0
        }
        fn initial_learning_rate(&self) -> f64 {
            0.0
        }
        fn save_parameters(&self, _: &Path) -> anyhow::Result<()> {
            Ok(())
        }
    }

    let eval =
        evaluate_in_batches(&mut SizeLoss, &reader, Partition::Valid, 2, PadMode::Local).unwrap();
    assert_eq!(eval.count, 3);
    assert!((eval.loss - 5.0 / 3.0).abs() < 1e-12);
    assert!((eval.accuracy - 1.0 / 3.0).abs() < 1e-12);
    assert_eq!(eval.ids, vec!["v0", "v1", "v2"]);
}
