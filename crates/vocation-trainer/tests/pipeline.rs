use candle_core::Device;
use tempfile::TempDir;
use vocation_core::{
    DataReader, Matrix, NetworkConfig, PeopleIndex, RunConfig, Scale, ScheduleConfig,
    SplitFractions, SqliteStore, load_dataset,
};
use vocation_trainer::{RnnClassifier, RunDir, TrainerOptions, read_scalars, train};

/// 40 people in two occupations with a feature that separates them.
fn store_and_index() -> (SqliteStore, PeopleIndex) {
    let store = SqliteStore::in_memory().unwrap();
    let mut pairs = Vec::new();
    for i in 0..40 {
        let (label, value) = if i % 2 == 0 { ("politician", 1.0) } else { ("scientist", -1.0) };
        let rows = 3 + i % 5;
        let matrix = Matrix::from_flat(rows, 4, vec![value; rows * 4]).unwrap();
        let id = format!("person_{i:02}");
        store.insert(&id, &matrix, label).unwrap();
        pairs.push((id, label.to_string()));
    }
    pairs.push(("nobody".to_string(), "politician".to_string()));
    (store, PeopleIndex::from_pairs(pairs))
}

#[test]
fn trains_reference_model_end_to_end() {
    let tmp = TempDir::new().unwrap();
    let (store, index) = store_and_index();

    let dataset = load_dataset(&store, &index).unwrap();
    assert_eq!(dataset.missing, 1);
    assert_eq!(dataset.max_len, 7);

    let mut reader = DataReader::new(dataset, SplitFractions::default(), 3).unwrap();
    assert_eq!(reader.train_size(), 28);
    assert_eq!(reader.classes(), &["politician", "scientist"]);

    let network = NetworkConfig::preset(Scale::Basic);
    let mut model =
        RnnClassifier::new(&network, reader.feature_dim(), reader.num_classes(), Device::Cpu)
            .unwrap();
    let run = RunConfig::preset(Scale::Basic);
    let run_dir = RunDir::create(tmp.path(), "basic-basic").unwrap();

    let summary = train(
        &mut reader,
        &mut model,
        run,
        ScheduleConfig::default(),
        TrainerOptions::default(),
        run_dir.path(),
    )
    .unwrap();

    assert!(summary.steps_run >= 1 && summary.steps_run <= run.num_steps);
    assert_eq!(summary.test.count, 6);
    assert!(summary.test.loss.is_finite());
    assert!(run_dir.path().join("saved/save.ckpt.safetensors").is_file());
    assert!(run_dir.path().join("saved/save.ckpt-2.safetensors").is_file());

    let train_log = read_scalars(&run_dir.path().join("train.jsonl")).unwrap();
    assert!(train_log.iter().all(|r| r.value.is_finite()));
}
