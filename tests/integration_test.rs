//! End-to-end pipeline tests
//!
//! Covers the complete flow:
//! 1. Normalize a foreign dataset directory
//! 2. Materialize Parquet partitions and meta.json
//! 3. Derive, persist and reload backbone features

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use molprop_data::cache::{CacheOptions, FeatureCache, FsArtifactStore};
use molprop_data::config::PipelineConfig;
use molprop_data::convert::{
    convert_dataset, convert_datasets, foreign_partition_path, ConversionOptions, SchemaNormalizer,
};
use molprop_data::dataset::{Record, SplitName, TaskType};
use molprop_data::features::{Backbone, DerivationError, Feature, FeatureEntry, FeatureExtractor};
use molprop_data::pipeline::featurize;
use molprop_data::storage::{load_dataset, load_meta, partition_path};
use molprop_data::Error;

fn write_foreign(root: &Path, name: &str, train: &[&str], valid: &[&str], test: &[&str]) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    for (split, lines) in SplitName::ALL.into_iter().zip([train, valid, test]) {
        fs::write(foreign_partition_path(&dir, split), lines.join("\n")).unwrap();
    }
    dir
}

/// Two-task classification set; record 2 has a sentinel in task 2 and
/// the test partition is empty.
fn foreign_classification(root: &Path) {
    write_foreign(
        root,
        "tox21",
        &[
            r#"{"smi": "CCO", "target": [0, 1]}"#,
            r#"{"smi": "c1ccccc1O", "target": [1, -1]}"#,
            r#"{"smi": "CC(=O)Oc1ccccc1C(=O)O", "target": [0, 0]}"#,
        ],
        &[r#"{"smi": "CCN", "target": [1, null]}"#],
        &[],
    );
}

fn foreign_regression(root: &Path) {
    write_foreign(
        root,
        "esol",
        &[
            r#"{"smi": "CCO", "target": 0.77}"#,
            r#"{"smi": "C1CC(", "target": -1.5}"#,
            r#"{"smi": "c1ccncc1", "target": 0.76}"#,
            r#"{"smi": "ClC(Cl)Cl", "target": -1.17}"#,
        ],
        &[r#"{"smi": "CCCCCC", "target": -3.84}"#],
        &[r#"{"smi": "OC1CCCCC1", "target": -0.44}"#],
    );
}

struct CountingExtractor {
    calls: AtomicUsize,
}

impl FeatureExtractor for CountingExtractor {
    fn backbone_id(&self) -> &str {
        "counting"
    }

    fn extract(&self, record: &Record) -> Result<Feature, DerivationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Backbone::DnnRdkit.extractor().extract(record)
    }
}

#[test]
fn test_convert_then_reload_round_trip() {
    let foreign = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    foreign_classification(foreign.path());

    let normalizer = SchemaNormalizer::new(ConversionOptions::default());
    let converted = convert_dataset(&normalizer, foreign.path(), out.path(), "tox21").unwrap();

    let dataset_dir = out.path().join("tox21");
    for split in SplitName::ALL {
        assert!(partition_path(&dataset_dir, split).is_file());
    }
    let reloaded = load_dataset(&dataset_dir).unwrap();
    assert_eq!(reloaded, converted);
}

#[test]
fn test_sentinel_becomes_masked_placeholder() {
    let foreign = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    foreign_classification(foreign.path());

    let report = convert_datasets(foreign.path(), out.path(), &["tox21"], &ConversionOptions::default());
    assert!(report.is_success());

    let dataset = load_dataset(out.path().join("tox21")).unwrap();
    let train = dataset.split(SplitName::Train).records();
    assert_eq!(train.len(), 3);
    assert_eq!(train[1].labels, vec![1.0, 0.0]);
    assert_eq!(train[1].masks, vec![1, 0]);

    let valid = dataset.split(SplitName::Valid).records();
    assert_eq!(valid[0].masks, vec![1, 0]);

    let meta = load_meta(out.path().join("tox21")).unwrap();
    assert_eq!(meta.task_type(), TaskType::Classification);
    assert_eq!(meta.n_tasks(), 2);
    assert_eq!(meta.classes(), Some(&[0, 1][..]));
}

#[test]
fn test_every_record_matches_task_count() {
    let foreign = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    foreign_classification(foreign.path());
    foreign_regression(foreign.path());

    let report = convert_datasets(
        foreign.path(),
        out.path(),
        &["tox21", "esol"],
        &ConversionOptions::default(),
    );
    assert_eq!(report.converted(), ["tox21", "esol"]);

    for name in ["tox21", "esol"] {
        let dataset = load_dataset(out.path().join(name)).unwrap();
        let n_tasks = dataset.meta().n_tasks();
        for split in dataset.splits() {
            for record in split.records() {
                assert_eq!(record.labels.len(), n_tasks);
                assert_eq!(record.masks.len(), n_tasks);
            }
        }
    }
}

#[test]
fn test_missing_partition_writes_nothing() {
    let foreign = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    foreign_regression(foreign.path());
    fs::remove_file(foreign_partition_path(&foreign.path().join("esol"), SplitName::Valid)).unwrap();

    let report = convert_datasets(foreign.path(), out.path(), &["esol"], &ConversionOptions::default());
    assert!(!report.is_success());
    assert!(matches!(report.failed()[0].1, Error::Structural { .. }));
    assert!(!out.path().join("esol").exists());
}

#[test]
fn test_empty_split_yields_empty_partition_and_artifact() {
    let foreign = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    foreign_classification(foreign.path());
    convert_datasets(foreign.path(), out.path(), &["tox21"], &ConversionOptions::default());

    let dataset = load_dataset(out.path().join("tox21")).unwrap();
    assert!(dataset.split(SplitName::Test).is_empty());

    let report = featurize(&PipelineConfig::new(out.path(), "tox21", "GIN")).unwrap();
    let test = report.artifact(SplitName::Test).unwrap();
    assert!(test.is_empty());
    assert!(out.path().join("tox21/processed/gin/test.json").is_file());
}

#[test]
fn test_featurize_reports_partial_failure() {
    let foreign = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    foreign_regression(foreign.path());
    convert_datasets(foreign.path(), out.path(), &["esol"], &ConversionOptions::default());

    let mut config = PipelineConfig::new(out.path(), "esol", "DNN");
    config.feature_type = Some("morgan".to_string());
    let report = featurize(&config).unwrap();

    let train = report.artifact(SplitName::Train).unwrap();
    assert_eq!(train.len(), 4);
    assert_eq!(train.valid_count(), 3);
    assert_eq!(train.invalid_indices(), vec![1]);
    assert!(matches!(train.entries()[1], FeatureEntry::Invalid { .. }));
    assert_eq!(report.invalid_count(), 1);
}

#[test]
fn test_second_featurization_reads_cache() {
    let foreign = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    foreign_regression(foreign.path());
    convert_datasets(foreign.path(), out.path(), &["esol"], &ConversionOptions::default());
    let dataset_dir = out.path().join("esol");
    let dataset = load_dataset(&dataset_dir).unwrap();
    let split = dataset.split(SplitName::Train);

    let extractor = CountingExtractor {
        calls: AtomicUsize::new(0),
    };
    let cache = FeatureCache::new(FsArtifactStore::new(&dataset_dir), CacheOptions::default());
    let first = cache.load_or_derive("esol", split, &extractor).unwrap();
    assert_eq!(extractor.calls.load(Ordering::SeqCst), split.len());

    // A fresh cache over the same directory, as in a later process
    let cache = FeatureCache::new(FsArtifactStore::new(&dataset_dir), CacheOptions::default());
    let second = cache.load_or_derive("esol", split, &extractor).unwrap();
    assert_eq!(extractor.calls.load(Ordering::SeqCst), split.len());
    assert_eq!(first, second);
}

#[test]
fn test_recomputed_artifacts_are_byte_identical() {
    let foreign = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    foreign_regression(foreign.path());
    convert_datasets(foreign.path(), out.path(), &["esol"], &ConversionOptions::default());

    let mut config = PipelineConfig::new(out.path(), "esol", "UniMol");
    let artifact = out.path().join("esol/processed/unimol/train.json");

    featurize(&config).unwrap();
    let first = fs::read(&artifact).unwrap();

    config.ignore_preprocessed_dataset = true;
    config.num_preprocess_workers = 3;
    featurize(&config).unwrap();
    assert_eq!(fs::read(&artifact).unwrap(), first);
}

#[test]
fn test_stale_artifact_is_reported() {
    let foreign = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    foreign_regression(foreign.path());
    convert_datasets(foreign.path(), out.path(), &["esol"], &ConversionOptions::default());

    let config = PipelineConfig::new(out.path(), "esol", "ChemBERTa");
    featurize(&config).unwrap();

    // Re-convert from changed source data under the same name
    write_foreign(
        foreign.path(),
        "esol",
        &[r#"{"smi": "CCCl", "target": 0.1}"#],
        &[r#"{"smi": "CCCCCC", "target": -3.84}"#],
        &[r#"{"smi": "OC1CCCCC1", "target": -0.44}"#],
    );
    convert_datasets(foreign.path(), out.path(), &["esol"], &ConversionOptions::default());

    let err = featurize(&config).unwrap_err();
    assert!(matches!(err, Error::StaleCache { .. }));

    let mut forced = config;
    forced.ignore_preprocessed_dataset = true;
    assert_eq!(featurize(&forced).unwrap().artifact(SplitName::Train).unwrap().len(), 1);
}

#[test]
fn test_unimol_reuses_source_conformations() {
    let foreign = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    write_foreign(
        foreign.path(),
        "freesolv",
        &[r#"{"smi": "O", "target": -6.3, "atoms": ["O", "H", "H"], "coordinates": [[[0.0, 0.0, 0.1], [0.9, 0.0, 0.0], [-0.2, 0.9, 0.0]]]}"#],
        &[r#"{"smi": "CO", "target": -5.1}"#],
        &[r#"{"smi": "CCO", "target": -5.0}"#],
    );
    convert_datasets(foreign.path(), out.path(), &["freesolv"], &ConversionOptions::default());

    let mut config = PipelineConfig::new(out.path(), "freesolv", "UniMol");
    config.conformation_source = Some(foreign.path().join("freesolv"));
    config.disable_dataset_saving = true;
    let report = featurize(&config).unwrap();

    let train = report.artifact(SplitName::Train).unwrap();
    let Some(Feature::Conformation(conformer)) = train.entries()[0].feature() else {
        panic!("expected a conformation");
    };
    assert_eq!(conformer.atoms(), ["O"]);
    assert_eq!(conformer.coordinates(), [[0.0, 0.0, 0.1]]);
    assert!(!out.path().join("freesolv/processed").exists());
}
