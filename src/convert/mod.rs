//! Schema normalization: foreign dataset layout -> internal records
//!
//! Reads `<dataset_dir>/{train,valid,test}.jsonl` and produces a [`Dataset`]
//! without re-splitting. Conversion is all-or-nothing per dataset: any
//! missing file or malformed line aborts before anything is written.
//!
//! # Example
//!
//! ```rust,no_run
//! use molprop_data::convert::{convert_datasets, ConversionOptions};
//!
//! let report = convert_datasets(
//!     "data/UniMol",
//!     "data/files",
//!     &["bbbp", "esol"],
//!     &ConversionOptions::default(),
//! );
//! assert!(report.failed().is_empty());
//! ```

mod foreign;

pub use foreign::{foreign_partition_path, FOREIGN_EXT};

use std::collections::HashMap;
use std::path::Path;

use crate::dataset::{Dataset, DatasetMeta, EvalMetric, Record, Split, SplitName, TaskType};
use crate::features::Conformer;
use crate::storage;
use crate::{Error, Result};

/// Known benchmark datasets with their task type and default metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Dataset name
    pub name: &'static str,
    /// Task type
    pub task_type: TaskType,
    /// Evaluation metric
    pub eval_metric: EvalMetric,
}

const fn entry(name: &'static str, task_type: TaskType, eval_metric: EvalMetric) -> CatalogEntry {
    CatalogEntry {
        name,
        task_type,
        eval_metric,
    }
}

/// Benchmark dataset catalog
pub const CATALOG: &[CatalogEntry] = &[
    entry("bbbp", TaskType::Classification, EvalMetric::RocAuc),
    entry("bace", TaskType::Classification, EvalMetric::RocAuc),
    entry("clintox", TaskType::Classification, EvalMetric::RocAuc),
    entry("tox21", TaskType::Classification, EvalMetric::RocAuc),
    entry("toxcast", TaskType::Classification, EvalMetric::RocAuc),
    entry("sider", TaskType::Classification, EvalMetric::RocAuc),
    entry("hiv", TaskType::Classification, EvalMetric::RocAuc),
    entry("muv", TaskType::Classification, EvalMetric::RocAuc),
    entry("esol", TaskType::Regression, EvalMetric::Rmse),
    entry("freesolv", TaskType::Regression, EvalMetric::Rmse),
    entry("lipophilicity", TaskType::Regression, EvalMetric::Rmse),
    entry("qm7", TaskType::Regression, EvalMetric::Mae),
    entry("qm8", TaskType::Regression, EvalMetric::Mae),
    entry("qm9", TaskType::Regression, EvalMetric::Mae),
];

/// Look up a dataset in the catalog (case-insensitive).
#[must_use]
pub fn catalog_entry(name: &str) -> Option<&'static CatalogEntry> {
    CATALOG.iter().find(|e| e.name.eq_ignore_ascii_case(name))
}

/// Knobs for the schema normalizer. Unset fields fall back to the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionOptions {
    /// Override the task type
    pub task_type: Option<TaskType>,
    /// Class enumeration for classification datasets
    pub classes: Vec<i64>,
    /// Override the evaluation metric
    pub eval_metric: Option<EvalMetric>,
    /// Classification label value that marks a missing entry
    pub missing_sentinel: Option<f64>,
    /// Require classification labels to be members of `classes`
    pub coerce_classes: bool,
    /// Record that the source splits are random rather than scaffold splits
    pub random_split: bool,
}

impl Default for ConversionOptions {
    fn default() -> Self {
        Self {
            task_type: None,
            classes: vec![0, 1],
            eval_metric: None,
            missing_sentinel: Some(-1.0),
            coerce_classes: true,
            random_split: false,
        }
    }
}

/// Placeholder label stored where the mask is 0
pub const MISSING_LABEL: f64 = 0.0;

/// Converts foreign dataset directories into [`Dataset`]s.
#[derive(Debug, Clone, Default)]
pub struct SchemaNormalizer {
    options: ConversionOptions,
}

impl SchemaNormalizer {
    /// Create a normalizer with the given options.
    #[must_use]
    pub const fn new(options: ConversionOptions) -> Self {
        Self { options }
    }

    /// Options in effect.
    #[must_use]
    pub const fn options(&self) -> &ConversionOptions {
        &self.options
    }

    fn resolve_task(&self, name: &str) -> Result<(TaskType, EvalMetric)> {
        let catalog = catalog_entry(name);
        let task_type = self
            .options
            .task_type
            .or_else(|| catalog.map(|e| e.task_type))
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "dataset '{name}' is not in the catalog; specify its task type"
                ))
            })?;
        let eval_metric = self
            .options
            .eval_metric
            .or_else(|| catalog.filter(|e| e.task_type == task_type).map(|e| e.eval_metric))
            .unwrap_or_else(|| task_type.default_metric());
        Ok((task_type, eval_metric))
    }

    /// Turn one foreign target into labels and masks.
    fn encode_labels(
        &self,
        task_type: TaskType,
        values: &[Option<f64>],
    ) -> std::result::Result<(Vec<f64>, Vec<u8>), String> {
        let mut labels = Vec::with_capacity(values.len());
        let mut masks = Vec::with_capacity(values.len());

        for value in values {
            let present = match (*value, task_type) {
                (Some(v), TaskType::Classification) if Some(v) == self.options.missing_sentinel => {
                    None
                }
                (v, _) => v,
            };
            match present {
                None => {
                    labels.push(MISSING_LABEL);
                    masks.push(0);
                }
                Some(v) => {
                    labels.push(self.coerce(task_type, v)?);
                    masks.push(1);
                }
            }
        }
        Ok((labels, masks))
    }

    #[allow(clippy::cast_possible_truncation)]
    #[allow(clippy::cast_precision_loss)]
    fn coerce(&self, task_type: TaskType, value: f64) -> std::result::Result<f64, String> {
        if task_type == TaskType::Regression || !self.options.coerce_classes {
            return Ok(value);
        }
        let rounded = value.round();
        if (value - rounded).abs() > 1e-6 || !self.options.classes.contains(&(rounded as i64)) {
            return Err(format!(
                "label {value} is not one of the classes {:?}",
                self.options.classes
            ));
        }
        Ok(rounded)
    }

    /// Normalize the foreign dataset at `dataset_dir` into a [`Dataset`].
    ///
    /// # Errors
    ///
    /// - [`Error::Structural`] if the directory or a partition file is missing
    /// - [`Error::Malformed`] if a line cannot be parsed or its task count
    ///   disagrees with the rest of the dataset
    /// - [`Error::InvalidInput`] if the task type cannot be determined
    pub fn normalize<P: AsRef<Path>>(&self, dataset_dir: P, name: &str) -> Result<Dataset> {
        let dir = dataset_dir.as_ref();
        if !dir.is_dir() {
            return Err(Error::missing(dir, "foreign dataset directory not found"));
        }
        let (task_type, eval_metric) = self.resolve_task(name)?;

        // Every partition must exist before any is parsed.
        let paths = SplitName::ALL.map(|split| foreign_partition_path(dir, split));
        if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
            return Err(Error::missing(missing, "foreign partition file not found"));
        }

        let mut n_tasks: Option<usize> = None;
        let mut splits = Vec::with_capacity(3);

        for (split, path) in SplitName::ALL.into_iter().zip(&paths) {
            let mut records = Vec::new();
            for (line, foreign) in foreign::read_foreign(path)? {
                let malformed = |reason: String| Error::Malformed {
                    path: path.clone(),
                    line,
                    reason,
                };
                let target = foreign
                    .target
                    .as_ref()
                    .ok_or_else(|| malformed("record has no target".to_string()))?;
                let values = foreign::parse_target(target).map_err(malformed)?;

                let expected = *n_tasks.get_or_insert(values.len());
                if values.len() != expected {
                    return Err(malformed(format!(
                        "record has {} targets, dataset has {expected} tasks",
                        values.len()
                    )));
                }

                let (labels, masks) = self.encode_labels(task_type, &values).map_err(malformed)?;
                records.push(Record::with_masks(foreign.smi, labels, masks));
            }
            tracing::debug!(dataset = name, %split, records = records.len(), "normalized partition");
            splits.push(Split::new(split, records));
        }

        let n_tasks = n_tasks.ok_or_else(|| {
            Error::missing(dir, "dataset has no records; cannot infer the task count")
        })?;

        let mut builder = DatasetMeta::builder(task_type, n_tasks)
            .eval_metric(eval_metric)
            .random_split(self.options.random_split)
            .created_now();
        if task_type == TaskType::Classification {
            builder = builder.classes(self.options.classes.clone());
        }
        let meta = builder.build()?;

        let mut splits = splits.into_iter();
        let (Some(train), Some(valid), Some(test)) = (splits.next(), splits.next(), splits.next())
        else {
            return Err(Error::Other("expected three partitions".to_string()));
        };
        Dataset::new(name, meta, train, valid, test)
    }
}

/// Conformations supplied by a foreign partition, keyed by SMILES.
///
/// Records without atoms and coordinates, or whose atom and coordinate
/// counts disagree, are skipped.
///
/// # Errors
///
/// Returns [`Error::Structural`] if the partition file is missing and
/// [`Error::Malformed`] if a line cannot be parsed.
pub fn load_conformations<P: AsRef<Path>>(
    dataset_dir: P,
    split: SplitName,
) -> Result<HashMap<String, Conformer>> {
    let path = foreign_partition_path(dataset_dir.as_ref(), split);
    let mut conformers = HashMap::new();
    for (_, record) in foreign::read_foreign(&path)? {
        if let Some(conformer) = record.conformer() {
            conformers.entry(record.smi).or_insert(conformer);
        }
    }
    tracing::debug!(path = %path.display(), count = conformers.len(), "loaded source conformations");
    Ok(conformers)
}

/// Outcome of a multi-dataset conversion.
#[derive(Debug, Default)]
pub struct ConversionReport {
    converted: Vec<String>,
    failed: Vec<(String, Error)>,
}

impl ConversionReport {
    /// Datasets written successfully.
    #[must_use]
    pub fn converted(&self) -> &[String] {
        &self.converted
    }

    /// Datasets that failed, with their error.
    #[must_use]
    pub fn failed(&self) -> &[(String, Error)] {
        &self.failed
    }

    /// Whether every requested dataset converted.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Convert one dataset and materialize it under `output_root/<name>`.
///
/// # Errors
///
/// Returns the normalizer or materializer error. Nothing is written when
/// normalization fails, and a failed materialization keeps the previously
/// converted files.
pub fn convert_dataset(
    normalizer: &SchemaNormalizer,
    foreign_root: &Path,
    output_root: &Path,
    name: &str,
) -> Result<Dataset> {
    let dataset = normalizer.normalize(foreign_root.join(name), name)?;
    storage::materialize(&dataset, output_root.join(name))?;
    Ok(dataset)
}

/// Convert several datasets. A failing dataset is logged and recorded in the
/// report; the remaining datasets are still converted.
pub fn convert_datasets<P: AsRef<Path>, Q: AsRef<Path>>(
    foreign_root: P,
    output_root: Q,
    names: &[&str],
    options: &ConversionOptions,
) -> ConversionReport {
    let normalizer = SchemaNormalizer::new(options.clone());
    let mut report = ConversionReport::default();

    for &name in names {
        match convert_dataset(&normalizer, foreign_root.as_ref(), output_root.as_ref(), name) {
            Ok(dataset) => {
                tracing::info!(dataset = name, records = dataset.len(), "converted dataset");
                report.converted.push(name.to_string());
            }
            Err(e) => {
                tracing::error!(dataset = name, error = %e, "dataset conversion failed");
                report.failed.push((name.to_string(), e));
            }
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_partition(dir: &Path, split: SplitName, lines: &[&str]) {
        fs::write(foreign_partition_path(dir, split), lines.join("\n")).unwrap();
    }

    fn classification_dir(root: &Path) -> std::path::PathBuf {
        let dir = root.join("tox21");
        fs::create_dir_all(&dir).unwrap();
        write_partition(
            &dir,
            SplitName::Train,
            &[
                r#"{"smi": "CCO", "target": [1, 0]}"#,
                r#"{"smi": "CCN", "target": [1, -1]}"#,
                r#"{"smi": "CCC", "target": [0, null]}"#,
            ],
        );
        write_partition(&dir, SplitName::Valid, &[r#"{"smi": "CO", "target": [0, 1]}"#]);
        write_partition(&dir, SplitName::Test, &[]);
        dir
    }

    #[test]
    fn test_catalog_lookup() {
        assert_eq!(catalog_entry("ESOL").unwrap().task_type, TaskType::Regression);
        assert_eq!(catalog_entry("qm9").unwrap().eval_metric, EvalMetric::Mae);
        assert!(catalog_entry("unknown").is_none());
    }

    #[test]
    fn test_normalize_masks_missing_labels() {
        let root = tempfile::tempdir().unwrap();
        let dir = classification_dir(root.path());

        let dataset = SchemaNormalizer::default().normalize(&dir, "tox21").unwrap();
        let train = dataset.split(SplitName::Train).records();

        assert_eq!(dataset.meta().n_tasks(), 2);
        assert_eq!(train[1].labels, vec![1.0, MISSING_LABEL]);
        assert_eq!(train[1].masks, vec![1, 0]);
        assert_eq!(train[2].masks, vec![1, 0]);
        assert!(dataset.split(SplitName::Test).is_empty());
        assert_eq!(dataset.meta().classes(), Some(&[0, 1][..]));
    }

    #[test]
    fn test_normalize_regression_passes_values_through() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("esol");
        fs::create_dir_all(&dir).unwrap();
        write_partition(&dir, SplitName::Train, &[r#"{"smi": "CCO", "target": -1.0}"#]);
        write_partition(&dir, SplitName::Valid, &[r#"{"smi": "C", "target": [0.37]}"#]);
        write_partition(&dir, SplitName::Test, &[r#"{"smi": "O", "target": ["nan"]}"#]);

        let dataset = SchemaNormalizer::default().normalize(&dir, "esol").unwrap();
        // -1 is a real value for regression, not a sentinel
        assert_eq!(dataset.split(SplitName::Train).records()[0].labels, vec![-1.0]);
        assert_eq!(dataset.split(SplitName::Train).records()[0].masks, vec![1]);
        assert_eq!(dataset.split(SplitName::Test).records()[0].masks, vec![0]);
        assert!(dataset.meta().classes().is_none());
        assert_eq!(dataset.meta().eval_metric(), EvalMetric::Rmse);
    }

    #[test]
    fn test_missing_partition_names_path() {
        let root = tempfile::tempdir().unwrap();
        let dir = classification_dir(root.path());
        fs::remove_file(foreign_partition_path(&dir, SplitName::Valid)).unwrap();

        let err = SchemaNormalizer::default().normalize(&dir, "tox21").unwrap_err();
        assert!(matches!(err, Error::Structural { .. }));
        assert!(err.to_string().contains("valid.jsonl"));
    }

    #[test]
    fn test_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let err = SchemaNormalizer::default()
            .normalize(root.path().join("bbbp"), "bbbp")
            .unwrap_err();
        assert!(err.to_string().contains("bbbp"));
    }

    #[test]
    fn test_inconsistent_task_count_is_malformed() {
        let root = tempfile::tempdir().unwrap();
        let dir = classification_dir(root.path());
        write_partition(&dir, SplitName::Test, &[r#"{"smi": "C", "target": [1]}"#]);

        let err = SchemaNormalizer::default().normalize(&dir, "tox21").unwrap_err();
        assert!(matches!(err, Error::Malformed { line: 1, .. }));
    }

    #[test]
    fn test_class_coercion_rejects_non_members() {
        let root = tempfile::tempdir().unwrap();
        let dir = classification_dir(root.path());
        write_partition(&dir, SplitName::Test, &[r#"{"smi": "C", "target": [2, 0]}"#]);

        let err = SchemaNormalizer::default().normalize(&dir, "tox21").unwrap_err();
        assert!(err.to_string().contains("not one of the classes"));

        let lenient = SchemaNormalizer::new(ConversionOptions {
            coerce_classes: false,
            ..ConversionOptions::default()
        });
        let dataset = lenient.normalize(&dir, "tox21").unwrap();
        assert_eq!(dataset.split(SplitName::Test).records()[0].labels, vec![2.0, 0.0]);
    }

    #[test]
    fn test_unknown_dataset_needs_task_type() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("custom");
        fs::create_dir_all(&dir).unwrap();
        for split in SplitName::ALL {
            write_partition(&dir, split, &[r#"{"smi": "C", "target": [0.1]}"#]);
        }

        assert!(SchemaNormalizer::default().normalize(&dir, "custom").is_err());

        let normalizer = SchemaNormalizer::new(ConversionOptions {
            task_type: Some(TaskType::Regression),
            ..ConversionOptions::default()
        });
        assert_eq!(normalizer.normalize(&dir, "custom").unwrap().len(), 3);
    }

    #[test]
    fn test_convert_datasets_continues_after_failure() {
        let input = tempfile::tempdir().unwrap();
        let output = tempfile::tempdir().unwrap();
        classification_dir(input.path());

        let report = convert_datasets(
            input.path(),
            output.path(),
            &["bbbp", "tox21"],
            &ConversionOptions::default(),
        );

        assert_eq!(report.converted(), ["tox21".to_string()]);
        assert_eq!(report.failed().len(), 1);
        assert_eq!(report.failed()[0].0, "bbbp");
        assert!(!output.path().join("bbbp").exists());
        assert!(output.path().join("tox21").join(storage::META_FILE).is_file());
    }

    #[test]
    fn test_load_conformations() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("qm9");
        fs::create_dir_all(&dir).unwrap();
        write_partition(
            &dir,
            SplitName::Train,
            &[
                r#"{"smi": "CO", "target": [1.0], "atoms": ["C", "O"], "coordinates": [[[0, 0, 0], [1.43, 0, 0]]]}"#,
                r#"{"smi": "C", "target": [2.0]}"#,
            ],
        );

        let conformers = load_conformations(&dir, SplitName::Train).unwrap();
        assert_eq!(conformers.len(), 1);
        assert_eq!(conformers["CO"].atoms().len(), 2);
    }
}
