//! Split materialization (Arrow/Parquet + JSON descriptor)
//!
//! **Write pattern**: whole-dataset overwrite.
//! - Every call writes exactly `train.parquet`, `valid.parquet`,
//!   `test.parquet` and `meta.json`
//! - Existing files at those paths are replaced, never merged
//! - All four files are staged as `*.partial` first; a failed write leaves
//!   the previous files in place
//! - Record order inside a partition is the order handed in
//!
//! The same layout is the contract for customized datasets: any directory
//! holding the three partition files plus `meta.json` can be loaded with
//! [`load_dataset`].

mod partition;

pub use partition::{
    batch_to_records, partition_schema, read_partition, records_to_batch, write_partition,
    PARTITION_EXT,
};

use std::fs;
use std::path::{Path, PathBuf};

use crate::dataset::{Dataset, DatasetMeta, SplitName};
use crate::{Error, Result};

/// File name of the metadata descriptor
pub const META_FILE: &str = "meta.json";

/// Path of a partition file inside a dataset directory.
#[must_use]
pub fn partition_path(dataset_dir: &Path, split: SplitName) -> PathBuf {
    dataset_dir.join(format!("{}.{PARTITION_EXT}", split.as_str()))
}

/// Write a dataset's three partitions and its descriptor to `out_dir`.
///
/// Creates `out_dir` (and parents) if absent. Files are staged next to
/// their targets and renamed into place once all four are written; other
/// content of `out_dir`, such as `processed/`, is left alone.
///
/// # Example
///
/// ```rust,no_run
/// # use molprop_data::dataset::{Dataset, DatasetMeta, Split, SplitName, TaskType};
/// # fn main() -> molprop_data::Result<()> {
/// let meta = DatasetMeta::builder(TaskType::Regression, 1).build()?;
/// let dataset = Dataset::new(
///     "esol",
///     meta,
///     Split::empty(SplitName::Train),
///     Split::empty(SplitName::Valid),
///     Split::empty(SplitName::Test),
/// )?;
/// molprop_data::storage::materialize(&dataset, "data/files/esol")?;
/// # Ok(())
/// # }
/// ```
///
/// # Errors
///
/// Returns error if the directory cannot be created or a file cannot be
/// written.
pub fn materialize<P: AsRef<Path>>(dataset: &Dataset, out_dir: P) -> Result<()> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)?;

    let mut targets: Vec<PathBuf> = dataset
        .splits()
        .iter()
        .map(|split| partition_path(out_dir, split.name()))
        .collect();
    targets.push(out_dir.join(META_FILE));
    let staged: Vec<PathBuf> = targets.iter().map(|p| staging_path(p)).collect();

    if let Err(e) = stage(dataset, &staged) {
        for path in &staged {
            let _ = fs::remove_file(path);
        }
        return Err(e);
    }
    for (from, to) in staged.iter().zip(&targets) {
        fs::rename(from, to).map_err(|e| {
            Error::StorageError(format!("Failed to move {} into place: {e}", to.display()))
        })?;
    }

    tracing::info!(
        dataset = dataset.name(),
        dir = %out_dir.display(),
        train = dataset.split(SplitName::Train).len(),
        valid = dataset.split(SplitName::Valid).len(),
        test = dataset.split(SplitName::Test).len(),
        "materialized dataset"
    );
    Ok(())
}

fn staging_path(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_owned();
    name.push(".partial");
    PathBuf::from(name)
}

/// Write every partition and the descriptor to the staged paths, in
/// `dataset.splits()` order followed by `meta.json`.
fn stage(dataset: &Dataset, staged: &[PathBuf]) -> Result<()> {
    for (split, path) in dataset.splits().iter().zip(staged) {
        write_partition(path, split)?;
    }
    if let Some(meta_path) = staged.last() {
        fs::write(meta_path, dataset.meta().to_json()?)?;
    }
    Ok(())
}

/// Read a dataset descriptor from a dataset directory.
///
/// # Errors
///
/// Returns [`Error::Structural`] if `meta.json` is absent, or a parse error.
pub fn load_meta<P: AsRef<Path>>(dataset_dir: P) -> Result<DatasetMeta> {
    let path = dataset_dir.as_ref().join(META_FILE);
    if !path.is_file() {
        return Err(Error::missing(&path, "dataset metadata file not found"));
    }
    DatasetMeta::from_json(&fs::read_to_string(&path)?)
}

/// Load a materialized (or customized) dataset directory.
///
/// The dataset name is taken from the directory's final component.
///
/// # Errors
///
/// Returns [`Error::Structural`] for missing files and
/// [`Error::InvalidInput`] for records that violate the descriptor.
pub fn load_dataset<P: AsRef<Path>>(dataset_dir: P) -> Result<Dataset> {
    let dir = dataset_dir.as_ref();
    let meta = load_meta(dir)?;
    let n_tasks = meta.n_tasks();
    let name = dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let [train, valid, test] =
        SplitName::ALL.map(|split| read_partition(partition_path(dir, split), split, n_tasks));

    Dataset::new(name, meta, train?, valid?, test?)
}
