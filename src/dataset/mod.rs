//! Internal dataset schema
//!
//! ```text
//! Dataset ──── DatasetMeta (1, shared)
//!    │
//!    └──< Split (train / valid / test)
//!            └──< Record (ordered)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use molprop_data::dataset::{Dataset, DatasetMeta, Record, Split, SplitName, TaskType};
//!
//! let meta = DatasetMeta::builder(TaskType::Regression, 1).build()?;
//! let train = Split::new(SplitName::Train, vec![Record::new("CCO", vec![-0.77])]);
//! let dataset = Dataset::new("esol", meta, train, Split::empty(SplitName::Valid), Split::empty(SplitName::Test))?;
//! assert_eq!(dataset.split(SplitName::Train).len(), 1);
//! # Ok::<(), molprop_data::Error>(())
//! ```

mod meta;
mod record;

pub use meta::{DatasetMeta, DatasetMetaBuilder, EvalMetric, TaskType};
pub use record::Record;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// Partition name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitName {
    /// Training partition
    Train,
    /// Validation partition
    Valid,
    /// Test partition
    Test,
}

impl SplitName {
    /// All partitions in canonical order.
    pub const ALL: [Self; 3] = [Self::Train, Self::Valid, Self::Test];

    /// File stem used on disk.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Train => "train",
            Self::Valid => "valid",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for SplitName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for SplitName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "train" => Ok(Self::Train),
            "valid" => Ok(Self::Valid),
            "test" => Ok(Self::Test),
            other => Err(Error::InvalidInput(format!("unknown split '{other}'"))),
        }
    }
}

/// A named, ordered partition of records.
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    name: SplitName,
    records: Vec<Record>,
}

impl Split {
    /// Create a split from records.
    #[must_use]
    pub const fn new(name: SplitName, records: Vec<Record>) -> Self {
        Self { name, records }
    }

    /// Create an empty split.
    #[must_use]
    pub const fn empty(name: SplitName) -> Self {
        Self::new(name, Vec::new())
    }

    /// Partition name.
    #[must_use]
    pub const fn name(&self) -> SplitName {
        self.name
    }

    /// Records in split order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Consume the split, returning its records.
    #[must_use]
    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the split has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// SMILES strings in split order.
    pub fn smiles(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.smiles.as_str())
    }
}

/// A dataset: metadata plus its three partitions.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    name: String,
    meta: DatasetMeta,
    splits: [Split; 3],
}

impl Dataset {
    /// Assemble a dataset and check every record against the metadata.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a split is passed in the wrong slot
    /// or any record violates the label/mask length invariant.
    pub fn new(
        name: impl Into<String>,
        meta: DatasetMeta,
        train: Split,
        valid: Split,
        test: Split,
    ) -> Result<Self> {
        let splits = [train, valid, test];
        for (expected, split) in SplitName::ALL.iter().zip(&splits) {
            if split.name() != *expected {
                return Err(Error::InvalidInput(format!(
                    "expected {expected} split, got {}",
                    split.name()
                )));
            }
            for record in split.records() {
                record.validate(meta.n_tasks())?;
            }
        }
        Ok(Self {
            name: name.into(),
            meta,
            splits,
        })
    }

    /// Dataset name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared metadata.
    #[must_use]
    pub const fn meta(&self) -> &DatasetMeta {
        &self.meta
    }

    /// One partition.
    #[must_use]
    pub fn split(&self, name: SplitName) -> &Split {
        match name {
            SplitName::Train => &self.splits[0],
            SplitName::Valid => &self.splits[1],
            SplitName::Test => &self.splits[2],
        }
    }

    /// All partitions in canonical order.
    #[must_use]
    pub fn splits(&self) -> &[Split] {
        &self.splits
    }

    /// Total number of records across partitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.splits.iter().map(Split::len).sum()
    }

    /// Whether every partition is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.splits.iter().all(Split::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(n_tasks: usize) -> DatasetMeta {
        DatasetMeta::builder(TaskType::Regression, n_tasks).build().unwrap()
    }

    #[test]
    fn test_split_name_round_trip() {
        for name in SplitName::ALL {
            assert_eq!(name.as_str().parse::<SplitName>().unwrap(), name);
        }
        assert!("dev".parse::<SplitName>().is_err());
    }

    #[test]
    fn test_dataset_rejects_bad_record() {
        let train = Split::new(SplitName::Train, vec![Record::new("C", vec![1.0, 2.0])]);
        let result = Dataset::new(
            "x",
            meta(1),
            train,
            Split::empty(SplitName::Valid),
            Split::empty(SplitName::Test),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_dataset_rejects_misplaced_split() {
        let result = Dataset::new(
            "x",
            meta(1),
            Split::empty(SplitName::Valid),
            Split::empty(SplitName::Valid),
            Split::empty(SplitName::Test),
        );
        assert!(result.unwrap_err().to_string().contains("expected train"));
    }

    #[test]
    fn test_dataset_accessors() {
        let train = Split::new(
            SplitName::Train,
            vec![Record::new("C", vec![1.0]), Record::new("CC", vec![2.0])],
        );
        let test = Split::new(SplitName::Test, vec![Record::new("CCC", vec![3.0])]);
        let dataset =
            Dataset::new("x", meta(1), train, Split::empty(SplitName::Valid), test).unwrap();

        assert_eq!(dataset.len(), 3);
        assert!(dataset.split(SplitName::Valid).is_empty());
        assert_eq!(
            dataset.split(SplitName::Train).smiles().collect::<Vec<_>>(),
            vec!["C", "CC"]
        );
    }
}
