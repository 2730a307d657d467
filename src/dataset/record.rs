//! Record - one molecule with its per-task labels and masks

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One molecule instance.
///
/// `labels` and `masks` always have one entry per task. A mask of 1 marks an
/// informative label, 0 a missing one whose label value is a placeholder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// SMILES string
    pub smiles: String,
    /// Label per task
    pub labels: Vec<f64>,
    /// Label presence per task, values in {0, 1}
    pub masks: Vec<u8>,
}

impl Record {
    /// Create a record with every task observed.
    #[must_use]
    pub fn new(smiles: impl Into<String>, labels: Vec<f64>) -> Self {
        let masks = vec![1; labels.len()];
        Self {
            smiles: smiles.into(),
            labels,
            masks,
        }
    }

    /// Create a record with explicit masks.
    #[must_use]
    pub fn with_masks(smiles: impl Into<String>, labels: Vec<f64>, masks: Vec<u8>) -> Self {
        Self {
            smiles: smiles.into(),
            labels,
            masks,
        }
    }

    /// Number of tasks carried by this record.
    #[must_use]
    pub fn n_tasks(&self) -> usize {
        self.labels.len()
    }

    /// Whether task `task` has an informative label.
    #[must_use]
    pub fn is_observed(&self, task: usize) -> bool {
        self.masks.get(task) == Some(&1)
    }

    /// Check the record against the dataset's declared task count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if label/mask lengths differ from
    /// `n_tasks` or a mask value is not 0 or 1.
    pub fn validate(&self, n_tasks: usize) -> Result<()> {
        if self.labels.len() != n_tasks || self.masks.len() != n_tasks {
            return Err(Error::InvalidInput(format!(
                "record '{}' has {} labels and {} masks, expected {n_tasks}",
                self.smiles,
                self.labels.len(),
                self.masks.len()
            )));
        }
        if let Some(bad) = self.masks.iter().find(|&&m| m > 1) {
            return Err(Error::InvalidInput(format!(
                "record '{}' has mask value {bad}, expected 0 or 1",
                self.smiles
            )));
        }
        Ok(())
    }
}
