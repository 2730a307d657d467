//! Dataset Metadata - descriptor shared by every split of a dataset

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Prediction task type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    /// Categorical labels drawn from `classes`
    Classification,
    /// Continuous labels
    Regression,
}

impl TaskType {
    /// Metric used when the descriptor does not name one.
    #[must_use]
    pub const fn default_metric(self) -> EvalMetric {
        match self {
            Self::Classification => EvalMetric::RocAuc,
            Self::Regression => EvalMetric::Rmse,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classification => write!(f, "classification"),
            Self::Regression => write!(f, "regression"),
        }
    }
}

/// Metric used to evaluate valid and test performance during training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvalMetric {
    /// Area under the ROC curve
    #[serde(rename = "roc-auc")]
    RocAuc,
    /// Area under the precision-recall curve
    #[serde(rename = "prc-auc")]
    PrcAuc,
    /// Root mean squared error
    #[serde(rename = "rmse")]
    Rmse,
    /// Mean absolute error
    #[serde(rename = "mae")]
    Mae,
}

impl EvalMetric {
    /// Whether the metric applies to `task_type`.
    #[must_use]
    pub const fn supports(self, task_type: TaskType) -> bool {
        matches!(
            (self, task_type),
            (Self::RocAuc | Self::PrcAuc, TaskType::Classification)
                | (Self::Rmse | Self::Mae, TaskType::Regression)
        )
    }
}

const KNOWN_KEYS: &[&str] = &[
    "task_type",
    "n_tasks",
    "classes",
    "eval_metric",
    "random_split",
    "created_at",
];

/// Dataset metadata descriptor (`meta.json`).
///
/// Created once at conversion time and immutable afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatasetMeta {
    task_type: TaskType,
    n_tasks: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    classes: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    eval_metric: Option<EvalMetric>,
    #[serde(default)]
    random_split: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_at: Option<DateTime<Utc>>,
}

impl DatasetMeta {
    /// Create a builder with the required fields.
    #[must_use]
    pub fn builder(task_type: TaskType, n_tasks: usize) -> DatasetMetaBuilder {
        DatasetMetaBuilder::new(task_type, n_tasks)
    }

    /// Parse a descriptor from JSON text.
    ///
    /// Keys that are not part of the descriptor are ignored with a warning.
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is malformed or the descriptor is invalid.
    pub fn from_json(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if let Some(object) = value.as_object() {
            let unknown: Vec<&str> = object
                .keys()
                .map(String::as_str)
                .filter(|k| !KNOWN_KEYS.contains(k))
                .collect();
            if !unknown.is_empty() {
                tracing::warn!(?unknown, "ignoring attributes not defined for dataset metadata");
            }
        }
        let meta: Self = serde_json::from_value(value)?;
        meta.validate()?;
        Ok(meta)
    }

    /// Serialize to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check descriptor invariants.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if `n_tasks` is zero, a classification
    /// dataset has no classes, or the metric does not fit the task type.
    pub fn validate(&self) -> Result<()> {
        if self.n_tasks == 0 {
            return Err(Error::InvalidInput("n_tasks must be positive".to_string()));
        }
        if self.task_type == TaskType::Classification
            && self.classes.as_ref().map_or(true, Vec::is_empty)
        {
            return Err(Error::InvalidInput(
                "classification datasets must declare classes".to_string(),
            ));
        }
        if let Some(metric) = self.eval_metric {
            if !metric.supports(self.task_type) {
                return Err(Error::InvalidInput(format!(
                    "eval_metric {metric:?} is not applicable to {} tasks",
                    self.task_type
                )));
            }
        }
        Ok(())
    }

    /// Task type.
    #[must_use]
    pub const fn task_type(&self) -> TaskType {
        self.task_type
    }

    /// Number of tasks per record.
    #[must_use]
    pub const fn n_tasks(&self) -> usize {
        self.n_tasks
    }

    /// Class enumeration, classification only.
    #[must_use]
    pub fn classes(&self) -> Option<&[i64]> {
        self.classes.as_deref()
    }

    /// Evaluation metric, inferred from the task type when not declared.
    #[must_use]
    pub fn eval_metric(&self) -> EvalMetric {
        self.eval_metric
            .unwrap_or_else(|| self.task_type.default_metric())
    }

    /// Whether splits were drawn randomly (false: scaffold split).
    #[must_use]
    pub const fn random_split(&self) -> bool {
        self.random_split
    }

    /// Conversion timestamp, if recorded.
    #[must_use]
    pub const fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    /// Number of model outputs for this dataset: one per task for regression
    /// and binary classification, one per class per task otherwise.
    #[must_use]
    pub fn n_outputs(&self) -> usize {
        match (self.task_type, self.classes.as_deref()) {
            (TaskType::Classification, Some(classes)) if classes.len() > 2 => {
                classes.len() * self.n_tasks
            }
            _ => self.n_tasks,
        }
    }
}

/// Builder for `DatasetMeta`.
#[derive(Debug)]
pub struct DatasetMetaBuilder {
    task_type: TaskType,
    n_tasks: usize,
    classes: Option<Vec<i64>>,
    eval_metric: Option<EvalMetric>,
    random_split: bool,
    created_at: Option<DateTime<Utc>>,
}

impl DatasetMetaBuilder {
    /// Create a new builder with required fields.
    #[must_use]
    pub fn new(task_type: TaskType, n_tasks: usize) -> Self {
        Self {
            task_type,
            n_tasks,
            classes: None,
            eval_metric: None,
            random_split: false,
            created_at: None,
        }
    }

    /// Set the class enumeration.
    #[must_use]
    pub fn classes(mut self, classes: Vec<i64>) -> Self {
        self.classes = Some(classes);
        self
    }

    /// Set the evaluation metric.
    #[must_use]
    pub const fn eval_metric(mut self, metric: EvalMetric) -> Self {
        self.eval_metric = Some(metric);
        self
    }

    /// Mark the splits as random rather than scaffold-based.
    #[must_use]
    pub const fn random_split(mut self, random: bool) -> Self {
        self.random_split = random;
        self
    }

    /// Stamp the conversion time as now.
    #[must_use]
    pub fn created_now(mut self) -> Self {
        self.created_at = Some(Utc::now());
        self
    }

    /// Build and validate the descriptor.
    ///
    /// # Errors
    ///
    /// Returns error if the descriptor violates an invariant.
    pub fn build(self) -> Result<DatasetMeta> {
        let meta = DatasetMeta {
            task_type: self.task_type,
            n_tasks: self.n_tasks,
            classes: self.classes,
            eval_metric: self.eval_metric,
            random_split: self.random_split,
            created_at: self.created_at,
        };
        meta.validate()?;
        Ok(meta)
    }
}
