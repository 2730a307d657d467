//! Foreign (Uni-Mol style) partition files
//!
//! One JSON object per line:
//!
//! ```text
//! {"smi": "CCO", "target": [1, null], "atoms": ["C", "C", "O"], "coordinates": [[[0.0, 0.0, 0.0], ...]]}
//! ```
//!
//! `atoms` and `coordinates` are optional; `coordinates` holds one or more
//! conformers of which only the first is used.

use serde::Deserialize;
use serde_json::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::dataset::SplitName;
use crate::features::Conformer;
use crate::{Error, Result};

/// Extension of foreign partition files
pub const FOREIGN_EXT: &str = "jsonl";

/// One parsed foreign line
#[derive(Debug, Deserialize)]
pub(crate) struct ForeignRecord {
    pub smi: String,
    #[serde(default)]
    pub target: Option<Value>,
    #[serde(default)]
    pub atoms: Option<Vec<String>>,
    #[serde(default)]
    pub coordinates: Option<Vec<Vec<[f32; 3]>>>,
}

impl ForeignRecord {
    /// First conformer, if the record carries a usable one.
    pub fn conformer(&self) -> Option<Conformer> {
        let atoms = self.atoms.as_ref()?;
        let coordinates = self.coordinates.as_ref()?.first()?;
        if atoms.is_empty() || atoms.len() != coordinates.len() {
            return None;
        }
        Some(Conformer::new(atoms.clone(), coordinates.clone()))
    }
}

/// Path of a foreign partition file
#[must_use]
pub fn foreign_partition_path(dataset_dir: &Path, split: SplitName) -> std::path::PathBuf {
    dataset_dir.join(format!("{}.{FOREIGN_EXT}", split.as_str()))
}

/// Read every record of a foreign partition file, paired with its line number.
pub(crate) fn read_foreign(path: &Path) -> Result<Vec<(usize, ForeignRecord)>> {
    if !path.is_file() {
        return Err(Error::missing(path, "foreign partition file not found"));
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record: ForeignRecord = serde_json::from_str(&line).map_err(|e| Error::Malformed {
            path: path.to_path_buf(),
            line: i + 1,
            reason: e.to_string(),
        })?;
        records.push((i + 1, record));
    }
    Ok(records)
}

/// Decode a foreign target into per-task values; `None` marks a missing label.
///
/// Accepts an array or a scalar. Missingness markers are `null`, non-finite
/// numbers and the strings `"nan"`, `"NaN"`, `""`.
pub(crate) fn parse_target(target: &Value) -> std::result::Result<Vec<Option<f64>>, String> {
    fn cell(value: &Value) -> std::result::Result<Option<f64>, String> {
        match value {
            Value::Null => Ok(None),
            Value::Number(n) => Ok(n.as_f64().filter(|v| v.is_finite())),
            Value::Bool(b) => Ok(Some(f64::from(u8::from(*b)))),
            Value::String(s) => match s.trim() {
                "" | "nan" | "NaN" | "NAN" => Ok(None),
                other => other
                    .parse::<f64>()
                    .map(|v| Some(v).filter(|v| v.is_finite()))
                    .map_err(|_| format!("label '{other}' is not numeric")),
            },
            other => Err(format!("unsupported label value {other}")),
        }
    }

    match target {
        Value::Array(values) => values.iter().map(cell).collect(),
        scalar => cell(scalar).map(|v| vec![v]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_target_array_with_missing_markers() {
        let parsed = parse_target(&json!([1, null, "nan", 0.5, ""])).unwrap();
        assert_eq!(parsed, vec![Some(1.0), None, None, Some(0.5), None]);
    }

    #[test]
    fn test_parse_target_scalar() {
        assert_eq!(parse_target(&json!(-3.2)).unwrap(), vec![Some(-3.2)]);
        assert_eq!(parse_target(&json!("1.5")).unwrap(), vec![Some(1.5)]);
    }

    #[test]
    fn test_parse_target_rejects_objects() {
        assert!(parse_target(&json!([{"a": 1}])).is_err());
        assert!(parse_target(&json!(["abc"])).is_err());
    }

    #[test]
    fn test_conformer_requires_matching_lengths() {
        let record: ForeignRecord = serde_json::from_value(json!({
            "smi": "CO",
            "target": [1],
            "atoms": ["C", "O"],
            "coordinates": [[[0.0, 0.0, 0.0], [1.4, 0.0, 0.0]], [[0.0, 0.0, 0.0], [0.0, 1.4, 0.0]]]
        }))
        .unwrap();
        let conformer = record.conformer().unwrap();
        assert_eq!(conformer.atoms(), ["C", "O"]);
        assert_eq!(conformer.coordinates()[1], [1.4, 0.0, 0.0]);

        let mismatched: ForeignRecord = serde_json::from_value(json!({
            "smi": "CO",
            "atoms": ["C"],
            "coordinates": [[[0.0, 0.0, 0.0], [1.4, 0.0, 0.0]]]
        }))
        .unwrap();
        assert!(mismatched.conformer().is_none());
    }
}
