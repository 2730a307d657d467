//! Partition files (Arrow/Parquet)
//!
//! One file per split with three non-nullable columns:
//!
//! | column   | type            |
//! |----------|-----------------|
//! | `smiles` | `Utf8`          |
//! | `labels` | `List<Float64>` |
//! | `masks`  | `List<UInt8>`   |

use arrow::array::{Array, ArrayRef, Float64Array, ListArray, StringArray, UInt8Array};
use arrow::buffer::OffsetBuffer;
use arrow::datatypes::{DataType, Field, FieldRef, Schema, SchemaRef};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use crate::dataset::{Record, Split, SplitName};
use crate::{Error, Result};

/// Extension of partition files
pub const PARTITION_EXT: &str = "parquet";

fn item_field(data_type: DataType) -> FieldRef {
    Arc::new(Field::new("item", data_type, false))
}

/// Arrow schema of a partition file
#[must_use]
pub fn partition_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new("smiles", DataType::Utf8, false),
        Field::new(
            "labels",
            DataType::List(item_field(DataType::Float64)),
            false,
        ),
        Field::new("masks", DataType::List(item_field(DataType::UInt8)), false),
    ]))
}

/// Convert records into a single record batch.
///
/// # Errors
///
/// Returns error if Arrow rejects the assembled columns.
pub fn records_to_batch(records: &[Record]) -> Result<RecordBatch> {
    let smiles = StringArray::from_iter_values(records.iter().map(|r| r.smiles.as_str()));

    let labels = ListArray::try_new(
        item_field(DataType::Float64),
        OffsetBuffer::from_lengths(records.iter().map(|r| r.labels.len())),
        Arc::new(Float64Array::from_iter_values(
            records.iter().flat_map(|r| r.labels.iter().copied()),
        )),
        None,
    )?;

    let masks = ListArray::try_new(
        item_field(DataType::UInt8),
        OffsetBuffer::from_lengths(records.iter().map(|r| r.masks.len())),
        Arc::new(UInt8Array::from_iter_values(
            records.iter().flat_map(|r| r.masks.iter().copied()),
        )),
        None,
    )?;

    let columns: Vec<ArrayRef> = vec![Arc::new(smiles), Arc::new(labels), Arc::new(masks)];
    Ok(RecordBatch::try_new(partition_schema(), columns)?)
}

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<T>())
        .ok_or_else(|| {
            Error::StorageError(format!(
                "Partition file is missing column '{name}' or it has the wrong type"
            ))
        })
}

fn list_values<T: Array + Clone + 'static>(list: &ListArray, row: usize, name: &str) -> Result<T> {
    list.value(row)
        .as_any()
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| Error::StorageError(format!("Column '{name}' has the wrong item type")))
}

/// Convert a record batch back into records.
///
/// # Errors
///
/// Returns error if a column is missing or has an unexpected type.
pub fn batch_to_records(batch: &RecordBatch) -> Result<Vec<Record>> {
    let smiles = column::<StringArray>(batch, "smiles")?;
    let labels = column::<ListArray>(batch, "labels")?;
    let masks = column::<ListArray>(batch, "masks")?;

    (0..batch.num_rows())
        .map(|row| {
            let row_labels = list_values::<Float64Array>(labels, row, "labels")?;
            let row_masks = list_values::<UInt8Array>(masks, row, "masks")?;
            Ok(Record::with_masks(
                smiles.value(row),
                row_labels.values().to_vec(),
                row_masks.values().to_vec(),
            ))
        })
        .collect()
}

/// Write a split to a Parquet file, replacing any existing file.
///
/// An empty split produces a valid zero-row file.
///
/// # Errors
///
/// Returns error if the file cannot be created or written.
pub fn write_partition<P: AsRef<Path>>(path: P, split: &Split) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| {
        Error::StorageError(format!(
            "Failed to create partition file {}: {e}",
            path.display()
        ))
    })?;

    let mut writer = ArrowWriter::try_new(file, partition_schema(), None)?;
    if !split.is_empty() {
        writer.write(&records_to_batch(split.records())?)?;
    }
    writer.close()?;

    tracing::debug!(path = %path.display(), rows = split.len(), "wrote partition");
    Ok(())
}

/// Read a split from a Parquet file and validate every record.
///
/// # Errors
///
/// Returns [`Error::Structural`] if the file does not exist, a storage error
/// if it cannot be parsed, and [`Error::InvalidInput`] if a record's label or
/// mask length differs from `n_tasks`.
pub fn read_partition<P: AsRef<Path>>(path: P, name: SplitName, n_tasks: usize) -> Result<Split> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(Error::missing(path, format!("{name} partition file not found")));
    }

    let file = File::open(path).map_err(|e| {
        Error::StorageError(format!("Failed to open Parquet file: {e}"))
    })?;

    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| {
        Error::StorageError(format!("Failed to parse Parquet file: {e}"))
    })?;

    let reader = builder.build().map_err(|e| {
        Error::StorageError(format!("Failed to create Parquet reader: {e}"))
    })?;

    let mut records = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| {
            Error::StorageError(format!("Failed to read record batch: {e}"))
        })?;
        records.extend(batch_to_records(&batch)?);
    }

    for record in &records {
        record.validate(n_tasks)?;
    }

    Ok(Split::new(name, records))
}
