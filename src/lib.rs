//! # molprop-data: Dataset Normalization and Feature Caching
//!
//! **Version**: 0.1.0
//!
//! Prepares molecular property datasets for uncertainty-quantification
//! benchmarks across several molecular representation backbones.
//!
//! ## Pipeline
//!
//! - **Schema Normalizer** ([`convert`]): reads foreign `{train,valid,test}`
//!   partitions and produces a [`dataset::Dataset`] with per-task labels and
//!   observation masks
//! - **Split Materializer** ([`storage`]): writes each split as a Parquet
//!   partition plus a shared `meta.json` descriptor
//! - **Feature Cache** ([`cache`]): derives backbone-specific features once
//!   per (dataset, split, backbone) and reuses the persisted artifact
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use molprop_data::config::PipelineConfig;
//! use molprop_data::convert::{convert_datasets, ConversionOptions};
//!
//! // Normalize foreign datasets into data/files/<name>/
//! let report = convert_datasets("data/UniMol", "data/files", &["bbbp", "esol"], &ConversionOptions::default());
//! assert!(report.is_success());
//!
//! // Derive GIN features for every split of bbbp
//! let config = PipelineConfig::new("data/files", "bbbp", "GIN");
//! let features = molprop_data::pipeline::featurize(&config)?;
//! println!("{} invalid records", features.invalid_count());
//! # Ok::<(), molprop_data::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod cache;
pub mod config;
pub mod convert;
pub mod dataset;
pub mod error;
pub mod features;
pub mod pipeline;
pub mod smiles;
pub mod storage;

pub use error::{Error, Result};
