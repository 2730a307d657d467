use anyhow::{bail, Context};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use molprop_data::config::PipelineConfig;
use molprop_data::convert::{convert_datasets, ConversionOptions};
use molprop_data::pipeline::featurize;

#[derive(Parser)]
#[command(name = "molprop-data")]
#[command(about = "Molecular dataset normalization and feature caching", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize foreign datasets into Parquet partitions and meta.json
    Convert {
        /// Directory holding one subdirectory per foreign dataset
        #[arg(long = "unimol_data_dir", value_name = "DIR")]
        unimol_data_dir: PathBuf,

        /// Output root; each dataset lands in <DIR>/<name>/
        #[arg(long = "output_dir", value_name = "DIR")]
        output_dir: PathBuf,

        /// Datasets to convert
        #[arg(long = "dataset_names", value_name = "NAME", num_args = 1.., required = true)]
        dataset_names: Vec<String>,

        /// Accept classification labels outside the configured classes
        #[arg(long = "no_coerce_classes", action = ArgAction::SetTrue)]
        no_coerce_classes: bool,
    },
    /// Derive or load cached features for every split of a dataset
    Featurize {
        /// Pipeline configuration JSON file
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,

        /// Ignore cached artifacts (overrides the config file)
        #[arg(long, action = ArgAction::SetTrue)]
        force: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Convert {
            unimol_data_dir,
            output_dir,
            dataset_names,
            no_coerce_classes,
        } => {
            let options = ConversionOptions {
                coerce_classes: !no_coerce_classes,
                ..ConversionOptions::default()
            };
            let names: Vec<&str> = dataset_names.iter().map(String::as_str).collect();
            let report = convert_datasets(&unimol_data_dir, &output_dir, &names, &options);

            for (name, error) in report.failed() {
                eprintln!("{name}: {error}");
            }
            if !report.is_success() {
                bail!(
                    "{} of {} datasets failed to convert",
                    report.failed().len(),
                    names.len()
                );
            }
            println!("Converted {} datasets into {}", report.converted().len(), output_dir.display());
        }
        Commands::Featurize { config, force } => {
            let mut pipeline = PipelineConfig::from_json_file(&config)
                .with_context(|| format!("loading {}", config.display()))?;
            pipeline.ignore_preprocessed_dataset |= force;

            let report = featurize(&pipeline)
                .with_context(|| format!("featurizing {}", pipeline.dataset_name))?;
            for artifact in report.artifacts() {
                println!(
                    "{:<6} {:>8} records {:>6} invalid",
                    artifact.split(),
                    artifact.len(),
                    artifact.len() - artifact.valid_count()
                );
            }
        }
    }
    Ok(())
}
