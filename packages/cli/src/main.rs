#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for HOA probability analysis.
//!
//! - `analyze <ADDRESS>` scores one address and prints the JSON result;
//! - `county <CSV>` scores every address in a CSV and exports the results;
//! - `dataset` builds the labeled training CSV from county sources.
//!
//! Configuration comes from `hoa_detect.toml` (or `--config`) plus the
//! environment; see [`hoa_detect_config`].

mod progress;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use hoa_detect_analyzer::Analyzer;
use hoa_detect_analyzer::batch::{BatchOptions, ExecutionMode};
use hoa_detect_config::AppConfig;
use hoa_detect_dataset::{DatasetSources, ParcelFields};

use crate::progress::IndicatifProgress;

#[derive(Parser)]
#[command(name = "hoa_detect", about = "HOA probability estimation from parcel geometry")]
struct Cli {
    /// Config file (defaults to `hoa_detect.toml` when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Use fixture geocoder, gateway and classifier
    #[arg(long, global = true)]
    testing: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a single address and print the result as JSON
    Analyze {
        /// Free-text address (e.g., "123 Main St, Denton, TX")
        address: String,
    },
    /// Score every address in a CSV with an `address` column
    County {
        /// Address list
        csv: PathBuf,
        /// Worker pool width (overrides `batch.max_workers`)
        #[arg(long)]
        workers: Option<usize>,
        /// Process addresses one at a time, in input order
        #[arg(long)]
        sequential: bool,
        /// Per-address timeout in seconds (overrides `batch.task_timeout_secs`)
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// Skip the dated `GeoJSON` export
        #[arg(long)]
        no_export: bool,
        /// Also write the result table to this CSV file
        #[arg(long)]
        csv_out: Option<PathBuf>,
    },
    /// Build the labeled training dataset from county sources
    Dataset {
        /// Parcel boundaries shapefile (`.shp`, with its `.dbf` alongside)
        #[arg(long)]
        parcels: PathBuf,
        /// Building footprints `GeoJSON`
        #[arg(long)]
        buildings: PathBuf,
        /// Address points CSV with `latitude` and `longitude` columns
        #[arg(long)]
        addresses: PathBuf,
        /// Output CSV
        #[arg(long, default_value = "data/processed/hoa_labeled_data.csv")]
        output: PathBuf,
        /// Parcel id attribute in the `.dbf`
        #[arg(long, default_value = "id")]
        id_field: String,
        /// Zoning attribute in the `.dbf`
        #[arg(long, default_value = "zoning")]
        zoning_field: String,
        /// Land-use attribute in the `.dbf`
        #[arg(long, default_value = "land_use")]
        land_use_field: String,
        /// Leave `hoa_exists` empty instead of applying the heuristic label
        #[arg(long)]
        no_label: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = progress::init_logger();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if cli.testing {
        config.use_fixtures();
    }

    match cli.command {
        Commands::Analyze { address } => {
            let analyzer = Analyzer::from_config(&config)?;
            let result = analyzer.analyze_address(&address).await;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        Commands::County {
            csv,
            workers,
            sequential,
            timeout_secs,
            no_export,
            csv_out,
        } => {
            let mut options = BatchOptions::from_config(&config.batch);
            if let Some(workers) = workers {
                options.max_workers = workers.max(1);
            }
            if let Some(secs) = timeout_secs {
                options.task_timeout = Duration::from_secs(secs.max(1));
            }
            if sequential {
                options.mode = ExecutionMode::Sequential;
            }

            let bar = IndicatifProgress::addresses_bar(&multi, "Scoring addresses");
            let export_dir = (!no_export).then_some(config.export.output_dir.as_path());
            let run = hoa_detect_analyzer::county::analyze_county(
                &csv,
                &options,
                || Analyzer::from_config(&config),
                export_dir,
                Some(&bar),
            )
            .await?;

            if let Some(path) = &csv_out {
                hoa_detect_export::export_csv(&run.results.table, path)?;
            }

            println!(
                "Scored {} addresses ({} failed, {} dropped)",
                run.results.table.len(),
                run.results.failed.len(),
                run.results.dropped.len()
            );
            if let Some(path) = run.export {
                println!("Exported to {}", path.display());
            }
        }
        Commands::Dataset {
            parcels,
            buildings,
            addresses,
            output,
            id_field,
            zoning_field,
            land_use_field,
            no_label,
        } => {
            let sources = DatasetSources {
                parcels,
                buildings,
                addresses,
                fields: ParcelFields {
                    id: id_field,
                    zoning: zoning_field,
                    land_use: land_use_field,
                },
            };

            let mut rows = hoa_detect_dataset::create_dataset(&sources)?;
            if !no_label {
                hoa_detect_dataset::label_rows(&mut rows);
            }
            hoa_detect_dataset::write_training_csv(&rows, &output)?;
            println!("Wrote {} rows to {}", rows.len(), output.display());
        }
    }

    Ok(())
}
