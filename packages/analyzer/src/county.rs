//! County analysis from an address CSV.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hoa_detect_export::{COUNTY_EXPORT_NAME, ExportError};
use thiserror::Error;

use crate::batch::{self, BatchError, BatchOptions, CountyResults};
use crate::progress::ProgressCallback;
use crate::{Analyzer, SystemError};

/// Column holding the address text.
pub const ADDRESS_COLUMN: &str = "address";

/// Errors from a county run.
#[derive(Debug, Error)]
pub enum CountyError {
    #[error("Failed to read address list {path}: {source}")]
    Read { path: PathBuf, source: csv::Error },

    #[error("Address list {path} has no 'address' column")]
    MissingColumn { path: PathBuf },

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("Export failed: {0}")]
    Export(#[from] ExportError),
}

/// Outcome of [`analyze_county`].
#[derive(Debug)]
pub struct CountyRun {
    pub results: CountyResults,
    /// `GeoJSON` file written, if the table had any rows.
    pub export: Option<PathBuf>,
}

/// Reads the `address` column of a CSV file. Blank cells are skipped.
///
/// # Errors
///
/// Returns [`CountyError`] if the file cannot be read or has no `address`
/// column.
pub fn read_address_list(path: &Path) -> Result<Vec<String>, CountyError> {
    let read_err = |source| CountyError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(read_err)?;
    let column = reader
        .headers()
        .map_err(read_err)?
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(ADDRESS_COLUMN))
        .ok_or_else(|| CountyError::MissingColumn {
            path: path.to_path_buf(),
        })?;

    let mut addresses = Vec::new();
    for record in reader.records() {
        let record = record.map_err(read_err)?;
        if let Some(address) = record.get(column).map(str::trim).filter(|a| !a.is_empty()) {
            addresses.push(address.to_string());
        }
    }

    log::info!("Read {} addresses from {}", addresses.len(), path.display());
    Ok(addresses)
}

/// Analyzes every address in `address_file` and, when `export_dir` is set
/// and at least one address scored, writes a dated `GeoJSON` export.
///
/// # Errors
///
/// Returns [`CountyError`] if the list cannot be read, analyzers cannot be
/// built, or the export cannot be written.
pub async fn analyze_county<F>(
    address_file: &Path,
    options: &BatchOptions,
    build: F,
    export_dir: Option<&Path>,
    progress: Option<&Arc<dyn ProgressCallback>>,
) -> Result<CountyRun, CountyError>
where
    F: Fn() -> Result<Analyzer, SystemError>,
{
    let addresses = read_address_list(address_file)?;
    let results = batch::process_county(&addresses, options, build, progress).await?;

    let export = match export_dir {
        Some(dir) if results.table.has_coordinate_columns() => {
            let today = chrono::Local::now().date_naive();
            hoa_detect_export::export_geojson(&results.table, dir, COUNTY_EXPORT_NAME, today)?
        }
        _ => None,
    };

    Ok(CountyRun { results, export })
}
