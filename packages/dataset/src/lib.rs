#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Training dataset construction.
//!
//! Joins county parcels with building footprints and address points and
//! produces one [`TrainingRow`] per parcel:
//!
//! | Column | Meaning |
//! |---|---|
//! | `compactness` | Polsby-Popper compactness of the boundary |
//! | `has_pool`, `has_park` | a contained building carries that type tag |
//! | `building_density` | contained buildings per km² |
//! | `address_density` | address points inside the parcel's bounding box per km² |
//! | `roof_consistency` | `1 - distinct roof types / buildings` |
//! | `hoa_exists` | heuristic label from [`label_rows`] |
//!
//! The label is a placeholder until parcels are labeled from a real HOA
//! registry.

pub mod sources;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use geo::{BoundingRect, Contains, Polygon};
use hoa_detect_features::{calculate_compactness, count_per_km2};
use hoa_detect_parcel_models::{Building, Coordinates, Parcel};
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{AABB, RTree};
use serde::Serialize;
use thiserror::Error;

pub use sources::ParcelFields;

/// Compactness above which a parcel counts as planned.
pub const LABEL_MIN_COMPACTNESS: f64 = 0.7;

/// Roof consistency above which a parcel counts as uniform.
pub const LABEL_MIN_ROOF_CONSISTENCY: f64 = 0.8;

/// Errors building a dataset.
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Shapefile error: {0}")]
    Shapefile(#[from] shapefile::Error),

    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: &'static str },
}

/// One parcel's features and label.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingRow {
    pub parcel_id: String,
    pub compactness: f64,
    pub has_pool: bool,
    pub has_park: bool,
    pub building_density: f64,
    pub address_density: f64,
    /// `None` when the parcel has buildings but none of them is tagged
    /// with a roof type.
    pub roof_consistency: Option<f64>,
    /// `None` until [`label_rows`] has run.
    pub hoa_exists: Option<u8>,
}

/// Paths of the three county inputs.
#[derive(Debug, Clone)]
pub struct DatasetSources {
    pub parcels: PathBuf,
    pub buildings: PathBuf,
    pub addresses: PathBuf,
    pub fields: ParcelFields,
}

type FootprintEntry = GeomWithData<Rectangle<[f64; 2]>, usize>;

/// Reads all inputs and builds the unlabeled dataset.
///
/// # Errors
///
/// Returns [`DatasetError`] if any input cannot be read.
pub fn create_dataset(sources: &DatasetSources) -> Result<Vec<TrainingRow>, DatasetError> {
    let parcels = sources::read_parcels(&sources.parcels, &sources.fields)?;
    let buildings = sources::read_buildings(&sources.buildings)?;
    let addresses = sources::read_addresses(&sources.addresses)?;
    Ok(build_dataset(&parcels, &buildings, &addresses))
}

/// Builds one row per parcel.
///
/// A building belongs to a parcel when the parcel boundary contains its
/// whole footprint. Buildings without a footprint never belong to a
/// parcel. Parcels whose compactness or density is undefined are skipped
/// with a warning.
#[must_use]
pub fn build_dataset(
    parcels: &[Parcel],
    buildings: &[Building],
    addresses: &[Coordinates],
) -> Vec<TrainingRow> {
    let footprints: RTree<FootprintEntry> = RTree::bulk_load(
        buildings
            .iter()
            .enumerate()
            .filter_map(|(i, b)| {
                let rect = b.footprint.as_ref()?.bounding_rect()?;
                let corners = Rectangle::from_corners(
                    [rect.min().x, rect.min().y],
                    [rect.max().x, rect.max().y],
                );
                Some(GeomWithData::new(corners, i))
            })
            .collect(),
    );
    let points: RTree<[f64; 2]> = RTree::bulk_load(
        addresses
            .iter()
            .map(|a| [a.longitude, a.latitude])
            .collect(),
    );

    let rows: Vec<TrainingRow> = parcels
        .iter()
        .filter_map(|parcel| {
            let envelope = polygon_envelope(parcel.polygon())?;
            let contained =
                contained_buildings(parcel.polygon(), &envelope, &footprints, buildings);
            let address_count = points.locate_in_envelope(&envelope).count();

            match parcel_row(parcel, &contained, address_count) {
                Ok(row) => Some(row),
                Err(e) => {
                    log::warn!("Skipping parcel {}: {e}", parcel.id());
                    None
                }
            }
        })
        .collect();

    log::info!("Built {} rows from {} parcels", rows.len(), parcels.len());
    rows
}

fn polygon_envelope(polygon: &Polygon<f64>) -> Option<AABB<[f64; 2]>> {
    let rect = polygon.bounding_rect()?;
    Some(AABB::from_corners(
        [rect.min().x, rect.min().y],
        [rect.max().x, rect.max().y],
    ))
}

fn contained_buildings<'a>(
    boundary: &Polygon<f64>,
    envelope: &AABB<[f64; 2]>,
    footprints: &RTree<FootprintEntry>,
    buildings: &'a [Building],
) -> Vec<&'a Building> {
    footprints
        .locate_in_envelope(envelope)
        .map(|entry| &buildings[entry.data])
        .filter(|b| b.footprint.as_ref().is_some_and(|f| boundary.contains(f)))
        .collect()
}

fn parcel_row(
    parcel: &Parcel,
    buildings: &[&Building],
    address_count: usize,
) -> Result<TrainingRow, hoa_detect_features::FeatureError> {
    Ok(TrainingRow {
        parcel_id: parcel.id().to_string(),
        compactness: calculate_compactness(parcel.polygon())?,
        has_pool: buildings.iter().any(|b| b.is_kind("pool")),
        has_park: buildings.iter().any(|b| b.is_kind("park")),
        building_density: count_per_km2(buildings.len(), parcel.area_m2())?,
        address_density: count_per_km2(address_count, parcel.area_m2())?,
        roof_consistency: roof_consistency(buildings),
        hoa_exists: None,
    })
}

/// `1 - distinct roof types / building count`.
///
/// Buildings without a roof tag count toward the total but add no roof
/// type. A parcel without buildings is fully consistent (1.0). Returns
/// `None` when there are buildings but none carries a roof tag.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn roof_consistency(buildings: &[&Building]) -> Option<f64> {
    if buildings.is_empty() {
        return Some(1.0);
    }
    let roof_types: BTreeSet<&str> = buildings
        .iter()
        .filter_map(|b| b.roof_type.as_deref())
        .collect();
    if roof_types.is_empty() {
        return None;
    }
    Some(1.0 - roof_types.len() as f64 / buildings.len() as f64)
}

/// Whether a row satisfies the HOA heuristic: compact, with a pool or
/// park, and uniform roofs. All comparisons are strict.
#[must_use]
pub fn is_likely_hoa(row: &TrainingRow) -> bool {
    row.compactness > LABEL_MIN_COMPACTNESS
        && (row.has_pool || row.has_park)
        && row
            .roof_consistency
            .is_some_and(|r| r > LABEL_MIN_ROOF_CONSISTENCY)
}

/// Sets `hoa_exists` on every row from [`is_likely_hoa`].
pub fn label_rows(rows: &mut [TrainingRow]) {
    for row in rows.iter_mut() {
        row.hoa_exists = Some(u8::from(is_likely_hoa(row)));
    }
    let positives = rows.iter().filter(|r| r.hoa_exists == Some(1)).count();
    log::info!("Labeled {} rows ({positives} positive)", rows.len());
}

/// Writes rows as CSV. Undefined values are empty cells.
///
/// # Errors
///
/// Returns [`DatasetError`] if the file cannot be written.
pub fn write_training_csv(rows: &[TrainingRow], path: &Path) -> Result<(), DatasetError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| DatasetError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush().map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    log::info!("Wrote {} training rows to {}", rows.len(), path.display());
    Ok(())
}
