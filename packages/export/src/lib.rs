#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Writers for [`ResultTable`]s.
//!
//! [`export_geojson`] produces a dated `FeatureCollection` of address
//! points for loading into a desktop GIS. [`export_csv`] writes the same
//! rows as a flat table.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, Value};
use hoa_detect_parcel_models::{ResultRow, ResultTable};
use thiserror::Error;

/// Base file name for county analysis exports.
pub const COUNTY_EXPORT_NAME: &str = "county_hoa_analysis";

/// Errors writing exports.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Returns `<output_dir>/<name>_<YYYYMMDD>.geojson`.
#[must_use]
pub fn export_path(output_dir: &Path, name: &str, date: NaiveDate) -> PathBuf {
    output_dir.join(format!("{name}_{}.geojson", date.format("%Y%m%d")))
}

/// Converts a table into a `FeatureCollection` of points.
///
/// Coordinates become the point geometry and every other column a
/// property. Rows without coordinates get a null geometry.
///
/// # Errors
///
/// Returns [`ExportError::Json`] if a row cannot be serialized.
pub fn feature_collection(table: &ResultTable) -> Result<FeatureCollection, ExportError> {
    let features = table
        .rows
        .iter()
        .map(row_feature)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    })
}

fn row_feature(row: &ResultRow) -> Result<Feature, ExportError> {
    let geometry = row
        .coordinates()
        .map(|c| Geometry::new(Value::Point(vec![c.longitude, c.latitude])));

    let mut properties = match serde_json::to_value(row)? {
        serde_json::Value::Object(map) => map,
        _ => JsonObject::new(),
    };
    properties.remove("latitude");
    properties.remove("longitude");

    Ok(Feature {
        bbox: None,
        geometry,
        id: None,
        properties: Some(properties),
        foreign_members: None,
    })
}

/// Writes `table` as `GeoJSON` to [`export_path`], creating `output_dir`
/// if needed.
///
/// Returns the written path, or `None` when the table is empty and nothing
/// was written.
///
/// # Errors
///
/// Returns [`ExportError`] if the directory or file cannot be written.
pub fn export_geojson(
    table: &ResultTable,
    output_dir: &Path,
    name: &str,
    date: NaiveDate,
) -> Result<Option<PathBuf>, ExportError> {
    if table.is_empty() {
        log::info!("No results to export");
        return Ok(None);
    }

    let collection = feature_collection(table)?;

    std::fs::create_dir_all(output_dir)?;
    let path = export_path(output_dir, name, date);
    let writer = BufWriter::new(File::create(&path)?);
    serde_json::to_writer(writer, &collection)?;

    log::info!(
        "Exported {} features to {}",
        collection.features.len(),
        path.display()
    );
    Ok(Some(path))
}

/// Writes `table` as CSV with a header row.
///
/// # Errors
///
/// Returns [`ExportError`] if the file cannot be written.
pub fn export_csv(table: &ResultTable, path: &Path) -> Result<(), ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for row in &table.rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    log::info!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(address: &str, coordinates: Option<(f64, f64)>) -> ResultRow {
        ResultRow {
            address: address.to_string(),
            latitude: coordinates.map(|c| c.0),
            longitude: coordinates.map(|c| c.1),
            hoa_probability: 0.75,
            compactness: 0.785,
            density: 2000.0,
            height_variation: 1.0,
            zoning_code: Some("RES".to_string()),
            land_use: None,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 9).unwrap()
    }

    #[test]
    fn path_is_dated() {
        let path = export_path(Path::new("out"), "county_hoa_analysis", date());
        assert_eq!(path, Path::new("out/county_hoa_analysis_20240309.geojson"));
    }

    #[test]
    fn points_are_lon_lat_with_remaining_columns_as_properties() {
        let table = ResultTable::new(vec![row("1 A St", Some((33.2, -97.1)))]);
        let collection = feature_collection(&table).unwrap();
        let feature = &collection.features[0];

        let Some(Geometry {
            value: Value::Point(point),
            ..
        }) = &feature.geometry
        else {
            panic!("expected point geometry");
        };
        assert_eq!(point, &vec![-97.1, 33.2]);

        let properties = feature.properties.as_ref().unwrap();
        assert_eq!(properties["address"], "1 A St");
        assert!(!properties.contains_key("latitude"));
        assert!(properties["land_use"].is_null());
    }

    #[test]
    fn missing_coordinates_get_null_geometry() {
        let table = ResultTable::new(vec![row("1 A St", None)]);
        let collection = feature_collection(&table).unwrap();
        assert!(collection.features[0].geometry.is_none());
    }

    #[test]
    fn empty_table_writes_nothing() {
        let dir = std::env::temp_dir().join("hoa_detect_export_empty");
        let written = export_geojson(&ResultTable::default(), &dir, "empty", date()).unwrap();
        assert!(written.is_none());
        assert!(!export_path(&dir, "empty", date()).exists());
    }

    #[test]
    fn writes_geojson_and_csv() {
        let dir = std::env::temp_dir().join("hoa_detect_export_write");
        let table = ResultTable::new(vec![
            row("1 A St", Some((33.2, -97.1))),
            row("2 B St", None),
        ]);

        let path = export_geojson(&table, &dir, "county", date())
            .unwrap()
            .unwrap();
        let written: FeatureCollection = std::fs::read_to_string(&path)
            .unwrap()
            .parse::<geojson::GeoJson>()
            .unwrap()
            .try_into()
            .unwrap();
        assert_eq!(written.features.len(), 2);

        let csv_path = dir.join("county.csv");
        export_csv(&table, &csv_path).unwrap();
        let contents = std::fs::read_to_string(&csv_path).unwrap();
        let mut lines = contents.lines();
        assert_eq!(
            lines.next().map(|h| h.split(',').collect::<Vec<_>>()),
            Some(hoa_detect_parcel_models::RESULT_COLUMNS.to_vec())
        );
        assert_eq!(lines.count(), 2);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
