#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parcel, building, and analysis result types.
//!
//! [`Parcel`] and [`Building`] are read-only snapshots fetched from the
//! spatial store for a single query. [`FeatureVector`] and
//! [`AnalysisResult`] are produced per address by the analyzer, and a batch
//! run flattens its successful results into a [`ResultTable`].

use std::collections::BTreeSet;

use geo::algorithm::line_intersection::{LineIntersection, line_intersection};
use geo::{Coord, Line, Polygon};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
}

impl Coordinates {
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// Reasons a parcel snapshot is rejected at construction.
#[derive(Debug, Error, PartialEq)]
pub enum ParcelError {
    /// The exterior ring has fewer than three distinct vertices.
    #[error("Parcel polygon has {count} distinct vertices, at least 3 required")]
    TooFewVertices {
        /// Number of distinct vertices found.
        count: usize,
    },

    /// Two non-adjacent edges of the exterior ring cross or touch.
    #[error("Parcel polygon is self-intersecting")]
    SelfIntersecting,

    /// Recorded parcel area is zero, negative, or not a number.
    #[error("Parcel area must be positive, got {area}")]
    NonPositiveArea {
        /// The rejected area in square meters.
        area: f64,
    },
}

/// A land parcel with its boundary and zoning attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Parcel {
    id: String,
    polygon: Polygon<f64>,
    area_m2: f64,
    zoning: Option<String>,
    land_use: Option<String>,
}

impl Parcel {
    /// Creates a parcel after checking that its polygon is simple and its
    /// area is positive.
    ///
    /// # Errors
    ///
    /// Returns [`ParcelError`] if the exterior ring has fewer than three
    /// distinct vertices, intersects itself, or `area_m2` is not positive.
    pub fn new(
        id: impl Into<String>,
        polygon: Polygon<f64>,
        area_m2: f64,
        zoning: Option<String>,
        land_use: Option<String>,
    ) -> Result<Self, ParcelError> {
        if !area_m2.is_finite() || area_m2 <= 0.0 {
            return Err(ParcelError::NonPositiveArea { area: area_m2 });
        }
        validate_ring(&polygon)?;

        Ok(Self {
            id: id.into(),
            polygon,
            area_m2,
            zoning,
            land_use,
        })
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub const fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Recorded parcel area in square meters.
    #[must_use]
    pub const fn area_m2(&self) -> f64 {
        self.area_m2
    }

    #[must_use]
    pub fn zoning(&self) -> Option<&str> {
        self.zoning.as_deref()
    }

    #[must_use]
    pub fn land_use(&self) -> Option<&str> {
        self.land_use.as_deref()
    }
}

/// Checks the exterior ring for distinct vertex count and self-intersection.
fn validate_ring(polygon: &Polygon<f64>) -> Result<(), ParcelError> {
    // Drop consecutive duplicates (including the closing vertex) so that
    // zero-length edges do not register as intersections.
    let mut ring: Vec<Coord<f64>> = Vec::with_capacity(polygon.exterior().0.len());
    for coord in &polygon.exterior().0 {
        if ring.last() != Some(coord) {
            ring.push(*coord);
        }
    }
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }

    let distinct: BTreeSet<(u64, u64)> = ring
        .iter()
        .map(|c| (c.x.to_bits(), c.y.to_bits()))
        .collect();
    if distinct.len() < 3 {
        return Err(ParcelError::TooFewVertices {
            count: distinct.len(),
        });
    }

    let n = ring.len();
    let edges: Vec<Line<f64>> = (0..n)
        .map(|i| Line::new(ring[i], ring[(i + 1) % n]))
        .collect();

    for i in 0..n {
        for j in (i + 1)..n {
            let adjacent = j == i + 1 || (i == 0 && j == n - 1);
            match line_intersection(edges[i], edges[j]) {
                None => {}
                Some(LineIntersection::Collinear { .. }) => {
                    return Err(ParcelError::SelfIntersecting);
                }
                Some(LineIntersection::SinglePoint { .. }) if adjacent => {}
                Some(LineIntersection::SinglePoint { .. }) => {
                    return Err(ParcelError::SelfIntersecting);
                }
            }
        }
    }

    Ok(())
}

/// A building footprint or amenity near a parcel.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Building {
    /// Footprint polygon, when the source provides one.
    pub footprint: Option<Polygon<f64>>,
    /// Height in meters.
    pub height: Option<f64>,
    /// Roof type tag (e.g. "gable", "hip").
    pub roof_type: Option<String>,
    /// Structure type tag (e.g. "house", "pool", "park").
    pub kind: Option<String>,
}

impl Building {
    /// A building known only by its height.
    #[must_use]
    pub fn with_height(height: f64) -> Self {
        Self {
            height: Some(height),
            ..Self::default()
        }
    }

    /// Returns `true` if the type tag matches `kind` (case-insensitive).
    #[must_use]
    pub fn is_kind(&self, kind: &str) -> bool {
        self.kind
            .as_deref()
            .is_some_and(|k| k.eq_ignore_ascii_case(kind))
    }
}

/// Fixed-shape feature record scored by the classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    /// Polsby-Popper compactness of the parcel boundary.
    pub compactness: f64,
    /// Buildings per square kilometer of parcel area.
    pub density: f64,
    /// Population standard deviation of known building heights.
    pub height_variation: f64,
    pub zoning_code: Option<String>,
    pub land_use: Option<String>,
}

/// Outcome of analyzing a single address.
///
/// Either carries coordinates, a probability and features, or only an
/// error message. Absent fields are omitted when serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hoa_probability: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<FeatureVector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AnalysisResult {
    #[must_use]
    pub fn success(
        address: impl Into<String>,
        coordinates: Coordinates,
        hoa_probability: f64,
        features: FeatureVector,
    ) -> Self {
        Self {
            address: address.into(),
            coordinates: Some(coordinates),
            hoa_probability: Some(hoa_probability),
            features: Some(features),
            error: None,
        }
    }

    #[must_use]
    pub fn failure(address: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            coordinates: None,
            hoa_probability: None,
            features: None,
            error: Some(error.into()),
        }
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.error.is_none() && self.hoa_probability.is_some()
    }

    /// Flattens a successful result into a table row.
    ///
    /// Returns `None` for failed results.
    #[must_use]
    pub fn to_row(&self) -> Option<ResultRow> {
        if self.error.is_some() {
            return None;
        }
        let coordinates = self.coordinates?;
        let hoa_probability = self.hoa_probability?;
        let features = self.features.as_ref()?;

        Some(ResultRow {
            address: self.address.clone(),
            latitude: Some(coordinates.latitude),
            longitude: Some(coordinates.longitude),
            hoa_probability,
            compactness: features.compactness,
            density: features.density,
            height_variation: features.height_variation,
            zoning_code: features.zoning_code.clone(),
            land_use: features.land_use.clone(),
        })
    }
}

/// Column names of a non-empty [`ResultTable`], in row field order.
pub const RESULT_COLUMNS: &[&str] = &[
    "address",
    "latitude",
    "longitude",
    "hoa_probability",
    "compactness",
    "density",
    "height_variation",
    "zoning_code",
    "land_use",
];

/// One row of the batch result set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRow {
    pub address: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub hoa_probability: f64,
    pub compactness: f64,
    pub density: f64,
    pub height_variation: f64,
    pub zoning_code: Option<String>,
    pub land_use: Option<String>,
}

impl ResultRow {
    /// Returns the row's coordinates if both columns are populated.
    #[must_use]
    pub fn coordinates(&self) -> Option<Coordinates> {
        Some(Coordinates::new(self.latitude?, self.longitude?))
    }
}

/// Tabular result set of a county run.
///
/// Row order carries no meaning; rows are matched to inputs by `address`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultTable {
    pub rows: Vec<ResultRow>,
}

impl ResultTable {
    #[must_use]
    pub const fn new(rows: Vec<ResultRow>) -> Self {
        Self { rows }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Column names, or none at all for an empty table.
    #[must_use]
    pub fn columns(&self) -> &'static [&'static str] {
        if self.rows.is_empty() {
            &[]
        } else {
            RESULT_COLUMNS
        }
    }

    /// Returns `true` if the table has both `latitude` and `longitude`
    /// columns.
    #[must_use]
    pub fn has_coordinate_columns(&self) -> bool {
        let columns = self.columns();
        columns.contains(&"latitude") && columns.contains(&"longitude")
    }

    /// Finds the row for an address.
    #[must_use]
    pub fn row_for(&self, address: &str) -> Option<&ResultRow> {
        self.rows.iter().find(|r| r.address == address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn unit_square() -> Polygon<f64> {
        polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ]
    }

    #[test]
    fn accepts_simple_polygon() {
        let parcel = Parcel::new("p1", unit_square(), 1000.0, Some("RES".into()), None).unwrap();
        assert_eq!(parcel.id(), "p1");
        assert_eq!(parcel.zoning(), Some("RES"));
        assert!(parcel.land_use().is_none());
    }

    #[test]
    fn rejects_non_positive_area() {
        let err = Parcel::new("p1", unit_square(), 0.0, None, None).unwrap_err();
        assert_eq!(err, ParcelError::NonPositiveArea { area: 0.0 });
        assert!(Parcel::new("p1", unit_square(), f64::NAN, None, None).is_err());
    }

    #[test]
    fn rejects_degenerate_ring() {
        let line = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 0.0, y: 0.0),
        ];
        let err = Parcel::new("p1", line, 10.0, None, None).unwrap_err();
        assert_eq!(err, ParcelError::TooFewVertices { count: 2 });
    }

    #[test]
    fn rejects_bowtie() {
        let bowtie = polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 1.0, y: 0.0),
            (x: 0.0, y: 1.0),
            (x: 0.0, y: 0.0),
        ];
        let err = Parcel::new("p1", bowtie, 10.0, None, None).unwrap_err();
        assert_eq!(err, ParcelError::SelfIntersecting);
    }

    #[test]
    fn failure_serializes_without_probability() {
        let result = AnalysisResult::failure("1 Elm St", "Geocoding failed");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "address": "1 Elm St", "error": "Geocoding failed" })
        );
        assert!(!result.is_success());
        assert!(result.to_row().is_none());
    }

    #[test]
    fn success_flattens_to_row() {
        let features = FeatureVector {
            compactness: 0.78,
            density: 2000.0,
            height_variation: 1.0,
            zoning_code: Some("RES".into()),
            land_use: Some("SFR".into()),
        };
        let result =
            AnalysisResult::success("1 Elm St", Coordinates::new(33.2, -97.1), 0.75, features);
        let row = result.to_row().unwrap();
        assert!((row.hoa_probability - 0.75).abs() < f64::EPSILON);
        assert_eq!(row.coordinates(), Some(Coordinates::new(33.2, -97.1)));
        assert_eq!(row.zoning_code.as_deref(), Some("RES"));
    }

    #[test]
    fn empty_table_has_no_columns() {
        let table = ResultTable::default();
        assert!(table.columns().is_empty());
        assert!(!table.has_coordinate_columns());
    }
}
