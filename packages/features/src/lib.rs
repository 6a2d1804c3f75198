#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Geometry feature extraction for HOA scoring.
//!
//! Turns a [`Parcel`] and the buildings around it into a fixed
//! [`FeatureVector`]:
//!
//! - **compactness**: Polsby-Popper ratio `4π·area / perimeter²` of the
//!   parcel boundary (1.0 for a circle, π/4 for a square);
//! - **density**: buildings per square kilometer of recorded parcel area;
//! - **height variation**: population standard deviation of the building
//!   heights that are known;
//! - zoning and land-use codes, passed through unchanged.
//!
//! All functions are pure. Degenerate geometry is reported as a
//! [`FeatureError`] rather than producing `NaN` or infinity.

use std::f64::consts::PI;

use geo::{Area, LineString, Polygon};
use hoa_detect_parcel_models::{Building, FeatureVector, Parcel};
use thiserror::Error;

/// Square meters per square kilometer.
const M2_PER_KM2: f64 = 1_000_000.0;

/// Degenerate geometry that makes a feature undefined.
#[derive(Debug, Error, PartialEq)]
pub enum FeatureError {
    /// Compactness is undefined for a boundary with no length.
    #[error("Compactness is undefined: polygon perimeter is zero")]
    ZeroPerimeter,

    /// Density is undefined for a parcel without positive area.
    #[error("Density is undefined: parcel area must be positive, got {area}")]
    NonPositiveArea {
        /// The rejected area in square meters.
        area: f64,
    },
}

/// Computes the Polsby-Popper compactness of a polygon.
///
/// The perimeter includes interior rings.
///
/// # Errors
///
/// Returns [`FeatureError::ZeroPerimeter`] if the polygon has no length.
pub fn calculate_compactness(polygon: &Polygon<f64>) -> Result<f64, FeatureError> {
    let perimeter = perimeter(polygon);
    if perimeter <= 0.0 || !perimeter.is_finite() {
        return Err(FeatureError::ZeroPerimeter);
    }

    Ok(4.0 * PI * polygon.unsigned_area() / (perimeter * perimeter))
}

/// Computes building density in buildings per square kilometer.
///
/// # Errors
///
/// Returns [`FeatureError::NonPositiveArea`] if `parcel_area_m2` is zero,
/// negative, or not finite.
pub fn calculate_density(buildings: &[Building], parcel_area_m2: f64) -> Result<f64, FeatureError> {
    count_per_km2(buildings.len(), parcel_area_m2)
}

/// Converts a count over an area in square meters into a count per km².
///
/// # Errors
///
/// Returns [`FeatureError::NonPositiveArea`] if `area_m2` is not positive.
#[allow(clippy::cast_precision_loss)]
pub fn count_per_km2(count: usize, area_m2: f64) -> Result<f64, FeatureError> {
    if !area_m2.is_finite() || area_m2 <= 0.0 {
        return Err(FeatureError::NonPositiveArea { area: area_m2 });
    }

    Ok(count as f64 / (area_m2 / M2_PER_KM2))
}

/// Population standard deviation of building heights.
///
/// Buildings without a height are ignored. Returns 0 when no building
/// reports one.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn height_variation(buildings: &[Building]) -> f64 {
    let heights: Vec<f64> = buildings.iter().filter_map(|b| b.height).collect();
    if heights.is_empty() {
        return 0.0;
    }

    let n = heights.len() as f64;
    let mean = heights.iter().sum::<f64>() / n;
    let variance = heights.iter().map(|h| (h - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

/// Builds the feature vector for a parcel and its surrounding buildings.
///
/// # Errors
///
/// Returns [`FeatureError`] if the parcel boundary has zero perimeter or the
/// recorded area is not positive.
pub fn combine_features(
    parcel: &Parcel,
    buildings: &[Building],
) -> Result<FeatureVector, FeatureError> {
    let compactness = calculate_compactness(parcel.polygon())?;
    let density = calculate_density(buildings, parcel.area_m2())?;
    let height_variation = height_variation(buildings);

    log::trace!(
        "Parcel {}: compactness={compactness:.4} density={density:.2} height_variation={height_variation:.2}",
        parcel.id()
    );

    Ok(FeatureVector {
        compactness,
        density,
        height_variation,
        zoning_code: parcel.zoning().map(String::from),
        land_use: parcel.land_use().map(String::from),
    })
}

/// Total boundary length of a polygon, exterior and interior rings.
fn perimeter(polygon: &Polygon<f64>) -> f64 {
    ring_length(polygon.exterior()) + polygon.interiors().iter().map(ring_length).sum::<f64>()
}

fn ring_length(ring: &LineString<f64>) -> f64 {
    ring.lines().map(|line| line.dx().hypot(line.dy())).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{Coord, polygon};

    fn unit_square() -> Polygon<f64> {
        polygon![
            (x: 0.0, y: 0.0),
            (x: 1.0, y: 0.0),
            (x: 1.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ]
    }

    fn regular_polygon(sides: usize, radius: f64) -> Polygon<f64> {
        #[allow(clippy::cast_precision_loss)]
        let coords: Vec<Coord<f64>> = (0..sides)
            .map(|i| {
                let theta = 2.0 * PI * i as f64 / sides as f64;
                Coord {
                    x: radius * theta.cos(),
                    y: radius * theta.sin(),
                }
            })
            .collect();
        Polygon::new(LineString::from(coords), vec![])
    }

    #[test]
    fn unit_square_compactness_is_quarter_pi() {
        let c = calculate_compactness(&unit_square()).unwrap();
        assert!((c - PI / 4.0).abs() < 1e-9, "got {c}");
    }

    #[test]
    fn near_circle_approaches_one() {
        let c = calculate_compactness(&regular_polygon(360, 50.0)).unwrap();
        assert!(c > 0.999 && c <= 1.0, "got {c}");
    }

    #[test]
    fn elongated_shape_is_less_compact() {
        let strip = polygon![
            (x: 0.0, y: 0.0),
            (x: 100.0, y: 0.0),
            (x: 100.0, y: 1.0),
            (x: 0.0, y: 1.0),
        ];
        let strip_c = calculate_compactness(&strip).unwrap();
        let square_c = calculate_compactness(&unit_square()).unwrap();
        assert!(strip_c > 0.0);
        assert!(strip_c < square_c);
    }

    #[test]
    fn compactness_is_scale_invariant() {
        let small = calculate_compactness(&regular_polygon(6, 1.0)).unwrap();
        let large = calculate_compactness(&regular_polygon(6, 1000.0)).unwrap();
        assert!((small - large).abs() < 1e-9);
    }

    #[test]
    fn zero_perimeter_is_an_error() {
        let point = Polygon::new(LineString::from(vec![(2.0, 2.0), (2.0, 2.0), (2.0, 2.0)]), vec![]);
        assert_eq!(
            calculate_compactness(&point).unwrap_err(),
            FeatureError::ZeroPerimeter
        );
    }

    #[test]
    fn density_counts_per_square_kilometer() {
        let buildings = vec![Building::with_height(10.0), Building::with_height(15.0)];
        let d = calculate_density(&buildings, 10_000.0).unwrap();
        assert!((d - 200.0).abs() < 1e-9);
    }

    #[test]
    fn density_is_linear_in_count_and_inverse_in_area() {
        let one = vec![Building::default()];
        let four = vec![Building::default(); 4];
        let base = calculate_density(&one, 5_000.0).unwrap();
        assert!((calculate_density(&four, 5_000.0).unwrap() - 4.0 * base).abs() < 1e-9);
        assert!((calculate_density(&one, 10_000.0).unwrap() - base / 2.0).abs() < 1e-9);
    }

    #[test]
    fn zero_area_density_is_an_error() {
        let err = calculate_density(&[Building::default()], 0.0).unwrap_err();
        assert_eq!(err, FeatureError::NonPositiveArea { area: 0.0 });
        assert!(calculate_density(&[], -5.0).is_err());
    }

    #[test]
    fn height_variation_ignores_unknown_heights() {
        let buildings = vec![
            Building::with_height(10.0),
            Building::default(),
            Building::with_height(12.0),
        ];
        assert!((height_variation(&buildings) - 1.0).abs() < 1e-9);
        assert!(height_variation(&[Building::default()]).abs() < f64::EPSILON);
        assert!(height_variation(&[]).abs() < f64::EPSILON);
    }

    #[test]
    fn combine_features_is_deterministic() {
        let parcel = Parcel::new(
            "p1",
            unit_square(),
            1000.0,
            Some("RES".to_string()),
            Some("SFR".to_string()),
        )
        .unwrap();
        let buildings = vec![Building::with_height(10.0), Building::with_height(12.0)];

        let first = combine_features(&parcel, &buildings).unwrap();
        let second = combine_features(&parcel, &buildings).unwrap();
        assert_eq!(first, second);

        assert!((first.compactness - PI / 4.0).abs() < 1e-9);
        assert!((first.density - 2000.0).abs() < 1e-9);
        assert!((first.height_variation - 1.0).abs() < 1e-9);
        assert_eq!(first.zoning_code.as_deref(), Some("RES"));
        assert_eq!(first.land_use.as_deref(), Some("SFR"));
        assert_eq!(buildings.len(), 2);
    }
}
