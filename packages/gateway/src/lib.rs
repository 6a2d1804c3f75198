#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parcel and building lookups for a geocoded point.
//!
//! The [`ParcelGateway`] trait answers two read-only queries:
//!
//! - which parcel contains a point (point-in-polygon);
//! - which buildings lie within a buffer radius of a point (geodesic
//!   distance to the closest point of each footprint).
//!
//! [`store::DuckDbGateway`] loads parcels and footprints from a `DuckDB`
//! store into R-tree indexes. [`fixture::FixtureGateway`] serves a fixed
//! parcel and building set for deterministic runs.

pub mod fixture;
pub mod store;

use geo::{Area, BoundingRect, MultiPolygon, Polygon};
use geojson::GeoJson;
use hoa_detect_parcel_models::{Building, Coordinates, Parcel};
use rstar::AABB;
use thiserror::Error;

/// Default building search radius around a geocoded point, in meters.
pub const DEFAULT_BUFFER_RADIUS_M: f64 = 100.0;

/// Meters per degree of latitude (mean).
const METERS_PER_DEGREE: f64 = 111_320.0;

/// Errors from parcel/building lookups.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Database query or connection error.
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    /// No parcel contains the query point.
    #[error("No parcel found at ({latitude}, {longitude})")]
    ParcelNotFound {
        /// Query latitude.
        latitude: f64,
        /// Query longitude.
        longitude: f64,
    },

    /// The buffer radius is negative or not a number.
    #[error("Invalid buffer radius: {radius_m}")]
    InvalidRadius {
        /// Rejected radius in meters.
        radius_m: f64,
    },
}

/// Read-only access to parcel boundaries and building footprints.
pub trait ParcelGateway: Send + Sync {
    /// Returns the parcel containing `point`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::ParcelNotFound`] if no parcel contains the
    /// point, or another [`GatewayError`] if the lookup fails.
    fn parcel_at(&self, point: Coordinates) -> Result<Parcel, GatewayError>;

    /// Returns the buildings within `radius_m` meters of `point`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the radius is invalid or the lookup fails.
    fn buildings_within(
        &self,
        point: Coordinates,
        radius_m: f64,
    ) -> Result<Vec<Building>, GatewayError>;
}

/// Parse a `GeoJSON` geometry string into a single [`Polygon`].
///
/// `MultiPolygon` geometries resolve to their largest member.
#[must_use]
pub fn parse_geojson_polygon(geojson_str: &str) -> Option<Polygon<f64>> {
    let geojson: GeoJson = geojson_str.parse().ok()?;
    let GeoJson::Geometry(geom) = geojson else {
        return None;
    };
    let geo_geom: geo::Geometry<f64> = geom.try_into().ok()?;
    match geo_geom {
        geo::Geometry::Polygon(p) => Some(p),
        geo::Geometry::MultiPolygon(mp) => largest_polygon(mp),
        _ => None,
    }
}

fn largest_polygon(mp: MultiPolygon<f64>) -> Option<Polygon<f64>> {
    mp.0.into_iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
}

/// Compute the bounding box envelope for a [`Polygon`].
fn polygon_envelope(polygon: &Polygon<f64>) -> AABB<[f64; 2]> {
    polygon.bounding_rect().map_or_else(
        || AABB::from_point([0.0, 0.0]),
        |rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]),
    )
}

/// Degree-space envelope covering a `radius_m` circle around `point`.
fn buffer_envelope(point: Coordinates, radius_m: f64) -> AABB<[f64; 2]> {
    let dlat = radius_m / METERS_PER_DEGREE;
    let cos_lat = point.latitude.to_radians().cos().abs().max(1e-6);
    let dlon = radius_m / (METERS_PER_DEGREE * cos_lat);
    AABB::from_corners(
        [point.longitude - dlon, point.latitude - dlat],
        [point.longitude + dlon, point.latitude + dlat],
    )
}

fn validate_radius(radius_m: f64) -> Result<(), GatewayError> {
    if radius_m.is_finite() && radius_m >= 0.0 {
        Ok(())
    } else {
        Err(GatewayError::InvalidRadius { radius_m })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_polygon_geojson() {
        let p = parse_geojson_polygon(
            r#"{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}"#,
        )
        .unwrap();
        assert!((p.unsigned_area() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn multipolygon_resolves_to_largest_member() {
        let p = parse_geojson_polygon(
            r#"{"type":"MultiPolygon","coordinates":[
                [[[0,0],[1,0],[1,1],[0,1],[0,0]]],
                [[[5,5],[8,5],[8,8],[5,8],[5,5]]]
            ]}"#,
        )
        .unwrap();
        assert!((p.unsigned_area() - 9.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_non_polygon_geojson() {
        assert!(parse_geojson_polygon(r#"{"type":"Point","coordinates":[0,0]}"#).is_none());
        assert!(parse_geojson_polygon("not json").is_none());
    }

    #[test]
    fn buffer_envelope_widens_with_latitude() {
        let equator = buffer_envelope(Coordinates::new(0.0, 0.0), 100.0);
        let north = buffer_envelope(Coordinates::new(60.0, 0.0), 100.0);
        let width = |e: &AABB<[f64; 2]>| e.upper()[0] - e.lower()[0];
        assert!(width(&north) > width(&equator) * 1.9);
    }
}
