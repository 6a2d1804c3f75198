//! `DuckDB`-backed parcel and footprint store.
//!
//! Parcels and building footprints are stored with their `GeoJSON`
//! geometry as plain TEXT in WGS84. At construction the gateway loads both
//! tables into R-tree indexes; lookups never touch the database again, so
//! one gateway per worker is cheap to share across that worker's tasks.

use std::path::Path;

use duckdb::Connection;
use geo::{Closest, ClosestPoint, Contains, Distance, Haversine, Point, Polygon};
use hoa_detect_parcel_models::{Building, Coordinates, Parcel};
use rstar::{AABB, RTree, RTreeObject};

use crate::{
    GatewayError, ParcelGateway, buffer_envelope, parse_geojson_polygon, polygon_envelope,
    validate_radius,
};

/// A parcel stored in the R-tree.
struct ParcelEntry {
    envelope: AABB<[f64; 2]>,
    parcel: Parcel,
}

impl RTreeObject for ParcelEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// A building footprint stored in the R-tree.
struct BuildingEntry {
    envelope: AABB<[f64; 2]>,
    footprint: Polygon<f64>,
    building: Building,
}

impl RTreeObject for BuildingEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Creates the `parcels` and `buildings` tables if missing.
///
/// # Errors
///
/// Returns [`GatewayError`] if the DDL fails.
pub fn create_schema(conn: &Connection) -> Result<(), GatewayError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS parcels (
            parcel_id TEXT PRIMARY KEY,
            boundary_geojson TEXT NOT NULL,
            area_m2 DOUBLE,
            zoning TEXT,
            land_use TEXT
        );

        CREATE TABLE IF NOT EXISTS buildings (
            building_id TEXT PRIMARY KEY,
            footprint_geojson TEXT NOT NULL,
            height DOUBLE,
            roof_type TEXT,
            building_type TEXT
        );",
    )?;
    Ok(())
}

/// In-memory spatial indexes over a parcel store.
pub struct DuckDbGateway {
    parcels: RTree<ParcelEntry>,
    buildings: RTree<BuildingEntry>,
}

impl DuckDbGateway {
    /// Opens the store at `path` and loads it into memory.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the database cannot be opened or queried.
    pub fn load(path: &Path) -> Result<Self, GatewayError> {
        let conn = Connection::open(path)?;
        Self::from_connection(&conn)
    }

    /// Loads parcels and buildings from an open connection.
    ///
    /// Rows with unparseable geometry or invalid parcel shapes are skipped
    /// with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError`] if the queries fail.
    pub fn from_connection(conn: &Connection) -> Result<Self, GatewayError> {
        let parcels = Self::load_parcels(conn)?;
        log::info!("Loaded {} parcels into spatial index", parcels.size());

        let buildings = Self::load_buildings(conn)?;
        log::info!("Loaded {} building footprints into spatial index", buildings.size());

        Ok(Self { parcels, buildings })
    }

    fn load_parcels(conn: &Connection) -> Result<RTree<ParcelEntry>, GatewayError> {
        let mut stmt = conn.prepare(
            "SELECT parcel_id, boundary_geojson, area_m2, zoning, land_use FROM parcels",
        )?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();

        while let Some(row) = rows.next()? {
            let parcel_id: String = row.get(0)?;
            let geojson_str: String = row.get(1)?;
            let area_m2: Option<f64> = row.get(2)?;
            let zoning: Option<String> = row.get(3)?;
            let land_use: Option<String> = row.get(4)?;

            let Some(polygon) = parse_geojson_polygon(&geojson_str) else {
                log::warn!("Failed to parse GeoJSON for parcel {parcel_id}");
                continue;
            };
            let Some(area_m2) = area_m2 else {
                log::warn!("Parcel {parcel_id} has no recorded area");
                continue;
            };

            let envelope = polygon_envelope(&polygon);
            match Parcel::new(parcel_id.as_str(), polygon, area_m2, zoning, land_use) {
                Ok(parcel) => entries.push(ParcelEntry { envelope, parcel }),
                Err(e) => log::warn!("Skipping parcel {parcel_id}: {e}"),
            }
        }

        Ok(RTree::bulk_load(entries))
    }

    fn load_buildings(conn: &Connection) -> Result<RTree<BuildingEntry>, GatewayError> {
        let mut stmt = conn.prepare(
            "SELECT building_id, footprint_geojson, height, roof_type, building_type \
             FROM buildings",
        )?;
        let mut rows = stmt.query([])?;
        let mut entries = Vec::new();

        while let Some(row) = rows.next()? {
            let building_id: String = row.get(0)?;
            let geojson_str: String = row.get(1)?;

            let Some(footprint) = parse_geojson_polygon(&geojson_str) else {
                log::warn!("Failed to parse GeoJSON for building {building_id}");
                continue;
            };

            let building = Building {
                footprint: Some(footprint.clone()),
                height: row.get(2)?,
                roof_type: row.get(3)?,
                kind: row.get(4)?,
            };

            entries.push(BuildingEntry {
                envelope: polygon_envelope(&footprint),
                footprint,
                building,
            });
        }

        Ok(RTree::bulk_load(entries))
    }
}

impl ParcelGateway for DuckDbGateway {
    /// Parcels can overlap (condo regimes, data errors); the smallest
    /// containing parcel wins.
    fn parcel_at(&self, point: Coordinates) -> Result<Parcel, GatewayError> {
        let query_point = Point::new(point.longitude, point.latitude);
        let query_env = AABB::from_point([point.longitude, point.latitude]);

        let mut best: Option<&ParcelEntry> = None;
        for entry in self.parcels.locate_in_envelope_intersecting(&query_env) {
            if entry.parcel.polygon().contains(&query_point) {
                match best {
                    None => best = Some(entry),
                    Some(current) if entry.parcel.area_m2() < current.parcel.area_m2() => {
                        best = Some(entry);
                    }
                    _ => {}
                }
            }
        }

        best.map(|e| e.parcel.clone())
            .ok_or(GatewayError::ParcelNotFound {
                latitude: point.latitude,
                longitude: point.longitude,
            })
    }

    fn buildings_within(
        &self,
        point: Coordinates,
        radius_m: f64,
    ) -> Result<Vec<Building>, GatewayError> {
        validate_radius(radius_m)?;

        let origin = Point::new(point.longitude, point.latitude);
        let query_env = buffer_envelope(point, radius_m);

        let buildings = self
            .buildings
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| distance_to_footprint_m(origin, &entry.footprint) <= radius_m)
            .map(|entry| entry.building.clone())
            .collect();

        Ok(buildings)
    }
}

/// Geodesic distance from `origin` to the nearest point of `footprint`.
///
/// Zero when the point lies inside the footprint.
fn distance_to_footprint_m(origin: Point<f64>, footprint: &Polygon<f64>) -> f64 {
    match footprint.closest_point(&origin) {
        Closest::Intersection(_) => 0.0,
        Closest::SinglePoint(nearest) => Haversine.distance(origin, nearest),
        Closest::Indeterminate => f64::INFINITY,
    }
}
