//! Readers for the three county inputs.
//!
//! - parcel boundaries from an ESRI shapefile (`.shp` + `.dbf`);
//! - building footprints from a `GeoJSON` `FeatureCollection`;
//! - address points from a CSV with `latitude` and `longitude` columns.
//!
//! Geometry is expected in WGS84 longitude/latitude. Parcel areas are
//! computed on the sphere so densities come out per km².

use std::path::Path;

use geo::{Area, ChamberlainDuquetteArea, Coord, LineString, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson, JsonValue};
use hoa_detect_parcel_models::{Building, Coordinates, Parcel};
use serde::Deserialize;
use shapefile::dbase::{FieldValue, Record};
use shapefile::{PolygonRing, Shape};

use crate::DatasetError;

/// Attribute names read from the parcel `.dbf`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParcelFields {
    pub id: String,
    pub zoning: String,
    pub land_use: String,
}

impl Default for ParcelFields {
    fn default() -> Self {
        Self {
            id: "id".to_string(),
            zoning: "zoning".to_string(),
            land_use: "land_use".to_string(),
        }
    }
}

/// Reads parcel polygons from a shapefile.
///
/// Records without a polygon shape or with an invalid boundary are
/// skipped with a warning. Records without an id attribute are identified
/// by their position in the file.
///
/// # Errors
///
/// Returns [`DatasetError::Shapefile`] if the file cannot be opened or a
/// record cannot be decoded.
pub fn read_parcels(path: &Path, fields: &ParcelFields) -> Result<Vec<Parcel>, DatasetError> {
    let mut reader = shapefile::Reader::from_path(path)?;
    let mut parcels = Vec::new();
    let mut skipped = 0_usize;

    for (index, item) in reader.iter_shapes_and_records().enumerate() {
        let (shape, record) = item?;
        let id = field_text(&record, &fields.id).unwrap_or_else(|| index.to_string());

        let Some(polygon) = shape_polygon(&shape) else {
            log::warn!("Skipping parcel {id}: not a polygon shape");
            skipped += 1;
            continue;
        };

        let area_m2 = polygon.chamberlain_duquette_unsigned_area();
        match Parcel::new(
            id.clone(),
            polygon,
            area_m2,
            field_text(&record, &fields.zoning),
            field_text(&record, &fields.land_use),
        ) {
            Ok(parcel) => parcels.push(parcel),
            Err(e) => {
                log::warn!("Skipping parcel {id}: {e}");
                skipped += 1;
            }
        }
    }

    log::info!(
        "Read {} parcels from {} ({skipped} skipped)",
        parcels.len(),
        path.display()
    );
    Ok(parcels)
}

/// Reads a `.dbf` attribute as trimmed text. Numeric ids without a
/// fractional part are rendered as integers.
fn field_text(record: &Record, name: &str) -> Option<String> {
    let text = match record.get(name)? {
        FieldValue::Character(Some(s)) => s.trim().to_string(),
        FieldValue::Numeric(Some(n)) if n.fract().abs() < f64::EPSILON => format!("{n:.0}"),
        FieldValue::Numeric(Some(n)) => n.to_string(),
        FieldValue::Integer(i) => i.to_string(),
        _ => return None,
    };
    Some(text).filter(|t| !t.is_empty())
}

fn shape_polygon(shape: &Shape) -> Option<Polygon<f64>> {
    match shape {
        Shape::Polygon(p) => rings_polygon(p.rings(), |pt| Coord { x: pt.x, y: pt.y }),
        Shape::PolygonM(p) => rings_polygon(p.rings(), |pt| Coord { x: pt.x, y: pt.y }),
        Shape::PolygonZ(p) => rings_polygon(p.rings(), |pt| Coord { x: pt.x, y: pt.y }),
        _ => None,
    }
}

/// Assembles shapefile rings into polygons, each outer ring owning the
/// inner rings that follow it, and keeps the largest.
fn rings_polygon<P>(
    rings: &[PolygonRing<P>],
    xy: impl Fn(&P) -> Coord<f64>,
) -> Option<Polygon<f64>> {
    let mut polygons = Vec::new();
    let mut exterior: Option<LineString<f64>> = None;
    let mut holes = Vec::new();

    for ring in rings {
        let line: LineString<f64> = ring.points().iter().map(&xy).collect();
        match ring {
            PolygonRing::Outer(_) => {
                if let Some(previous) = exterior.replace(line) {
                    polygons.push(Polygon::new(previous, std::mem::take(&mut holes)));
                }
            }
            PolygonRing::Inner(_) => holes.push(line),
        }
    }
    if let Some(last) = exterior {
        polygons.push(Polygon::new(last, holes));
    }

    polygons
        .into_iter()
        .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
}

/// Reads building footprints from a `GeoJSON` `FeatureCollection`.
///
/// Recognized properties are `type` (e.g. `pool`, `park`), `roof_type`
/// and `height` (number or numeric string). Features whose geometry is not
/// a polygon keep their tags but have no footprint.
///
/// # Errors
///
/// Returns [`DatasetError`] if the file cannot be read or is not a
/// `FeatureCollection`.
pub fn read_buildings(path: &Path) -> Result<Vec<Building>, DatasetError> {
    let contents = std::fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let collection = FeatureCollection::try_from(contents.parse::<GeoJson>()?)?;

    let buildings: Vec<Building> = collection.features.into_iter().map(feature_building).collect();
    let with_footprint = buildings.iter().filter(|b| b.footprint.is_some()).count();

    log::info!(
        "Read {} buildings from {} ({with_footprint} with footprints)",
        buildings.len(),
        path.display()
    );
    Ok(buildings)
}

fn feature_building(mut feature: Feature) -> Building {
    let text = |key: &str| {
        feature
            .property(key)
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
    };

    let kind = text("type");
    let roof_type = text("roof_type");
    let height = feature.property("height").and_then(|v| {
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
    });

    let footprint = feature
        .geometry
        .take()
        .and_then(|g| geo::Geometry::<f64>::try_from(g).ok())
        .and_then(|g| match g {
            geo::Geometry::Polygon(p) => Some(p),
            geo::Geometry::MultiPolygon(mp) => mp
                .0
                .into_iter()
                .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area())),
            _ => None,
        });

    Building {
        footprint,
        height,
        roof_type,
        kind,
    }
}

#[derive(Deserialize)]
struct AddressRecord {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// Reads address points from a CSV. Rows with a blank coordinate are
/// skipped.
///
/// # Errors
///
/// Returns [`DatasetError`] if the file cannot be parsed or lacks a
/// `latitude` or `longitude` column.
pub fn read_addresses(path: &Path) -> Result<Vec<Coordinates>, DatasetError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers = reader.headers()?.clone();
    for column in ["latitude", "longitude"] {
        if !headers.iter().any(|h| h == column) {
            return Err(DatasetError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }

    let mut addresses = Vec::new();
    for record in reader.deserialize::<AddressRecord>() {
        if let AddressRecord {
            latitude: Some(latitude),
            longitude: Some(longitude),
        } = record?
        {
            addresses.push(Coordinates::new(latitude, longitude));
        }
    }

    log::info!("Read {} address points from {}", addresses.len(), path.display());
    Ok(addresses)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn reads_building_tags_and_footprints() {
        let collection = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[
                            [0.1, 0.1], [0.2, 0.1], [0.2, 0.2], [0.1, 0.2], [0.1, 0.1]
                        ]]
                    },
                    "properties": { "type": "pool", "roof_type": "flat", "height": "4.5" }
                },
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [0.5, 0.5] },
                    "properties": { "type": "park" }
                }
            ]
        });
        let path = temp_file("hoa_detect_buildings.geojson", &collection.to_string());

        let buildings = read_buildings(&path).unwrap();
        assert_eq!(buildings.len(), 2);
        assert!(buildings[0].is_kind("pool"));
        assert_eq!(buildings[0].roof_type.as_deref(), Some("flat"));
        assert_eq!(buildings[0].height, Some(4.5));
        assert!(buildings[0].footprint.is_some());
        assert!(buildings[1].is_kind("park"));
        assert!(buildings[1].footprint.is_none());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn reads_address_points_skipping_blanks() {
        let path = temp_file(
            "hoa_detect_addresses.csv",
            "street,latitude,longitude\n1 A St,0.5,0.5\n2 B St,,\n3 C St,1.5,2.5\n",
        );

        let addresses = read_addresses(&path).unwrap();
        assert_eq!(
            addresses,
            vec![Coordinates::new(0.5, 0.5), Coordinates::new(1.5, 2.5)]
        );

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn address_file_needs_coordinate_columns() {
        let path = temp_file("hoa_detect_addresses_bad.csv", "street,lat\n1 A St,0.5\n");
        let err = read_addresses(&path).unwrap_err();
        assert!(matches!(
            err,
            DatasetError::MissingColumn {
                column: "longitude",
                ..
            } | DatasetError::MissingColumn {
                column: "latitude",
                ..
            }
        ));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn outer_rings_take_following_holes() {
        let ring = |pts: &[(f64, f64)]| {
            pts.iter()
                .map(|&(x, y)| shapefile::Point::new(x, y))
                .collect::<Vec<_>>()
        };
        let square = |x0: f64, y0: f64, side: f64| {
            ring(&[
                (x0, y0),
                (x0, y0 + side),
                (x0 + side, y0 + side),
                (x0 + side, y0),
                (x0, y0),
            ])
        };
        let rings = vec![
            PolygonRing::Outer(square(0.0, 0.0, 4.0)),
            PolygonRing::Inner(square(1.0, 1.0, 1.0)),
            PolygonRing::Outer(square(9.0, 9.0, 1.0)),
        ];

        let polygon = rings_polygon(&rings, |pt| Coord { x: pt.x, y: pt.y }).unwrap();
        assert_eq!(polygon.interiors().len(), 1);
        assert!((polygon.unsigned_area() - 15.0).abs() < 1e-9);
    }
}
