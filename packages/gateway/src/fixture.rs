//! Deterministic gateway for testing mode.
//!
//! Every point resolves to the same parcel: a unit square recorded as
//! 1000 m², zoned `RES` with land use `SFR`, surrounded by two buildings
//! of 10 m and 12 m.

use geo::polygon;
use hoa_detect_parcel_models::{Building, Coordinates, Parcel, ParcelError};

use crate::{GatewayError, ParcelGateway, validate_radius};

/// Fixed-response [`ParcelGateway`].
#[derive(Debug, Clone)]
pub struct FixtureGateway {
    parcel: Parcel,
    buildings: Vec<Building>,
}

impl FixtureGateway {
    /// The default fixture parcel and buildings.
    ///
    /// # Errors
    ///
    /// Returns [`ParcelError`] if the fixture parcel fails validation.
    pub fn new() -> Result<Self, ParcelError> {
        let parcel = Parcel::new(
            "fixture",
            polygon![
                (x: 0.0, y: 0.0),
                (x: 1.0, y: 0.0),
                (x: 1.0, y: 1.0),
                (x: 0.0, y: 1.0),
            ],
            1000.0,
            Some("RES".to_string()),
            Some("SFR".to_string()),
        )?;

        Ok(Self::with_data(
            parcel,
            vec![Building::with_height(10.0), Building::with_height(12.0)],
        ))
    }

    /// A fixture serving the given parcel and buildings.
    #[must_use]
    pub const fn with_data(parcel: Parcel, buildings: Vec<Building>) -> Self {
        Self { parcel, buildings }
    }
}

impl ParcelGateway for FixtureGateway {
    fn parcel_at(&self, _point: Coordinates) -> Result<Parcel, GatewayError> {
        Ok(self.parcel.clone())
    }

    fn buildings_within(
        &self,
        _point: Coordinates,
        radius_m: f64,
    ) -> Result<Vec<Building>, GatewayError> {
        validate_radius(radius_m)?;
        Ok(self.buildings.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serves_fixed_parcel() {
        let gateway = FixtureGateway::new().unwrap();
        let parcel = gateway.parcel_at(Coordinates::new(12.0, 34.0)).unwrap();
        assert!((parcel.area_m2() - 1000.0).abs() < f64::EPSILON);
        assert_eq!(parcel.zoning(), Some("RES"));
        assert_eq!(parcel.land_use(), Some("SFR"));

        let buildings = gateway
            .buildings_within(Coordinates::new(12.0, 34.0), 100.0)
            .unwrap();
        let heights: Vec<f64> = buildings.iter().filter_map(|b| b.height).collect();
        assert_eq!(heights, vec![10.0, 12.0]);
    }
}
