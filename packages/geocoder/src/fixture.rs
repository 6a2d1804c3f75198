//! Deterministic geocoder for testing mode.
//!
//! Resolves addresses from a fixed table. Addresses missing from the table
//! fall back to an optional constant location, or resolve to `None`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use hoa_detect_parcel_models::Coordinates;

use crate::{GeocodeError, GeocodedAddress, Geocoder, GeocodingProvider, address};

/// Table-driven [`Geocoder`].
#[derive(Debug, Clone, Default)]
pub struct FixtureGeocoder {
    entries: BTreeMap<String, Coordinates>,
    fallback: Option<Coordinates>,
}

impl FixtureGeocoder {
    /// A geocoder that knows no addresses.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A geocoder that resolves every geocodable address to `coordinates`.
    #[must_use]
    pub fn constant(coordinates: Coordinates) -> Self {
        Self {
            entries: BTreeMap::new(),
            fallback: Some(coordinates),
        }
    }

    /// Adds an exact address entry (matched after normalization).
    #[must_use]
    pub fn with_entry(mut self, address: &str, coordinates: Coordinates) -> Self {
        if let Some(key) = address::normalize(address) {
            self.entries.insert(key.to_uppercase(), coordinates);
        }
        self
    }
}

#[async_trait]
impl Geocoder for FixtureGeocoder {
    async fn lookup(&self, address: &str) -> Result<Option<GeocodedAddress>, GeocodeError> {
        let Some(key) = address::normalize(address) else {
            return Ok(None);
        };

        let coordinates = self
            .entries
            .get(&key.to_uppercase())
            .copied()
            .or(self.fallback);

        Ok(coordinates.map(|coordinates| GeocodedAddress {
            coordinates,
            matched_address: Some(key),
            provider: GeocodingProvider::Fixture,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_known_address() {
        let geocoder = FixtureGeocoder::new().with_entry(
            "1600 Amphitheatre Parkway, Mountain View, CA",
            Coordinates::new(37.423_021, -122.083_739),
        );
        let coords = geocoder
            .geocode("1600  amphitheatre parkway, Mountain View, CA")
            .await
            .unwrap()
            .unwrap();
        assert!((coords.latitude - 37.423_021).abs() < 1e-9);
    }

    #[tokio::test]
    async fn unknown_address_is_none() {
        let geocoder = FixtureGeocoder::new();
        assert!(geocoder.geocode("Invalid Address").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn constant_fallback_skips_placeholders() {
        let geocoder = FixtureGeocoder::constant(Coordinates::new(0.5, 0.5));
        assert!(geocoder.geocode("123 Main St").await.unwrap().is_some());
        assert!(geocoder.geocode("").await.unwrap().is_none());
    }
}
