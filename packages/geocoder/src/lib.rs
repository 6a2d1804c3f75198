#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address geocoding for HOA analysis.
//!
//! Converts a free-text address to WGS84 coordinates behind the
//! [`Geocoder`] trait. Two providers are available:
//!
//! 1. **Google Geocoding API** ([`google::GoogleGeocoder`]): requires an
//!    API key; construction fails without one.
//! 2. **Fixture** ([`fixture::FixtureGeocoder`]): a deterministic lookup
//!    table used in testing mode.
//!
//! An address that cannot be found is `Ok(None)`, never an error. Errors
//! are reserved for transport and provider failures.

pub mod address;
pub mod fixture;
pub mod google;

use async_trait::async_trait;
use hoa_detect_parcel_models::Coordinates;
use thiserror::Error;

/// A geocoding result with coordinates and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct GeocodedAddress {
    pub coordinates: Coordinates,
    /// The matched/canonical address returned by the geocoder.
    pub matched_address: Option<String>,
    /// Which provider resolved this address.
    pub provider: GeocodingProvider,
}

/// Which geocoding provider resolved an address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeocodingProvider {
    /// Google Geocoding API.
    Google,
    /// Deterministic fixture table.
    Fixture,
}

/// Errors from geocoding operations.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// No API key was configured for a provider that requires one.
    #[error("Missing credential: {provider} API key not configured")]
    MissingCredential {
        /// Provider that needs the key.
        provider: &'static str,
    },

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response parsing failed.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of the parsing failure.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limit exceeded")]
    RateLimited,

    /// The provider rejected the request.
    #[error("Geocoder returned status {status}: {message}")]
    Provider {
        /// Provider status code (e.g. `REQUEST_DENIED`).
        status: String,
        /// Provider error message, if any.
        message: String,
    },
}

/// Maps a free-text address to coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Resolves an address with provider metadata.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] on transport or provider failure. An address
    /// that simply does not resolve is `Ok(None)`.
    async fn lookup(&self, address: &str) -> Result<Option<GeocodedAddress>, GeocodeError>;

    /// Resolves an address to its coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] on transport or provider failure.
    async fn geocode(&self, address: &str) -> Result<Option<Coordinates>, GeocodeError> {
        Ok(self.lookup(address).await?.map(|g| g.coordinates))
    }
}
