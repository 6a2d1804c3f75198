//! Google Geocoding API client.
//!
//! Requires an API key. Every request issues
//! `GET {base_url}?address=...&key=...` and reads the first result.
//!
//! See <https://developers.google.com/maps/documentation/geocoding/requests-geocoding>

use std::time::Duration;

use async_trait::async_trait;
use hoa_detect_parcel_models::Coordinates;

use crate::{GeocodeError, GeocodedAddress, Geocoder, GeocodingProvider, address};

/// Default Geocoding API endpoint.
pub use hoa_detect_config::DEFAULT_GOOGLE_GEOCODE_URL as DEFAULT_BASE_URL;

/// Geocoder backed by the Google Geocoding API.
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GoogleGeocoder {
    /// Creates a client for `base_url` authenticating with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::MissingCredential`] if `api_key` is absent or
    /// blank, or [`GeocodeError::Http`] if the HTTP client cannot be built.
    pub fn new(
        api_key: Option<&str>,
        base_url: &str,
        request_timeout: Duration,
    ) -> Result<Self, GeocodeError> {
        let api_key = api_key
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or(GeocodeError::MissingCredential { provider: "Google" })?;

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
        })
    }
}

#[async_trait]
impl Geocoder for GoogleGeocoder {
    async fn lookup(&self, address: &str) -> Result<Option<GeocodedAddress>, GeocodeError> {
        let Some(query) = address::normalize(address) else {
            log::debug!("Google: skipping non-geocodable address '{address}'");
            return Ok(None);
        };

        let resp = self
            .client
            .get(&self.base_url)
            .query(&[("address", query.as_str()), ("key", self.api_key.as_str())])
            .send()
            .await?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(GeocodeError::RateLimited);
        }

        let body: serde_json::Value = resp.json().await?;
        parse_response(&body)
    }
}

/// Parses a Geocoding API JSON response.
fn parse_response(body: &serde_json::Value) -> Result<Option<GeocodedAddress>, GeocodeError> {
    let status = body["status"].as_str().ok_or_else(|| GeocodeError::Parse {
        message: "Google response missing status".to_string(),
    })?;

    match status {
        "OK" => {}
        "ZERO_RESULTS" => return Ok(None),
        "OVER_QUERY_LIMIT" => return Err(GeocodeError::RateLimited),
        other => {
            return Err(GeocodeError::Provider {
                status: other.to_string(),
                message: body["error_message"].as_str().unwrap_or_default().to_string(),
            });
        }
    }

    let Some(first) = body["results"].as_array().and_then(|r| r.first()) else {
        return Ok(None);
    };

    let lat = first
        .pointer("/geometry/location/lat")
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lat in Google response".to_string(),
        })?;
    let lng = first
        .pointer("/geometry/location/lng")
        .and_then(serde_json::Value::as_f64)
        .ok_or_else(|| GeocodeError::Parse {
            message: "Missing lng in Google response".to_string(),
        })?;

    let matched_address = first["formatted_address"].as_str().map(String::from);

    Ok(Some(GeocodedAddress {
        coordinates: Coordinates::new(lat, lng),
        matched_address,
        provider: GeocodingProvider::Google,
    }))
}
