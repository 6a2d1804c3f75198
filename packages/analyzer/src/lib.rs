#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HOA analysis for one address or a whole county.
//!
//! An [`Analyzer`] owns one geocoder, one parcel gateway and one classifier
//! and turns an address into an [`AnalysisResult`] in a single pass:
//! geocode, fetch the containing parcel and nearby buildings, extract
//! features, score. Failures at any step become an error result for that
//! address and never escape [`Analyzer::analyze_address`].
//!
//! [`batch::process_county`] fans a list of addresses out over a pool of
//! independent analyzers. [`county::analyze_county`] wraps it with CSV
//! input and `GeoJSON` export.

pub mod batch;
pub mod county;
pub mod progress;

use std::sync::Arc;
use std::time::Duration;

use hoa_detect_classifier::fixed::FixedClassifier;
use hoa_detect_classifier::logistic::LogisticModel;
use hoa_detect_classifier::rule::RuleClassifier;
use hoa_detect_classifier::{Classifier, ClassifierError, ModelError};
use hoa_detect_config::{
    AppConfig, ClassifierBackend, ConfigError, GatewayBackend, GeocoderBackend,
};
use hoa_detect_features::FeatureError;
use hoa_detect_gateway::fixture::FixtureGateway;
use hoa_detect_gateway::store::DuckDbGateway;
use hoa_detect_gateway::{GatewayError, ParcelGateway};
use hoa_detect_geocoder::fixture::FixtureGeocoder;
use hoa_detect_geocoder::google::GoogleGeocoder;
use hoa_detect_geocoder::{GeocodeError, Geocoder};
use hoa_detect_parcel_models::{AnalysisResult, Coordinates, ParcelError};
use thiserror::Error;

/// Error message of a result whose address did not geocode.
pub const GEOCODING_FAILED: &str = "Geocoding failed";

/// Errors constructing the analysis system. These stop startup.
#[derive(Debug, Error)]
pub enum SystemError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Geocoder(#[from] GeocodeError),

    #[error("Invalid fixture parcel: {0}")]
    Parcel(#[from] ParcelError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// A failure analyzing one address.
#[derive(Debug, Error)]
enum AnalysisError {
    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// Single-address analysis pipeline.
#[derive(Clone)]
pub struct Analyzer {
    geocoder: Arc<dyn Geocoder>,
    gateway: Arc<dyn ParcelGateway>,
    classifier: Arc<dyn Classifier>,
    buffer_radius_m: f64,
}

impl std::fmt::Debug for Analyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyzer")
            .field("buffer_radius_m", &self.buffer_radius_m)
            .finish_non_exhaustive()
    }
}

impl Analyzer {
    #[must_use]
    pub fn new(
        geocoder: Arc<dyn Geocoder>,
        gateway: Arc<dyn ParcelGateway>,
        classifier: Arc<dyn Classifier>,
        buffer_radius_m: f64,
    ) -> Self {
        Self {
            geocoder,
            gateway,
            classifier,
            buffer_radius_m,
        }
    }

    /// Builds the backends selected by `config`.
    ///
    /// # Errors
    ///
    /// Returns [`SystemError`] if the geocoder has no credential, the parcel
    /// store cannot be opened, or the model file cannot be loaded.
    pub fn from_config(config: &AppConfig) -> Result<Self, SystemError> {
        let geocoder: Arc<dyn Geocoder> = match &config.geocoder {
            GeocoderBackend::Google {
                api_key,
                base_url,
                request_timeout_secs,
            } => Arc::new(GoogleGeocoder::new(
                api_key.as_deref(),
                base_url,
                Duration::from_secs(*request_timeout_secs),
            )?),
            GeocoderBackend::Fixture {
                latitude,
                longitude,
            } => Arc::new(FixtureGeocoder::constant(Coordinates::new(
                *latitude, *longitude,
            ))),
        };

        let gateway: Arc<dyn ParcelGateway> = match &config.gateway.backend {
            GatewayBackend::DuckDb { path } => Arc::new(DuckDbGateway::load(path)?),
            GatewayBackend::Fixture => Arc::new(FixtureGateway::new()?),
        };

        let classifier: Arc<dyn Classifier> = match &config.classifier {
            ClassifierBackend::Logistic { model_path } => {
                Arc::new(LogisticModel::load(model_path)?)
            }
            ClassifierBackend::Fixed { probability } => {
                Arc::new(FixedClassifier::new(*probability)?)
            }
            ClassifierBackend::Rule => Arc::new(RuleClassifier::default()),
        };

        Ok(Self::new(
            geocoder,
            gateway,
            classifier,
            config.gateway.buffer_radius_m,
        ))
    }

    /// Analyzes one address.
    ///
    /// Never fails: an address that does not geocode yields
    /// [`GEOCODING_FAILED`], and any other failure yields its message.
    pub async fn analyze_address(&self, address: &str) -> AnalysisResult {
        match self.run(address).await {
            Ok(Some(result)) => result,
            Ok(None) => {
                log::debug!("No geocoding match for '{address}'");
                AnalysisResult::failure(address, GEOCODING_FAILED)
            }
            Err(e) => {
                log::warn!("Analysis failed for '{address}': {e}");
                AnalysisResult::failure(address, e.to_string())
            }
        }
    }

    async fn run(&self, address: &str) -> Result<Option<AnalysisResult>, AnalysisError> {
        let Some(coordinates) = self.geocoder.geocode(address).await? else {
            return Ok(None);
        };

        let parcel = self.gateway.parcel_at(coordinates)?;
        let buildings = self
            .gateway
            .buildings_within(coordinates, self.buffer_radius_m)?;

        let features = hoa_detect_features::combine_features(&parcel, &buildings)?;
        let probability = hoa_detect_classifier::hoa_probability(&*self.classifier, &features)?;

        log::debug!(
            "'{address}' -> parcel {} ({} buildings), p(HOA)={probability:.3}",
            parcel.id(),
            buildings.len()
        );

        Ok(Some(AnalysisResult::success(
            address,
            coordinates,
            probability,
            features,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use hoa_detect_geocoder::GeocodedAddress;
    use hoa_detect_parcel_models::{Building, FeatureVector, Parcel};

    struct FailingGeocoder;

    /// Knows no parcels.
    struct EmptyGateway;

    impl ParcelGateway for EmptyGateway {
        fn parcel_at(&self, point: Coordinates) -> Result<Parcel, GatewayError> {
            Err(GatewayError::ParcelNotFound {
                latitude: point.latitude,
                longitude: point.longitude,
            })
        }

        fn buildings_within(&self, _: Coordinates, _: f64) -> Result<Vec<Building>, GatewayError> {
            Ok(Vec::new())
        }
    }

    /// Returns probabilities that do not sum to one.
    struct SkewedClassifier;

    impl Classifier for SkewedClassifier {
        fn predict_proba(&self, _: &FeatureVector) -> Result<[f64; 2], ClassifierError> {
            Ok([0.9, 0.9])
        }
    }

    #[async_trait]
    impl Geocoder for FailingGeocoder {
        async fn lookup(&self, _: &str) -> Result<Option<GeocodedAddress>, GeocodeError> {
            Err(GeocodeError::RateLimited)
        }
    }

    fn fixture_analyzer(geocoder: Arc<dyn Geocoder>) -> Analyzer {
        Analyzer::new(
            geocoder,
            Arc::new(FixtureGateway::new().unwrap()),
            Arc::new(FixedClassifier::fixture()),
            hoa_detect_gateway::DEFAULT_BUFFER_RADIUS_M,
        )
    }

    #[tokio::test]
    async fn fixture_pipeline_scores_address() {
        let analyzer = Analyzer::from_config(&AppConfig::testing()).unwrap();
        let result = analyzer.analyze_address("123 Main St, Denton, TX").await;

        assert!(result.is_success());
        assert!((result.hoa_probability.unwrap() - 0.75).abs() < f64::EPSILON);
        let features = result.features.unwrap();
        assert!((features.compactness - std::f64::consts::FRAC_PI_4).abs() < 1e-9);
        assert!((features.density - 2000.0).abs() < 1e-9);
        assert!((features.height_variation - 1.0).abs() < 1e-9);
        assert_eq!(features.zoning_code.as_deref(), Some("RES"));
    }

    #[tokio::test]
    async fn unresolved_address_serializes_as_geocoding_failure() {
        let analyzer = fixture_analyzer(Arc::new(FixtureGeocoder::new()));
        let result = analyzer.analyze_address("Invalid Address").await;

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "address": "Invalid Address", "error": "Geocoding failed" })
        );
    }

    #[tokio::test]
    async fn geocoder_error_becomes_result_error() {
        let analyzer = fixture_analyzer(Arc::new(FailingGeocoder));
        let result = analyzer.analyze_address("123 Main St").await;

        assert!(!result.is_success());
        assert_eq!(result.error.as_deref(), Some("Rate limit exceeded"));
        assert!(result.hoa_probability.is_none());
    }

    #[tokio::test]
    async fn missing_parcel_becomes_result_error() {
        let analyzer = Analyzer::new(
            Arc::new(FixtureGeocoder::constant(Coordinates::new(0.5, 0.25))),
            Arc::new(EmptyGateway),
            Arc::new(FixedClassifier::fixture()),
            hoa_detect_gateway::DEFAULT_BUFFER_RADIUS_M,
        );
        let result = analyzer.analyze_address("9 Nowhere Rd").await;

        assert_eq!(result.address, "9 Nowhere Rd");
        assert_eq!(result.error.as_deref(), Some("No parcel found at (0.5, 0.25)"));
        assert!(result.hoa_probability.is_none());
        assert!(result.features.is_none());
    }

    #[tokio::test]
    async fn invalid_distribution_becomes_result_error() {
        let analyzer = Analyzer::new(
            Arc::new(FixtureGeocoder::constant(Coordinates::new(0.5, 0.5))),
            Arc::new(FixtureGateway::new().unwrap()),
            Arc::new(SkewedClassifier),
            hoa_detect_gateway::DEFAULT_BUFFER_RADIUS_M,
        );
        let result = analyzer.analyze_address("123 Main St").await;

        assert!(!result.is_success());
        assert!(
            result
                .error
                .as_deref()
                .is_some_and(|e| e.starts_with("Classifier returned an invalid distribution"))
        );
        assert!(result.hoa_probability.is_none());
    }

    #[test]
    fn missing_api_key_fails_construction() {
        let config = AppConfig {
            geocoder: GeocoderBackend::Google {
                api_key: None,
                base_url: hoa_detect_geocoder::google::DEFAULT_BASE_URL.to_string(),
                request_timeout_secs: 10,
            },
            ..AppConfig::testing()
        };
        let err = Analyzer::from_config(&config).unwrap_err();
        assert!(matches!(
            err,
            SystemError::Geocoder(GeocodeError::MissingCredential { .. })
        ));
    }
}
