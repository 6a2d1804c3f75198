#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Configuration for the HOA detection pipeline.
//!
//! An [`AppConfig`] is loaded once at startup from an optional TOML file
//! and then adjusted by environment variables:
//!
//! | Variable | Effect |
//! |---|---|
//! | `GOOGLE_API_KEY` | API key for the Google geocoder |
//! | `MODEL_PATH` | Logistic model file |
//! | `HOA_DETECT_DB` | Parcel store (`DuckDB`) path |
//! | `HOA_DETECT_TESTING` | Switches every backend to its fixture |
//!
//! The resulting value is immutable and passed by reference to the
//! constructors that need it.
//!
//! ```toml
//! [geocoder]
//! type = "google"
//! request_timeout_secs = 10
//!
//! [gateway]
//! buffer_radius_m = 100.0
//!
//! [gateway.backend]
//! type = "duckdb"
//! path = "data/hoa_detect.duckdb"
//!
//! [classifier]
//! type = "logistic"
//! model_path = "models/hoa_model.json"
//!
//! [batch]
//! max_workers = 4
//! task_timeout_secs = 120
//! ```

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Config file looked up in the working directory when none is given.
pub const DEFAULT_CONFIG_FILE: &str = "hoa_detect.toml";

/// Google Geocoding API endpoint.
pub const DEFAULT_GOOGLE_GEOCODE_URL: &str = "https://maps.googleapis.com/maps/api/geocode/json";

/// Directory for dated `GeoJSON` exports.
pub const DEFAULT_OUTPUT_DIR: &str = "output/qgis_exports";

/// Coordinates the fixture geocoder resolves every address to (Denton, TX).
pub const FIXTURE_LATITUDE: f64 = 33.2148;
pub const FIXTURE_LONGITUDE: f64 = -97.1331;

/// Errors loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config {path}: {source}")]
    Read {
        /// Path that was tried.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`AppConfig`].
    #[error("Failed to parse config {path}: {source}")]
    Parse {
        /// Path of the rejected file.
        path: PathBuf,
        /// Underlying TOML error.
        source: toml::de::Error,
    },

    /// A value is out of its allowed range.
    #[error("Invalid config value for {field}: {message}")]
    Invalid {
        /// Dotted field name.
        field: &'static str,
        /// Why the value was rejected.
        message: String,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub geocoder: GeocoderBackend,
    pub gateway: GatewayConfig,
    pub classifier: ClassifierBackend,
    pub batch: BatchConfig,
    pub export: ExportConfig,
}

/// Which geocoder to construct, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GeocoderBackend {
    /// Google Geocoding API.
    Google {
        /// API key. Usually supplied through `GOOGLE_API_KEY`.
        #[serde(default)]
        api_key: Option<String>,
        /// API endpoint.
        #[serde(default = "default_google_url")]
        base_url: String,
        /// Per-request HTTP timeout.
        #[serde(default = "default_request_timeout_secs")]
        request_timeout_secs: u64,
    },
    /// Every address resolves to a fixed point.
    Fixture {
        #[serde(default = "default_fixture_latitude")]
        latitude: f64,
        #[serde(default = "default_fixture_longitude")]
        longitude: f64,
    },
}

impl Default for GeocoderBackend {
    fn default() -> Self {
        Self::Google {
            api_key: None,
            base_url: default_google_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Parcel/building lookup settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub backend: GatewayBackend,
    /// Building search radius around a geocoded point, in meters.
    pub buffer_radius_m: f64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            backend: GatewayBackend::default(),
            buffer_radius_m: 100.0,
        }
    }
}

/// Which gateway to construct, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayBackend {
    /// `DuckDB` parcel store.
    #[serde(rename = "duckdb")]
    DuckDb {
        /// Path to the `.duckdb` file.
        path: PathBuf,
    },
    /// Fixed unit-square parcel.
    Fixture,
}

impl Default for GatewayBackend {
    fn default() -> Self {
        Self::DuckDb {
            path: PathBuf::from("data/hoa_detect.duckdb"),
        }
    }
}

/// Which classifier to construct, tagged by `type` in TOML.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClassifierBackend {
    /// Logistic model loaded from JSON.
    Logistic {
        /// Path to the model file.
        model_path: PathBuf,
    },
    /// Constant positive-class probability.
    Fixed {
        #[serde(default = "default_fixed_probability")]
        probability: f64,
    },
    /// Compactness/density thresholds.
    Rule,
}

impl Default for ClassifierBackend {
    fn default() -> Self {
        Self::Logistic {
            model_path: PathBuf::from("models/hoa_model.json"),
        }
    }
}

/// Batch county processing settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Worker pool width.
    pub max_workers: usize,
    /// Per-address analysis timeout.
    pub task_timeout_secs: u64,
    /// Process addresses one at a time, in input order.
    pub sequential: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            task_timeout_secs: 120,
            sequential: false,
        }
    }
}

/// Output settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Directory for dated `GeoJSON` exports.
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
        }
    }
}

fn default_google_url() -> String {
    DEFAULT_GOOGLE_GEOCODE_URL.to_string()
}

const fn default_request_timeout_secs() -> u64 {
    10
}

const fn default_fixture_latitude() -> f64 {
    FIXTURE_LATITUDE
}

const fn default_fixture_longitude() -> f64 {
    FIXTURE_LONGITUDE
}

const fn default_fixed_probability() -> f64 {
    0.75
}

impl AppConfig {
    /// Loads configuration from `path`, or from [`DEFAULT_CONFIG_FILE`] if it
    /// exists, otherwise from defaults; then applies environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if an explicit or discovered file cannot be
    /// read or parsed, or a value is out of range.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                log::debug!("No {DEFAULT_CONFIG_FILE} found, using defaults");
                Self::default()
            }
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML config file without applying overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the document does not match [`AppConfig`].
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::de::from_str(contents)
    }

    /// The all-fixture configuration used by testing mode.
    #[must_use]
    pub fn testing() -> Self {
        Self {
            geocoder: GeocoderBackend::Fixture {
                latitude: FIXTURE_LATITUDE,
                longitude: FIXTURE_LONGITUDE,
            },
            gateway: GatewayConfig {
                backend: GatewayBackend::Fixture,
                ..GatewayConfig::default()
            },
            classifier: ClassifierBackend::Fixed {
                probability: default_fixed_probability(),
            },
            batch: BatchConfig {
                sequential: true,
                ..BatchConfig::default()
            },
            export: ExportConfig::default(),
        }
    }

    /// Switches every backend to its fixture and processes addresses
    /// sequentially. Worker count, timeout and export settings are kept.
    pub fn use_fixtures(&mut self) {
        let testing = Self::testing();
        self.geocoder = testing.geocoder;
        self.gateway = testing.gateway;
        self.classifier = testing.classifier;
        self.batch.sequential = true;
    }

    /// Applies overrides from a variable lookup (normally the process
    /// environment).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if lookup("HOA_DETECT_TESTING").is_some_and(|v| is_truthy(&v)) {
            log::info!("HOA_DETECT_TESTING set, using fixture backends");
            self.use_fixtures();
            return;
        }

        if let Some(key) = lookup("GOOGLE_API_KEY").filter(|k| !k.is_empty()) {
            if let GeocoderBackend::Google { api_key, .. } = &mut self.geocoder {
                *api_key = Some(key);
            }
        }

        if let Some(model_path) = lookup("MODEL_PATH").filter(|p| !p.is_empty()) {
            self.classifier = ClassifierBackend::Logistic {
                model_path: PathBuf::from(model_path),
            };
        }

        if let Some(db_path) = lookup("HOA_DETECT_DB").filter(|p| !p.is_empty()) {
            self.gateway.backend = GatewayBackend::DuckDb {
                path: PathBuf::from(db_path),
            };
        }
    }

    /// Checks numeric ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] for a non-positive worker count or
    /// timeout, or a negative buffer radius.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch.max_workers == 0 {
            return Err(ConfigError::Invalid {
                field: "batch.max_workers",
                message: "must be at least 1".to_string(),
            });
        }
        if self.batch.task_timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "batch.task_timeout_secs",
                message: "must be at least 1".to_string(),
            });
        }
        if !self.gateway.buffer_radius_m.is_finite() || self.gateway.buffer_radius_m < 0.0 {
            return Err(ConfigError::Invalid {
                field: "gateway.buffer_radius_m",
                message: format!("must be non-negative, got {}", self.gateway.buffer_radius_m),
            });
        }
        Ok(())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
