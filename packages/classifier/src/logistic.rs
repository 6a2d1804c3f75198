//! Logistic regression model loaded from a JSON file.
//!
//! Model file format:
//!
//! ```json
//! {
//!   "intercept": -2.0,
//!   "weights": { "compactness": 3.1, "density": 0.0004, "height_variation": -0.2 },
//!   "zoning_weights": { "PD": 1.2 },
//!   "land_use_weights": { "SFR": 0.4 }
//! }
//! ```
//!
//! Zoning and land-use codes contribute their weight when present in the
//! table and nothing otherwise.

use std::collections::BTreeMap;
use std::path::Path;

use hoa_detect_parcel_models::FeatureVector;
use serde::Deserialize;

use crate::{Classifier, ClassifierError, ModelError};

/// Coefficients for the numeric features.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NumericWeights {
    #[serde(default)]
    pub compactness: f64,
    #[serde(default)]
    pub density: f64,
    #[serde(default)]
    pub height_variation: f64,
}

/// A fitted logistic regression over [`FeatureVector`].
#[derive(Debug, Clone, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    #[serde(default)]
    pub weights: NumericWeights,
    #[serde(default)]
    pub zoning_weights: BTreeMap<String, f64>,
    #[serde(default)]
    pub land_use_weights: BTreeMap<String, f64>,
}

impl LogisticModel {
    /// Loads and validates a model file.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError`] if the file cannot be read, is not valid JSON
    /// for this format, or contains non-finite coefficients.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ModelError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;

        let model: Self = serde_json::from_str(&contents).map_err(|e| ModelError::Invalid {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if !model.coefficients().all(f64::is_finite) {
            return Err(ModelError::Invalid {
                path: path.to_path_buf(),
                message: "coefficients must be finite".to_string(),
            });
        }

        log::info!(
            "Loaded logistic model from {} ({} zoning codes, {} land-use codes)",
            path.display(),
            model.zoning_weights.len(),
            model.land_use_weights.len()
        );

        Ok(model)
    }

    fn coefficients(&self) -> impl Iterator<Item = f64> + '_ {
        [
            self.intercept,
            self.weights.compactness,
            self.weights.density,
            self.weights.height_variation,
        ]
        .into_iter()
        .chain(self.zoning_weights.values().copied())
        .chain(self.land_use_weights.values().copied())
    }

    fn logit(&self, features: &FeatureVector) -> f64 {
        let code_weight = |table: &BTreeMap<String, f64>, code: Option<&str>| {
            code.and_then(|c| table.get(c)).copied().unwrap_or(0.0)
        };

        self.intercept
            + self.weights.compactness * features.compactness
            + self.weights.density * features.density
            + self.weights.height_variation * features.height_variation
            + code_weight(&self.zoning_weights, features.zoning_code.as_deref())
            + code_weight(&self.land_use_weights, features.land_use.as_deref())
    }
}

impl Classifier for LogisticModel {
    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; 2], ClassifierError> {
        let positive = 1.0 / (1.0 + (-self.logit(features)).exp());
        Ok([1.0 - positive, positive])
    }
}
