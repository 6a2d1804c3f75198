#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! HOA probability scoring.
//!
//! A trained model is consumed only through [`Classifier::predict_proba`],
//! which maps one [`FeatureVector`] to a two-class probability
//! distribution `[p(no HOA), p(HOA)]`. Backends:
//!
//! - [`logistic::LogisticModel`]: weights loaded from a JSON model file;
//! - [`fixed::FixedClassifier`]: a constant distribution for testing mode;
//! - [`rule::RuleClassifier`]: compactness/density thresholds, usable
//!   before a model has been trained.

pub mod fixed;
pub mod logistic;
pub mod rule;

use std::path::PathBuf;

use hoa_detect_parcel_models::FeatureVector;
use thiserror::Error;

/// Index of the positive ("has HOA") class.
pub const POSITIVE_CLASS: usize = 1;

/// Tolerance for a distribution summing to one.
const SUM_TOLERANCE: f64 = 1e-6;

/// Errors loading a model. These are fatal at startup.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The model file does not exist or cannot be read.
    #[error("Model file not found or unreadable at {path}: {source}")]
    Unreadable {
        /// Path that was tried.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The model file is not a valid model description.
    #[error("Invalid model file {path}: {message}")]
    Invalid {
        /// Path of the rejected file.
        path: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// A constant probability outside `[0, 1]`.
    #[error("Probability must be within [0, 1], got {0}")]
    ProbabilityOutOfRange(f64),
}

/// Errors scoring a single feature vector.
#[derive(Debug, Error, PartialEq)]
pub enum ClassifierError {
    /// A numeric feature is `NaN` or infinite.
    #[error("Feature '{name}' is not finite")]
    NonFiniteFeature {
        /// Feature column name.
        name: &'static str,
    },

    /// The backend produced something that is not a distribution.
    #[error("Classifier returned an invalid distribution {0:?}")]
    InvalidDistribution([f64; 2]),
}

/// Opaque probability function over feature vectors.
pub trait Classifier: Send + Sync {
    /// Returns `[p(no HOA), p(HOA)]` for one feature vector.
    ///
    /// # Errors
    ///
    /// Returns [`ClassifierError`] if the features cannot be scored.
    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; 2], ClassifierError>;
}

/// Scores `features` and returns the positive-class probability.
///
/// # Errors
///
/// Returns [`ClassifierError`] if the features are not finite or the
/// backend output is not a probability distribution.
pub fn hoa_probability(
    classifier: &dyn Classifier,
    features: &FeatureVector,
) -> Result<f64, ClassifierError> {
    check_finite(features)?;

    let distribution = classifier.predict_proba(features)?;
    let in_range = distribution
        .iter()
        .all(|p| p.is_finite() && (0.0..=1.0).contains(p));
    let sums_to_one = (distribution.iter().sum::<f64>() - 1.0).abs() <= SUM_TOLERANCE;
    if !in_range || !sums_to_one {
        return Err(ClassifierError::InvalidDistribution(distribution));
    }

    Ok(distribution[POSITIVE_CLASS])
}

fn check_finite(features: &FeatureVector) -> Result<(), ClassifierError> {
    for (name, value) in [
        ("compactness", features.compactness),
        ("density", features.density),
        ("height_variation", features.height_variation),
    ] {
        if !value.is_finite() {
            return Err(ClassifierError::NonFiniteFeature { name });
        }
    }
    Ok(())
}
