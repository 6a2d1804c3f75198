//! Constant-output classifier.

use hoa_detect_parcel_models::FeatureVector;

use crate::{Classifier, ClassifierError, ModelError};

/// Positive-class probability served in testing mode.
pub const FIXTURE_PROBABILITY: f64 = 0.75;

/// Returns the same distribution for every feature vector.
#[derive(Debug, Clone, Copy)]
pub struct FixedClassifier {
    positive: f64,
}

impl FixedClassifier {
    /// # Errors
    ///
    /// Returns [`ModelError::ProbabilityOutOfRange`] if `positive` is not
    /// within `[0, 1]`.
    pub fn new(positive: f64) -> Result<Self, ModelError> {
        if !(0.0..=1.0).contains(&positive) {
            return Err(ModelError::ProbabilityOutOfRange(positive));
        }
        Ok(Self { positive })
    }

    /// The testing-mode classifier, `[0.25, 0.75]`.
    #[must_use]
    pub const fn fixture() -> Self {
        Self {
            positive: FIXTURE_PROBABILITY,
        }
    }
}

impl Classifier for FixedClassifier {
    fn predict_proba(&self, _features: &FeatureVector) -> Result<[f64; 2], ClassifierError> {
        Ok([1.0 - self.positive, self.positive])
    }
}
