//! Threshold classifier for use before a model is trained.
//!
//! Planned communities tend to have compact lots packed at suburban
//! density. Each threshold met adds the same weight on top of a base rate.

use hoa_detect_parcel_models::FeatureVector;

use crate::{Classifier, ClassifierError};

/// Compactness at or above which a parcel looks subdivided.
pub const COMPACTNESS_THRESHOLD: f64 = 0.6;

/// Buildings per km² at or above which an area looks developed.
pub const DENSITY_THRESHOLD: f64 = 20.0;

const BASE_RATE: f64 = 0.1;
const THRESHOLD_WEIGHT: f64 = 0.4;

/// Scores features from fixed compactness and density thresholds.
#[derive(Debug, Clone, Copy)]
pub struct RuleClassifier {
    compactness_threshold: f64,
    density_threshold: f64,
}

impl Default for RuleClassifier {
    fn default() -> Self {
        Self {
            compactness_threshold: COMPACTNESS_THRESHOLD,
            density_threshold: DENSITY_THRESHOLD,
        }
    }
}

impl RuleClassifier {
    #[must_use]
    pub const fn new(compactness_threshold: f64, density_threshold: f64) -> Self {
        Self {
            compactness_threshold,
            density_threshold,
        }
    }
}

impl Classifier for RuleClassifier {
    fn predict_proba(&self, features: &FeatureVector) -> Result<[f64; 2], ClassifierError> {
        let mut positive = BASE_RATE;
        if features.compactness >= self.compactness_threshold {
            positive += THRESHOLD_WEIGHT;
        }
        if features.density >= self.density_threshold {
            positive += THRESHOLD_WEIGHT;
        }
        Ok([1.0 - positive, positive])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(compactness: f64, density: f64) -> FeatureVector {
        FeatureVector {
            compactness,
            density,
            height_variation: 0.0,
            zoning_code: None,
            land_use: None,
        }
    }

    #[test]
    fn scores_by_thresholds_met() {
        let rule = RuleClassifier::default();
        let p = |c, d| rule.predict_proba(&features(c, d)).unwrap()[1];
        assert!((p(0.3, 5.0) - 0.1).abs() < 1e-12);
        assert!((p(0.7, 5.0) - 0.5).abs() < 1e-12);
        assert!((p(0.6, 20.0) - 0.9).abs() < 1e-12);
    }
}
