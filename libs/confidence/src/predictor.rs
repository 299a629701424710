//! Seam for an optional externally-trained regressor.
//!
//! The engine blends a predictor estimate into the rule-based score when one
//! is injected and enough history exists; absence (or a `None` prediction)
//! degrades gracefully to the rule-based score alone.

use crate::features::FeatureSet;

/// Black-box confidence estimator over the extracted feature set.
///
/// Implementations return an estimate in [0,100], or `None` when they cannot
/// produce one (untrained model, unsupported feature combination).
pub trait ConfidencePredictor: Send + Sync {
    fn predict(&self, features: &FeatureSet) -> Option<f64>;
}

impl<F> ConfidencePredictor for F
where
    F: Fn(&FeatureSet) -> Option<f64> + Send + Sync,
{
    fn predict(&self, features: &FeatureSet) -> Option<f64> {
        self(features)
    }
}
