//! Estimator
//!
//! Applies a trained model to a feature vector. Pure; never calls out.

use super::config::EstimatorConfig;
use super::features::FeatureVector;
use super::model::{design_row, ModelRecord};

/// Unclamped linear score on the split scale
pub fn raw_score(features: &FeatureVector, model: &ModelRecord) -> f64 {
    model.weights.score(&design_row(features))
}

/// Predict the split position, clamped to the configured safe range
///
/// Out-of-range scores are clamped rather than rejected. A non-finite score
/// falls back to the middle of the range.
pub fn predict(features: &FeatureVector, model: &ModelRecord, config: &EstimatorConfig) -> u16 {
    let low = config.min_split.min(config.max_split);
    let high = config.min_split.max(config.max_split);

    let raw = raw_score(features, model);
    if raw.is_nan() {
        return low + (high - low) / 2;
    }
    raw.round().clamp(low as f64, high as f64) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::split::model::tests::neutral_features;
    use crate::split::model::{SplitWeights, FEATURE_COUNT};

    fn model(weights: SplitWeights) -> ModelRecord {
        ModelRecord::new(weights, 8, 2, 0.0)
    }

    #[test]
    fn test_neutral_features_predict_bias() {
        let record = model(SplitWeights::with_bias(512.4));
        let position = predict(&neutral_features(), &record, &EstimatorConfig::default());
        assert_eq!(position, 512);
    }

    #[test]
    fn test_linear_response() {
        let mut weights = SplitWeights::with_bias(500.0);
        weights.coefficients[3] = 10.0;
        let record = model(weights);

        let mut features = neutral_features();
        features.gutter_position = 47.0;
        assert_eq!(predict(&features, &record, &EstimatorConfig::default()), 470);
    }

    #[test]
    fn test_clamp_holds_for_extreme_inputs() {
        let mut weights = SplitWeights::with_bias(500.0);
        weights.coefficients = [1e6; FEATURE_COUNT];
        let record = model(weights.clone());
        let config = EstimatorConfig::default();

        let mut high = neutral_features();
        high.gutter_position = 100.0;
        high.edge_center_diff = 255.0;
        assert_eq!(predict(&high, &record, &config), 800);

        let mut low = neutral_features();
        low.gutter_position = 0.0;
        low.center_darkest_idx = 0.0;
        low.edge_center_diff = -255.0;
        assert_eq!(predict(&low, &record, &config), 200);

        weights.coefficients = [f64::MAX; FEATURE_COUNT];
        let overflow = model(weights);
        let position = predict(&high, &overflow, &config);
        assert!((200..=800).contains(&position));
    }

    #[test]
    fn test_nan_score_falls_back_to_midpoint() {
        let record = model(SplitWeights::with_bias(f64::NAN));
        assert_eq!(
            predict(&neutral_features(), &record, &EstimatorConfig::default()),
            500
        );
    }

    #[test]
    fn test_custom_range() {
        let record = model(SplitWeights::with_bias(950.0));
        let config = EstimatorConfig {
            min_split: 100,
            max_split: 900,
        };
        assert_eq!(predict(&neutral_features(), &record, &config), 900);
    }
}
