//! Split estimation configuration
//!
//! Every threshold used by the profiler, extractor, trainer and estimator
//! lives here and is passed in explicitly. The defaults are the empirically
//! chosen values; they should be re-validated against labeled data before
//! being trusted on a new scanner or image source.

use serde::{Deserialize, Serialize};

/// Column profiler settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProfileConfig {
    /// Percentile used for the column darkness statistic (0-100)
    pub percentile: f64,
    /// Pixels strictly below this value count as dark
    pub dark_threshold: u8,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            percentile: 10.0,
            dark_threshold: 100,
        }
    }
}

/// Feature extractor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeatureConfig {
    /// Start of the central search band (fraction of width)
    pub band_start: f64,
    /// End of the central search band (fraction of width)
    pub band_end: f64,
    /// Width of each outer margin used for the edge baseline (fraction of width)
    pub edge_fraction: f64,
    /// Center-minus-edge brightness above which the gutter is a bright gap
    pub inversion_threshold: f64,
    /// Offset from the gutter extremum used when counting gutter columns
    pub gutter_width_offset: f64,
    /// Transition count above which a column is considered to contain text
    pub legibility_transitions: u32,
    /// Books with at most this many pages are bucketed as small
    pub small_book_max_pages: u32,
    /// Books with at least this many pages are bucketed as large
    pub large_book_min_pages: u32,
    /// Page positions below this fraction count as front matter
    pub early_page_fraction: f64,
    /// Page positions above this fraction count as back matter
    pub late_page_fraction: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            band_start: 0.40,
            band_end: 0.60,
            edge_fraction: 0.05,
            inversion_threshold: 30.0,
            gutter_width_offset: 20.0,
            legibility_transitions: 20,
            small_book_max_pages: 100,
            large_book_min_pages: 300,
            early_page_fraction: 0.1,
            late_page_fraction: 0.9,
        }
    }
}

/// Full analysis pipeline settings (image preparation + profiling + features)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalysisConfig {
    /// Images wider than this are downscaled before profiling
    pub analysis_width: u32,
    pub profile: ProfileConfig,
    pub features: FeatureConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            analysis_width: 500,
            profile: ProfileConfig::default(),
            features: FeatureConfig::default(),
        }
    }
}

/// Gradient-descent trainer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrainConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    /// Per-example gradient contributions are clipped to [-clip, clip]
    pub gradient_clip: f64,
    /// Fraction of valid examples held out for validation
    pub validation_fraction: f64,
    /// Minimum number of valid examples required to train
    pub min_examples: usize,
    /// Seed for the fit/validation shuffle; `None` uses the thread RNG
    pub seed: Option<u64>,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            epochs: 500,
            learning_rate: 1e-4,
            gradient_clip: 10.0,
            validation_fraction: 0.2,
            min_examples: 10,
            seed: None,
        }
    }
}

/// Inference settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EstimatorConfig {
    /// Lowest split position ever returned (0-1000 scale)
    pub min_split: u16,
    /// Highest split position ever returned (0-1000 scale)
    pub max_split: u16,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            min_split: 200,
            max_split: 800,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{"analysisWidth": 320, "features": {"inversionThreshold": 45.0}}"#;
        let config: AnalysisConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.analysis_width, 320);
        assert_eq!(config.features.inversion_threshold, 45.0);
        assert_eq!(config.features.legibility_transitions, 20);
        assert_eq!(config.profile.percentile, 10.0);
    }

    #[test]
    fn test_train_defaults() {
        let config = TrainConfig::default();
        assert_eq!(config.epochs, 500);
        assert_eq!(config.min_examples, 10);
        assert!(config.seed.is_none());
    }
}
