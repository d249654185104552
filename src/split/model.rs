//! Model records and the shared linear design
//!
//! `design_row` is the only place feature vectors are turned into model
//! inputs. Every input is centered on a reference value so that an average
//! spread contributes nothing beyond the bias.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{Result, SplitError};
use super::features::{BookSize, FeatureVector, GutterKind, PageBucket, FEATURE_SCHEMA_VERSION};

/// Number of model inputs (excluding the bias)
pub const FEATURE_COUNT: usize = 15;

/// Ordered names of the model inputs
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "aspect_ratio",
    "page_position",
    "book_size",
    "gutter_position",
    "center_darkest_idx",
    "center_brightest_idx",
    "text_gap_center",
    "text_gap_width",
    "gutter_width_pct",
    "edge_center_diff",
    "inverted_gutter",
    "book_small",
    "book_large",
    "page_front",
    "page_back",
];

/// Centering references
const ASPECT_REF: f64 = 1.5;
const PAGE_POSITION_REF: f64 = 0.5;
const BOOK_SIZE_REF: f64 = 1.0;
const POSITION_REF: f64 = 50.0;

/// Centered model inputs for one spread
pub type DesignRow = [f64; FEATURE_COUNT];

/// Build the centered input row for a feature vector
pub fn design_row(features: &FeatureVector) -> DesignRow {
    let indicator = |flag: bool| if flag { 1.0 } else { 0.0 };
    let book_size = features.book_size;
    let page_bucket = features.page_bucket;

    [
        features.aspect_ratio - ASPECT_REF,
        features.page_position.unwrap_or(PAGE_POSITION_REF) - PAGE_POSITION_REF,
        book_size.map_or(BOOK_SIZE_REF, |b| b.bucket() as f64) - BOOK_SIZE_REF,
        features.gutter_position - POSITION_REF,
        features.center_darkest_idx - POSITION_REF,
        features.center_brightest_idx - POSITION_REF,
        // Split scale back to percent so it centers like the other positions
        features
            .text_gap_center
            .map_or(0.0, |center| center / 10.0 - POSITION_REF),
        features.text_gap_width,
        features.gutter_width_pct,
        features.edge_center_diff,
        indicator(features.gutter_kind == GutterKind::Gap),
        indicator(book_size == Some(BookSize::Small)),
        indicator(book_size == Some(BookSize::Large)),
        indicator(page_bucket == Some(PageBucket::Front)),
        indicator(page_bucket == Some(PageBucket::Back)),
    ]
}

/// Bias plus one coefficient per design input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitWeights {
    pub bias: f64,
    pub coefficients: DesignRow,
}

impl SplitWeights {
    /// All coefficients zero, bias at `bias`
    pub fn with_bias(bias: f64) -> Self {
        Self {
            bias,
            coefficients: [0.0; FEATURE_COUNT],
        }
    }

    /// Linear score for a design row
    pub fn score(&self, row: &DesignRow) -> f64 {
        self.bias
            + self
                .coefficients
                .iter()
                .zip(row.iter())
                .map(|(w, x)| w * x)
                .sum::<f64>()
    }

    /// Coefficient by input name
    pub fn get(&self, name: &str) -> Option<f64> {
        FEATURE_NAMES
            .iter()
            .position(|n| *n == name)
            .map(|i| self.coefficients[i])
    }

    pub fn is_finite(&self) -> bool {
        self.bias.is_finite() && self.coefficients.iter().all(|w| w.is_finite())
    }
}

/// Immutable snapshot of a trained estimator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelRecord {
    pub id: String,
    pub schema_version: u32,
    pub feature_names: Vec<String>,
    pub weights: SplitWeights,
    /// Examples in the fit split
    pub training_size: usize,
    /// Examples in the held-out split
    pub validation_size: usize,
    pub validation_mse: f64,
    pub trained_at: DateTime<Utc>,
}

impl ModelRecord {
    /// New record for the current feature schema
    pub fn new(
        weights: SplitWeights,
        training_size: usize,
        validation_size: usize,
        validation_mse: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            schema_version: FEATURE_SCHEMA_VERSION,
            feature_names: FEATURE_NAMES.iter().map(|n| n.to_string()).collect(),
            weights,
            training_size,
            validation_size,
            validation_mse,
            trained_at: Utc::now(),
        }
    }

    /// Check that the record can drive the current estimator
    pub fn validate(&self) -> Result<()> {
        if self.schema_version != FEATURE_SCHEMA_VERSION {
            return Err(SplitError::InvalidModel(format!(
                "schema version {} (expected {})",
                self.schema_version, FEATURE_SCHEMA_VERSION
            )));
        }
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES.iter().copied()) {
            return Err(SplitError::InvalidModel(
                "feature names do not match the current schema".to_string(),
            ));
        }
        if !self.weights.is_finite() {
            return Err(SplitError::InvalidModel("non-finite weights".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A feature vector whose design row is all zeros
    pub(crate) fn neutral_features() -> FeatureVector {
        FeatureVector {
            schema_version: FEATURE_SCHEMA_VERSION,
            aspect_ratio: 1.5,
            width: 500,
            height: 333,
            page_position: None,
            page_bucket: None,
            book_size: None,
            center_darkest_idx: 50.0,
            center_darkest_value: 40.0,
            center_brightest_idx: 50.0,
            center_brightest_value: 200.0,
            center_mean: 150.0,
            center_variance: 10.0,
            center_p10: 40.0,
            edge_left_mean: 200.0,
            edge_right_mean: 200.0,
            edge_mean: 200.0,
            edge_center_diff: 0.0,
            has_inverted_gutter: false,
            gutter_kind: GutterKind::Shadow,
            gutter_position: 50.0,
            gutter_value: 40.0,
            gutter_width: 0,
            gutter_width_pct: 0.0,
            gutter_dark_run: 0.0,
            text_left_edge: None,
            text_right_edge: None,
            text_gap_width: 0.0,
            text_gap_center: None,
        }
    }

    #[test]
    fn test_neutral_row_is_zero() {
        assert_eq!(design_row(&neutral_features()), [0.0; FEATURE_COUNT]);
    }

    #[test]
    fn test_design_row_centering() {
        let mut features = neutral_features();
        features.gutter_position = 45.0;
        features.text_gap_center = Some(520.0);
        features.book_size = Some(BookSize::Large);
        features.page_bucket = Some(PageBucket::Back);
        features.gutter_kind = GutterKind::Gap;

        let row = design_row(&features);
        assert_eq!(row[3], -5.0);
        assert!((row[6] - 2.0).abs() < 1e-9);
        assert_eq!(row[2], 1.0);
        assert_eq!(row[10], 1.0);
        assert_eq!(row[11], 0.0);
        assert_eq!(row[12], 1.0);
        assert_eq!(row[14], 1.0);
    }

    #[test]
    fn test_named_weights() {
        let mut weights = SplitWeights::with_bias(500.0);
        weights.coefficients[3] = 2.0;

        assert_eq!(weights.get("gutter_position"), Some(2.0));
        assert_eq!(weights.get("missing"), None);

        let mut row = [0.0; FEATURE_COUNT];
        row[3] = -5.0;
        assert_eq!(weights.score(&row), 490.0);
    }

    #[test]
    fn test_validate_rejects_stale_schema() {
        let mut record = ModelRecord::new(SplitWeights::with_bias(500.0), 8, 2, 12.0);
        assert!(record.validate().is_ok());

        record.schema_version = 0;
        assert!(matches!(record.validate(), Err(SplitError::InvalidModel(_))));
    }

    #[test]
    fn test_validate_rejects_nan_weights() {
        let mut weights = SplitWeights::with_bias(500.0);
        weights.coefficients[0] = f64::NAN;
        let record = ModelRecord::new(weights, 8, 2, 12.0);
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_record_serialization() {
        let record = ModelRecord::new(SplitWeights::with_bias(497.5), 40, 10, 85.2);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"validationMse\":85.2"));

        let parsed: ModelRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, record);
    }
}
