//! Estimator training
//!
//! Fits the linear split model to oracle-labeled examples with full-batch
//! gradient descent and reports held-out mean squared error.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::config::TrainConfig;
use super::error::{Result, SplitError};
use super::features::{FeatureVector, FEATURE_SCHEMA_VERSION};
use super::model::{design_row, DesignRow, ModelRecord, SplitWeights, FEATURE_COUNT};
use super::oracle::{SplitLabel, SPLIT_SCALE_MAX};

/// A feature vector paired with its oracle label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingExample {
    pub id: String,
    pub page_id: String,
    /// Reference to the source image (content hash or storage key)
    pub image_ref: String,
    pub features: FeatureVector,
    pub label: SplitLabel,
    pub created_at: DateTime<Utc>,
}

impl TrainingExample {
    pub fn new(page_id: &str, image_ref: &str, features: FeatureVector, label: SplitLabel) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            page_id: page_id.to_string(),
            image_ref: image_ref.to_string(),
            features,
            label,
            created_at: Utc::now(),
        }
    }

    /// Usable for training: current schema, finite features, label in range
    pub fn is_valid(&self) -> bool {
        self.features.schema_version == FEATURE_SCHEMA_VERSION
            && self.features.is_finite()
            && self.label.position <= SPLIT_SCALE_MAX
    }
}

/// Train a new model, shuffling with the configured seed or the thread RNG
pub fn train_model(examples: &[TrainingExample], config: &TrainConfig) -> Result<ModelRecord> {
    match config.seed {
        Some(seed) => train_model_with_rng(examples, config, &mut StdRng::seed_from_u64(seed)),
        None => train_model_with_rng(examples, config, &mut rand::rng()),
    }
}

/// Train a new model using the supplied RNG for the fit/validation split
pub fn train_model_with_rng<R: Rng + ?Sized>(
    examples: &[TrainingExample],
    config: &TrainConfig,
    rng: &mut R,
) -> Result<ModelRecord> {
    let total = examples.len();
    let mut rows: Vec<(DesignRow, f64)> = examples
        .iter()
        .filter(|example| example.is_valid())
        .map(|example| (design_row(&example.features), example.label.position as f64))
        .collect();

    // Two examples is the floor for a non-empty fit and validation split
    let required = config.min_examples.max(2);
    if rows.len() < required {
        tracing::warn!(
            valid = rows.len(),
            total,
            required,
            "Not enough valid examples to train"
        );
        return Err(SplitError::InsufficientData {
            valid: rows.len(),
            total,
            required,
        });
    }

    let bias = median(rows.iter().map(|(_, label)| *label).collect());

    rows.shuffle(rng);
    let validation_len = ((rows.len() as f64 * config.validation_fraction).round() as usize)
        .clamp(1, rows.len() - 1);
    let (fit, validation) = rows.split_at(rows.len() - validation_len);

    let mut weights = SplitWeights::with_bias(bias);
    let clip = config.gradient_clip.abs();
    let lr = config.learning_rate;
    let inv = 1.0 / fit.len() as f64;

    for epoch in 0..config.epochs {
        let mut grad_bias = 0.0;
        let mut grad = [0.0; FEATURE_COUNT];

        for (row, label) in fit {
            let residual = weights.score(row) - label;
            grad_bias += residual.clamp(-clip, clip);
            for (g, x) in grad.iter_mut().zip(row.iter()) {
                *g += (residual * x).clamp(-clip, clip);
            }
        }

        weights.bias -= lr * grad_bias * inv;
        for (w, g) in weights.coefficients.iter_mut().zip(grad.iter()) {
            *w -= lr * g * inv;
        }

        if epoch % 100 == 0 {
            tracing::trace!(epoch, mse = mean_squared_error(&weights, fit), "Training progress");
        }
    }

    let validation_mse = mean_squared_error(&weights, validation);
    let record = ModelRecord::new(weights, fit.len(), validation.len(), validation_mse);
    record.validate()?;

    tracing::info!(
        model_id = %record.id,
        training_size = record.training_size,
        validation_size = record.validation_size,
        validation_mse = record.validation_mse,
        excluded = total - rows.len(),
        "Trained split model"
    );

    Ok(record)
}

fn mean_squared_error(weights: &SplitWeights, rows: &[(DesignRow, f64)]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    rows.iter()
        .map(|(row, label)| (weights.score(row) - label).powi(2))
        .sum::<f64>()
        / rows.len() as f64
}

fn median(mut values: Vec<f64>) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
