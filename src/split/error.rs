//! Split estimation error types

use thiserror::Error;

/// Errors raised by the deterministic split pipeline
#[derive(Debug, Error)]
pub enum SplitError {
    /// Pixel buffer has no pixels
    #[error("Empty pixel buffer ({width}x{height})")]
    EmptyBuffer { width: u32, height: u32 },

    /// Pixel count or profile count does not match the declared dimensions
    #[error("Dimension mismatch: expected {expected} values, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Encoded image could not be decoded
    #[error("Image decode error: {0}")]
    ImageDecode(String),

    /// Too few usable examples to fit a model
    #[error("Insufficient training data: {valid} valid of {total} examples (need {required})")]
    InsufficientData {
        valid: usize,
        total: usize,
        required: usize,
    },

    /// Model record does not match the current feature schema
    #[error("Invalid model: {0}")]
    InvalidModel(String),

    /// Blocking worker failed
    #[error("Worker error: {0}")]
    Worker(String),
}

impl From<image::ImageError> for SplitError {
    fn from(err: image::ImageError) -> Self {
        SplitError::ImageDecode(err.to_string())
    }
}

/// Result type alias for split operations
pub type Result<T> = std::result::Result<T, SplitError>;
