//! Spread split estimation
//!
//! Decides where a scanned two-page opening should be cut.
//!
//! # Architecture
//!
//! ```text
//!   encoded image ──► raster ──► profile ──► features ──┬──► estimator ──► split position
//!                                                       │        ▲
//!                                                       │     ModelRecord
//!                                                       │        ▲
//!                                                       └──► labeler ──► train
//!                                                              │
//!                                                            oracle (vision model)
//! ```
//!
//! The oracle is only consulted when building training sets. Inference is a
//! pure function of the feature vector and the active model record.
//!
//! # Usage
//!
//! ```rust,ignore
//! use gutter_server::split::{decode_analysis_image, extract_features, predict};
//!
//! let buffer = decode_analysis_image(&bytes, config.analysis_width)?;
//! let features = extract_features(&buffer, Some(&PageContext::new(12, 240)), &config)?;
//! let position = predict(&features, &active_model, &EstimatorConfig::default());
//! ```

pub mod config;
pub mod estimator;
pub mod features;
pub mod labeler;
pub mod model;
pub mod oracle;
pub mod profile;
pub mod raster;
pub mod train;

mod error;

pub use config::{AnalysisConfig, EstimatorConfig, FeatureConfig, ProfileConfig, TrainConfig};
pub use error::{Result, SplitError};
pub use estimator::{predict, raw_score};
pub use features::{
    derive_features, extract_features, extract_features_batch, BookSize, FeatureVector,
    GutterKind, PageBucket, PageContext, FEATURE_SCHEMA_VERSION,
};
pub use labeler::{
    content_ref, featurize_bytes, label_page, label_pages, LabelError, LabelFailure,
    LabelingReport, PageImage, PageLabel, SinglePageVerdict,
};
pub use model::{design_row, ModelRecord, SplitWeights, FEATURE_COUNT, FEATURE_NAMES};
pub use oracle::{
    build_oracle, parse_oracle_response, Confidence, OllamaOracle, OpenAiOracle, OracleConfig,
    OracleError, OracleOutcome, OracleProvider, SplitLabel, SplitOracle,
};
pub use profile::{profile_columns, ColumnProfile};
pub use raster::{decode_analysis_image, GrayBuffer};
pub use train::{train_model, train_model_with_rng, TrainingExample};
