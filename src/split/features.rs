//! Feature extraction
//!
//! Turns the column profiles of one spread into a fixed, versioned feature
//! vector describing the candidate gutter.
//!
//! Positions are reported as percentage of width (0-100), except
//! `text_gap_center` which is on the split scale (0-1000) so it shares units
//! with the label it predicts.
//!
//! The shadow/gap branch is resolved here once: `gutter_kind`,
//! `gutter_position` and `gutter_value` always describe the chosen candidate,
//! so training and inference never re-derive it.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::config::{AnalysisConfig, FeatureConfig};
use super::error::{Result, SplitError};
use super::profile::{profile_columns, ColumnProfile};
use super::raster::GrayBuffer;

/// Version of the feature vector layout
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Coarse book length bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSize {
    Small,
    Medium,
    Large,
}

impl BookSize {
    /// Bucket a book by its page count
    pub fn from_page_count(pages: u32, config: &FeatureConfig) -> Self {
        if pages <= config.small_book_max_pages {
            Self::Small
        } else if pages >= config.large_book_min_pages {
            Self::Large
        } else {
            Self::Medium
        }
    }

    /// Ordinal bucket: small = 0, medium = 1, large = 2
    pub fn bucket(self) -> u8 {
        match self {
            Self::Small => 0,
            Self::Medium => 1,
            Self::Large => 2,
        }
    }
}

/// Coarse page-position bucket within the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PageBucket {
    Front,
    Body,
    Back,
}

impl PageBucket {
    pub fn from_position(position: f64, config: &FeatureConfig) -> Self {
        if position < config.early_page_fraction {
            Self::Front
        } else if position > config.late_page_fraction {
            Self::Back
        } else {
            Self::Body
        }
    }
}

/// Visual appearance of the binding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GutterKind {
    /// Dark shadow where the pages curve into the binding
    Shadow,
    /// Bright gap between pages (flatbed glass, separated leaves)
    Gap,
}

/// Where the page sits within its book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageContext {
    /// 1-indexed page number
    pub page_number: u32,
    pub total_pages: u32,
}

impl PageContext {
    pub fn new(page_number: u32, total_pages: u32) -> Self {
        Self {
            page_number,
            total_pages,
        }
    }

    /// Normalized position: 0 = first page, 1 = last page
    pub fn position(&self) -> f64 {
        if self.total_pages <= 1 {
            return 0.0;
        }
        let page = self.page_number.clamp(1, self.total_pages);
        (page - 1) as f64 / (self.total_pages - 1) as f64
    }
}

/// Fixed feature set describing one spread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureVector {
    pub schema_version: u32,

    // Geometry
    pub aspect_ratio: f64,
    pub width: u32,
    pub height: u32,

    // Book context
    pub page_position: Option<f64>,
    pub page_bucket: Option<PageBucket>,
    pub book_size: Option<BookSize>,

    // Central band statistics
    pub center_darkest_idx: f64,
    pub center_darkest_value: f64,
    pub center_brightest_idx: f64,
    pub center_brightest_value: f64,
    pub center_mean: f64,
    pub center_variance: f64,
    /// p10 of the band's middle column
    pub center_p10: f64,

    // Edge contrast
    pub edge_left_mean: f64,
    pub edge_right_mean: f64,
    pub edge_mean: f64,
    /// `center_p10 - edge_mean`; large positive values mean a bright gap
    pub edge_center_diff: f64,
    pub has_inverted_gutter: bool,

    // Chosen gutter candidate
    pub gutter_kind: GutterKind,
    pub gutter_position: f64,
    pub gutter_value: f64,
    /// Band columns within the width threshold of the extremum
    pub gutter_width: u32,
    pub gutter_width_pct: f64,
    /// Longest dark run in the gutter column as a fraction of height
    pub gutter_dark_run: f64,

    // Text boundaries
    pub text_left_edge: Option<f64>,
    pub text_right_edge: Option<f64>,
    pub text_gap_width: f64,
    pub text_gap_center: Option<f64>,
}

impl FeatureVector {
    /// True when every numeric field is finite
    pub fn is_finite(&self) -> bool {
        let scalars = [
            self.aspect_ratio,
            self.center_darkest_idx,
            self.center_darkest_value,
            self.center_brightest_idx,
            self.center_brightest_value,
            self.center_mean,
            self.center_variance,
            self.center_p10,
            self.edge_left_mean,
            self.edge_right_mean,
            self.edge_mean,
            self.edge_center_diff,
            self.gutter_position,
            self.gutter_value,
            self.gutter_width_pct,
            self.gutter_dark_run,
            self.text_gap_width,
        ];
        let optional = [
            self.page_position,
            self.text_left_edge,
            self.text_right_edge,
            self.text_gap_center,
        ];

        scalars.iter().all(|v| v.is_finite())
            && optional.iter().flatten().all(|v| v.is_finite())
    }

    /// Gutter candidate on the split scale (0-1000)
    pub fn gutter_split_position(&self) -> f64 {
        self.gutter_position * 10.0
    }
}

/// Profile and featurize a prepared analysis image
pub fn extract_features(
    buffer: &GrayBuffer,
    context: Option<&PageContext>,
    config: &AnalysisConfig,
) -> Result<FeatureVector> {
    let profiles = profile_columns(buffer, &config.profile);
    derive_features(
        &profiles,
        buffer.width(),
        buffer.height(),
        context,
        &config.features,
    )
}

/// Featurize many pages on the blocking thread pool
///
/// Results are returned in input order; each page succeeds or fails on its own.
pub async fn extract_features_batch(
    pages: Vec<(GrayBuffer, Option<PageContext>)>,
    config: &AnalysisConfig,
) -> Vec<Result<FeatureVector>> {
    let config = Arc::new(config.clone());

    let tasks = pages.into_iter().map(|(buffer, context)| {
        let config = Arc::clone(&config);
        tokio::task::spawn_blocking(move || extract_features(&buffer, context.as_ref(), &config))
    });

    futures::future::join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap_or_else(|e| Err(SplitError::Worker(e.to_string()))))
        .collect()
}

/// Derive the feature vector from precomputed column profiles
pub fn derive_features(
    profiles: &[ColumnProfile],
    width: u32,
    height: u32,
    context: Option<&PageContext>,
    config: &FeatureConfig,
) -> Result<FeatureVector> {
    if width == 0 || height == 0 {
        return Err(SplitError::EmptyBuffer { width, height });
    }
    if profiles.len() != width as usize {
        return Err(SplitError::DimensionMismatch {
            expected: width as usize,
            actual: profiles.len(),
        });
    }

    let w = profiles.len();
    let to_pct = |idx: usize| (idx as f64 + 0.5) / w as f64 * 100.0;
    let p10 = |idx: usize| profiles[idx].p10 as f64;

    // Central search band
    let (band_start, band_end) = band_bounds(w, config.band_start, config.band_end);
    let band = band_start..band_end;

    let darkest = band
        .clone()
        .fold(band_start, |best, i| if p10(i) < p10(best) { i } else { best });
    let brightest = band
        .clone()
        .fold(band_start, |best, i| if p10(i) > p10(best) { i } else { best });

    let band_len = (band_end - band_start) as f64;
    let center_mean = band.clone().map(p10).sum::<f64>() / band_len;
    let center_variance = band
        .clone()
        .map(|i| (p10(i) - center_mean).powi(2))
        .sum::<f64>()
        / band_len;
    let middle = ((band_start + band_end) / 2).min(band_end - 1);
    let center_p10 = p10(middle);

    // Edge baseline
    let margin = ((w as f64 * config.edge_fraction).round() as usize).clamp(1, w);
    let edge_left_mean = (0..margin).map(p10).sum::<f64>() / margin as f64;
    let edge_right_mean = (w - margin..w).map(p10).sum::<f64>() / margin as f64;
    let edge_mean = (edge_left_mean + edge_right_mean) / 2.0;

    let edge_center_diff = center_p10 - edge_mean;
    let has_inverted_gutter = edge_center_diff > config.inversion_threshold;

    // Resolve the gutter candidate once
    let (gutter_kind, extremum) = if has_inverted_gutter {
        (GutterKind::Gap, brightest)
    } else {
        (GutterKind::Shadow, darkest)
    };
    let extremum_value = p10(extremum);
    let in_gutter = |i: usize| match gutter_kind {
        GutterKind::Shadow => p10(i) < extremum_value + config.gutter_width_offset,
        GutterKind::Gap => p10(i) > extremum_value - config.gutter_width_offset,
    };

    let gutter_width = band.clone().filter(|&i| in_gutter(i)).count() as u32;
    let (run_start, run_end) = contiguous_run(extremum, band_start, band_end, &in_gutter);
    let gutter_position = (to_pct(run_start) + to_pct(run_end)) / 2.0;

    // Text boundaries, scanning outward from the image center
    let center = w / 2;
    let is_text = |i: &usize| profiles[*i].transitions > config.legibility_transitions;
    let text_left = (0..center).rev().find(is_text);
    let text_right = (center..w).find(is_text);

    let text_left_edge = text_left.map(to_pct);
    let text_right_edge = text_right.map(to_pct);
    let (text_gap_width, text_gap_center) = match (text_left_edge, text_right_edge) {
        (Some(left), Some(right)) => (right - left, Some((left + right) / 2.0 * 10.0)),
        _ => (0.0, None),
    };

    let page_position = context.map(PageContext::position);
    let page_bucket = page_position.map(|p| PageBucket::from_position(p, config));
    let book_size = context.map(|ctx| BookSize::from_page_count(ctx.total_pages, config));

    Ok(FeatureVector {
        schema_version: FEATURE_SCHEMA_VERSION,
        aspect_ratio: width as f64 / height as f64,
        width,
        height,
        page_position,
        page_bucket,
        book_size,
        center_darkest_idx: to_pct(darkest),
        center_darkest_value: p10(darkest),
        center_brightest_idx: to_pct(brightest),
        center_brightest_value: p10(brightest),
        center_mean,
        center_variance,
        center_p10,
        edge_left_mean,
        edge_right_mean,
        edge_mean,
        edge_center_diff,
        has_inverted_gutter,
        gutter_kind,
        gutter_position,
        gutter_value: extremum_value,
        gutter_width,
        gutter_width_pct: gutter_width as f64 / w as f64 * 100.0,
        gutter_dark_run: profiles[extremum].max_dark_run as f64 / height as f64,
        text_left_edge,
        text_right_edge,
        text_gap_width,
        text_gap_center,
    })
}

/// Column range `[start, end)` for the band, never empty
fn band_bounds(width: usize, start_frac: f64, end_frac: f64) -> (usize, usize) {
    let start = ((width as f64 * start_frac).floor() as usize).min(width - 1);
    let end = ((width as f64 * end_frac).ceil() as usize).clamp(start + 1, width);
    (start, end)
}

/// Widen `seed` left and right while `inside` holds, staying within the band
fn contiguous_run(
    seed: usize,
    band_start: usize,
    band_end: usize,
    inside: &impl Fn(usize) -> bool,
) -> (usize, usize) {
    let mut start = seed;
    while start > band_start && inside(start - 1) {
        start -= 1;
    }
    let mut end = seed;
    while end + 1 < band_end && inside(end + 1) {
        end += 1;
    }
    (start, end)
}
