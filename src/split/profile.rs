//! Column profiler
//!
//! Reduces a grayscale buffer to one statistic record per pixel column.

use serde::{Deserialize, Serialize};

use super::config::ProfileConfig;
use super::raster::GrayBuffer;

/// Per-column brightness and texture statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnProfile {
    /// Brightness percentile (p10 by default): how dark the column gets
    pub p10: u8,
    /// Number of dark/light classification changes down the column
    pub transitions: u32,
    /// Longest vertical run of dark pixels
    pub max_dark_run: u32,
}

/// Profile every column of the buffer, left to right
pub fn profile_columns(buffer: &GrayBuffer, config: &ProfileConfig) -> Vec<ColumnProfile> {
    (0..buffer.width())
        .map(|x| profile_column(buffer.column(x), buffer.height(), config))
        .collect()
}

fn profile_column(
    pixels: impl Iterator<Item = u8>,
    height: u32,
    config: &ProfileConfig,
) -> ColumnProfile {
    let mut histogram = [0u32; 256];
    let mut transitions = 0u32;
    let mut run = 0u32;
    let mut max_dark_run = 0u32;
    let mut previous_dark: Option<bool> = None;

    for value in pixels {
        histogram[value as usize] += 1;

        let dark = value < config.dark_threshold;
        if dark {
            run += 1;
            max_dark_run = max_dark_run.max(run);
        } else {
            run = 0;
        }
        if let Some(prev) = previous_dark {
            if prev != dark {
                transitions += 1;
            }
        }
        previous_dark = Some(dark);
    }

    ColumnProfile {
        p10: histogram_percentile(&histogram, height, config.percentile),
        transitions,
        max_dark_run,
    }
}

/// Nearest-rank percentile over a 256-bin histogram
fn histogram_percentile(histogram: &[u32; 256], count: u32, percentile: f64) -> u8 {
    if count == 0 {
        return 0;
    }
    let fraction = (percentile / 100.0).clamp(0.0, 1.0);
    let rank = ((count - 1) as f64 * fraction).round() as u32;

    let mut seen = 0u32;
    for (value, &bin) in histogram.iter().enumerate() {
        seen += bin;
        if seen > rank {
            return value as u8;
        }
    }
    u8::MAX
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(buffer: &GrayBuffer) -> Vec<ColumnProfile> {
        profile_columns(buffer, &ProfileConfig::default())
    }

    #[test]
    fn test_one_profile_per_column() {
        let buffer = GrayBuffer::from_fn(37, 11, |_, _| 200).unwrap();
        assert_eq!(profile(&buffer).len(), 37);
    }

    #[test]
    fn test_uniform_column() {
        let buffer = GrayBuffer::from_fn(1, 50, |_, _| 180).unwrap();
        let column = profile(&buffer)[0];

        assert_eq!(column.p10, 180);
        assert_eq!(column.transitions, 0);
        assert_eq!(column.max_dark_run, 0);
    }

    #[test]
    fn test_percentile_ignores_isolated_dark_pixel() {
        // A single black pixel out of 100 must not drag p10 down
        let buffer = GrayBuffer::from_fn(1, 100, |_, y| if y == 40 { 0 } else { 220 }).unwrap();
        let column = profile(&buffer)[0];

        assert_eq!(column.p10, 220);
        assert_eq!(column.transitions, 2);
        assert_eq!(column.max_dark_run, 1);
    }

    #[test]
    fn test_percentile_tracks_dark_majority() {
        // 30% of the column is dark, so the 10th percentile lands in it
        let buffer = GrayBuffer::from_fn(1, 100, |_, y| if y < 30 { 20 } else { 240 }).unwrap();
        let column = profile(&buffer)[0];

        assert_eq!(column.p10, 20);
        assert_eq!(column.transitions, 1);
        assert_eq!(column.max_dark_run, 30);
    }

    #[test]
    fn test_text_like_column_has_many_transitions() {
        // Alternating 2px strokes
        let buffer =
            GrayBuffer::from_fn(1, 80, |_, y| if (y / 2) % 2 == 0 { 10 } else { 250 }).unwrap();
        let column = profile(&buffer)[0];

        assert_eq!(column.transitions, 39);
        assert_eq!(column.max_dark_run, 2);
    }

    #[test]
    fn test_histogram_percentile_bounds() {
        let mut histogram = [0u32; 256];
        histogram[5] = 1;
        histogram[250] = 9;

        assert_eq!(histogram_percentile(&histogram, 10, 0.0), 5);
        assert_eq!(histogram_percentile(&histogram, 10, 100.0), 250);
    }
}
