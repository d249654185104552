//! Analysis image preparation
//!
//! Decodes page images and reduces them to the 8-bit grayscale buffer the
//! column profiler works on.

use image::{imageops::FilterType, GrayImage};

use super::error::{Result, SplitError};

/// Row-major 8-bit grayscale pixel buffer with validated dimensions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl GrayBuffer {
    /// Wrap a pixel vector, rejecting empty or mis-sized buffers
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 || pixels.is_empty() {
            return Err(SplitError::EmptyBuffer { width, height });
        }
        let expected = width as usize * height as usize;
        if pixels.len() != expected {
            return Err(SplitError::DimensionMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build a buffer by evaluating `f(x, y)` for every pixel
    pub fn from_fn(width: u32, height: u32, f: impl Fn(u32, u32) -> u8) -> Result<Self> {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Iterate a single column top to bottom
    pub fn column(&self, x: u32) -> impl Iterator<Item = u8> + '_ {
        let width = self.width as usize;
        let x = x as usize;
        self.pixels.iter().skip(x).step_by(width).copied()
    }
}

impl TryFrom<GrayImage> for GrayBuffer {
    type Error = SplitError;

    fn try_from(image: GrayImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::new(width, height, image.into_raw())
    }
}

/// Decode an encoded page image and prepare it for analysis
///
/// The image is converted to luma and, when wider than `analysis_width`,
/// downscaled with its aspect ratio preserved. An `analysis_width` of 0
/// disables resizing.
pub fn decode_analysis_image(bytes: &[u8], analysis_width: u32) -> Result<GrayBuffer> {
    let decoded = image::load_from_memory(bytes)?;
    let gray = decoded.to_luma8();
    let gray = if analysis_width > 0 && gray.width() > analysis_width {
        downscale(&gray, analysis_width)
    } else {
        gray
    };
    GrayBuffer::try_from(gray)
}

fn downscale(gray: &GrayImage, width: u32) -> GrayImage {
    let ratio = width as f64 / gray.width() as f64;
    let height = ((gray.height() as f64 * ratio).round() as u32).max(1);
    image::imageops::resize(gray, width, height, FilterType::Triangle)
}
