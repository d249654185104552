//! Feature Extraction Benchmarks
//!
//! Per-page cost of the analysis path: decode and downscale, column
//! profiling, and the full feature vector.
//!
//! Run with: `cargo bench --bench feature_extraction`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, GrayImage, ImageBuffer, ImageFormat, Luma};
use std::io::Cursor;
use std::time::Duration;

use gutter_server::split::{
    decode_analysis_image, extract_features, profile_columns, AnalysisConfig, GrayBuffer,
    PageContext,
};

/// Synthetic spread: two text blocks around a soft gutter shadow
fn spread_pixel(x: u32, y: u32, width: u32) -> u8 {
    let center = width / 2;
    let distance = x.abs_diff(center);
    if distance < width / 100 {
        return (40 + distance * 8).min(200) as u8;
    }
    let in_text = distance > width / 20 && distance < width * 9 / 20;
    if in_text && (y / 6) % 3 == 0 && (x / 3) % 4 != 0 {
        30
    } else {
        225
    }
}

fn spread_buffer(width: u32, height: u32) -> GrayBuffer {
    GrayBuffer::from_fn(width, height, |x, y| spread_pixel(x, y, width)).unwrap()
}

fn spread_png(width: u32, height: u32) -> Vec<u8> {
    let img: GrayImage =
        ImageBuffer::from_fn(width, height, |x, y| Luma([spread_pixel(x, y, width)]));
    let mut buffer = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    buffer
}

/// Benchmark profiling and feature derivation at analysis resolution
fn bench_extract(c: &mut Criterion) {
    let config = AnalysisConfig::default();
    let context = PageContext::new(42, 320);
    let buffer = spread_buffer(500, 340);

    let mut group = c.benchmark_group("extract");
    group.measurement_time(Duration::from_secs(10));

    group.bench_function("profile_columns_500", |b| {
        b.iter(|| black_box(profile_columns(black_box(&buffer), &config.profile)))
    });

    group.bench_function("extract_features_500", |b| {
        b.iter(|| black_box(extract_features(black_box(&buffer), Some(&context), &config).unwrap()))
    });

    group.finish();
}

/// Benchmark decode + downscale for typical scan sizes
fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode_analysis_image");
    group.measurement_time(Duration::from_secs(10));
    group.sample_size(30);

    for width in [1000u32, 2400] {
        let png = spread_png(width, width * 2 / 3);
        group.bench_with_input(BenchmarkId::from_parameter(width), &png, |b, png| {
            b.iter(|| black_box(decode_analysis_image(black_box(png), 500).unwrap()))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_extract, bench_decode);
criterion_main!(benches);
