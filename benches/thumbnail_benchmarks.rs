//! Benchmarks for the per-item hot paths of a thumbnail run.
//!
//! Run with: cargo bench

use std::hint::black_box;

use criterion::Criterion;
use image::{DynamicImage, RgbImage};
use thumbnailer::{
    CorruptionThresholds, ThumbnailSize, ThumbnailStore, ThumbnailerConfig, VideoDiagnostics,
    naming::thumbnail_filename, storage::fit_within, validation::validate,
};

fn benchmark_naming(criterion: &mut Criterion) {
    let size = ThumbnailSize::default();
    criterion.bench_function("thumbnail filename", |bencher| {
        bencher.iter(|| thumbnail_filename(black_box("3141592653589793"), size));
    });
}

fn benchmark_validation(criterion: &mut Criterion) {
    let thresholds = CorruptionThresholds::default();
    let diagnostics = VideoDiagnostics {
        frame_count: 9_000,
        width: 1920,
        height: 1080,
        frames_per_second: 30.0,
        codec_tag: "avc1".to_string(),
        backend_name: "ffmpeg".to_string(),
        byte_size: 48_000_000,
    };

    criterion.bench_function("corruption heuristics", |bencher| {
        bencher.iter(|| validate(black_box(&diagnostics), &thresholds));
    });
}

fn benchmark_fit(criterion: &mut Criterion) {
    let bounds = ThumbnailSize::default();
    criterion.bench_function("fit within box", |bencher| {
        bencher.iter(|| fit_within(black_box(4000), black_box(2000), bounds));
    });
}

fn benchmark_encode(criterion: &mut Criterion) {
    let config = ThumbnailerConfig::new("unused", "unused");
    let store = ThumbnailStore::new(&config);
    let frame = DynamicImage::ImageRgb8(RgbImage::from_fn(1920, 1080, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 64])
    }));

    let mut group = criterion.benchmark_group("encode");
    group.sample_size(20);
    group.bench_function("1080p frame to 128x128 JPEG", |bencher| {
        bencher.iter(|| store.encode(black_box(&frame)).unwrap());
    });
    group.finish();
}

criterion::criterion_group!(
    benches,
    benchmark_naming,
    benchmark_validation,
    benchmark_fit,
    benchmark_encode,
);
criterion::criterion_main!(benches);
