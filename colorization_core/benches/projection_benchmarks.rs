//! Benchmarks for the per-pixel palette loops and the loss evaluation
//!
//! Run with: cargo bench --bench projection_benchmarks

use colorization_core::{
    composite_loss, decode_expectation, project, ChromaPalette, LanczosDownsampler, LossConfig,
    PALETTE_BINS,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use ndarray::{Array2, Array3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn palette() -> ChromaPalette {
    let pairs = (0..PALETTE_BINS)
        .map(|i| {
            let angle = i as f32 * 0.37;
            let radius = (i as f32 / PALETTE_BINS as f32).sqrt();
            [radius * angle.cos(), radius * angle.sin()]
        })
        .collect();
    ChromaPalette::from_pairs(pairs).expect("spiral palette fits the normalized disc")
}

fn bench_projection(c: &mut Criterion) {
    let palette = palette();
    let mut group = c.benchmark_group("palette_projection");

    for size in [16usize, 32, 64] {
        let mut rng = StdRng::seed_from_u64(size as u64);
        let image = Array3::from_shape_fn((3, size, size), |_| rng.gen::<f32>());
        let luminance = Array2::from_elem((size, size), 50.0f32);

        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| black_box(project(image.view(), &palette, luminance.view()).unwrap()));
        });
    }

    group.finish();
}

fn bench_expectation_decode(c: &mut Criterion) {
    let palette = palette();
    let distribution = Array3::from_elem((PALETTE_BINS, 64, 64), 1.0 / PALETTE_BINS as f32);

    c.bench_function("decode_expectation_64", |b| {
        b.iter(|| black_box(decode_expectation(distribution.view(), &palette).unwrap()));
    });
}

fn bench_composite_loss(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(7);
    let output = Array3::from_shape_fn((3, 256, 256), |_| rng.gen::<f32>());
    let target = Array3::from_shape_fn((3, 64, 64), |_| rng.gen::<f32>());
    let luminance = Array2::from_shape_fn((256, 256), |_| rng.gen::<f32>() * 100.0);
    let downsampler = LanczosDownsampler::new(4);
    let params = LossConfig::default();

    c.bench_function("composite_loss_256", |b| {
        b.iter(|| {
            black_box(
                composite_loss(
                    output.view(),
                    target.view(),
                    luminance.view(),
                    &downsampler,
                    &params,
                )
                .unwrap(),
            )
        });
    });
}

criterion_group!(
    benches,
    bench_projection,
    bench_expectation_decode,
    bench_composite_loss
);
criterion_main!(benches);
