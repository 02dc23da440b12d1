//! cPCA Benchmarks
//!
//! Per-bin eigendecompositions dominate cPCA cost. Compare the sequential
//! build against the rayon build by running both:
//!
//! Run with: cargo bench -p ffr-core --bench cpca_bench
//!      and: cargo bench -p ffr-core --features parallel --bench cpca_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ndarray::Array3;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;
use std::time::Duration;

use ffr_core::taper::{Dpss, TaperProvider};
use ffr_core::{Recording, SpectralAnalyzer, SpectralParams};

const FS: f64 = 2000.0;

fn recording(n_channels: usize, n_trials: usize, n_samples: usize) -> Recording {
    let mut rng = StdRng::seed_from_u64(1);
    let noise = Normal::new(0.0, 1.0).unwrap();
    Recording::from(Array3::from_shape_fn((n_channels, n_trials, n_samples), |(_, _, i)| {
        (2.0 * PI * 100.0 * i as f64 / FS).sin() + noise.sample(&mut rng)
    }))
}

fn params() -> SpectralParams {
    SpectralParams::builder()
        .sample_rate(FS)
        .tapers(2.0, 3)
        .fpass(10.0, 500.0)
        .pca_components(vec![1, 2])
        .return_eigenvectors(true)
        .build()
        .unwrap()
}

/// Dominant-component cPCA PLV across channel counts
fn bench_cpca_channels(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpca_plv");
    group.measurement_time(Duration::from_secs(10));
    let analyzer = SpectralAnalyzer::new(params());

    for n_channels in [2, 4, 8, 16].iter() {
        let rec = recording(*n_channels, 50, 1000);
        group.throughput(Throughput::Elements(*n_channels as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n_channels), &rec, |b, rec| {
            b.iter(|| analyzer.cpca_phase_locking(black_box(rec)))
        });
    }

    group.finish();
}

/// Combined power/PLV/ITC with eigenvectors
fn bench_cpca_all(c: &mut Criterion) {
    let mut group = c.benchmark_group("cpca_all");
    let analyzer = SpectralAnalyzer::new(params());

    for n_channels in [4, 16].iter() {
        let rec = recording(*n_channels, 50, 1000);
        group.bench_with_input(BenchmarkId::from_parameter(n_channels), &rec, |b, rec| {
            b.iter(|| analyzer.cpca_all(black_box(rec)))
        });
    }

    group.finish();
}

/// Taper generation: cold DPSS vs cache hit
fn bench_tapers(c: &mut Criterion) {
    let mut group = c.benchmark_group("tapers");
    let rec = recording(1, 50, 1000);

    group.bench_function("dpss_cold", |b| {
        b.iter(|| Dpss.tapers(black_box(1000), 2.0, 3))
    });

    let cached = SpectralAnalyzer::new(params());
    group.bench_function("plv_cached_tapers", |b| {
        b.iter(|| cached.phase_locking(black_box(&rec)))
    });
    let uncached = SpectralAnalyzer::with_provider(params(), Dpss);
    group.bench_function("plv_uncached_tapers", |b| {
        b.iter(|| uncached.phase_locking(black_box(&rec)))
    });

    group.finish();
}

criterion_group!(benches, bench_cpca_channels, bench_cpca_all, bench_tapers);
criterion_main!(benches);
