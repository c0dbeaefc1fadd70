use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use l3binning::{
    aggregators::AggregatorConfig,
    observations::{observation_batch::ObservationBatch, PassDescriptor},
    planetary_grid::EqualAreaGrid,
    Binning, BinningConfig,
};

/// Pixels of one synthetic swath, roughly 20° wide.
fn make_swath(rng: &mut StdRng, id: usize, n: usize) -> ObservationBatch {
    let lon0 = rng.random_range(-170.0..150.0);
    let lat: Vec<f64> = (0..n).map(|_| rng.random_range(-80.0..80.0)).collect();
    let lon: Vec<f64> = (0..n).map(|_| lon0 + rng.random_range(0.0..20.0)).collect();
    let chl: Vec<f64> = (0..n).map(|_| rng.random_range(0.01..10.0)).collect();
    let flag: Vec<f64> = (0..n)
        .map(|_| if rng.random::<f64>() < 0.1 { 0.0 } else { 1.0 })
        .collect();
    ObservationBatch::new(
        PassDescriptor::new(format!("swath-{id}"), ["chl", "flag"]),
        lat,
        lon,
        vec![chl, flag],
    )
    .unwrap()
}

fn binning() -> Binning {
    let config = BinningConfig::builder()
        .num_rows(2160)
        .aggregator(AggregatorConfig::Average {
            var_name: "chl".into(),
        })
        .aggregator(AggregatorConfig::PercentileHistogram {
            var_name: "chl".into(),
            percentiles: vec![10, 50, 90],
            num_buckets: 64,
            min: 0.0,
            max: 10.0,
        })
        .mask_variable("flag")
        .build()
        .unwrap();
    Binning::new(&config).unwrap()
}

fn bench_bin_index(c: &mut Criterion) {
    let grid = EqualAreaGrid::new(2160).unwrap();
    let mut rng = StdRng::seed_from_u64(0xB1A5);
    let coords: Vec<(f64, f64)> = (0..100_000)
        .map(|_| (rng.random_range(-90.0..=90.0), rng.random_range(-180.0..=180.0)))
        .collect();

    c.bench_function("planetary_grid/bin_index_100k", |b| {
        b.iter(|| {
            for &(lat, lon) in &coords {
                black_box(grid.bin_index(black_box(lat), black_box(lon)).ok());
            }
        })
    });
}

fn bench_spatial_pass(c: &mut Criterion) {
    let binning = binning();
    let mut rng = StdRng::seed_from_u64(0xDEADBEEF);

    c.bench_function("spatial_binning/one_pass_100k", |b| {
        b.iter_batched(
            || make_swath(&mut rng, 0, 100_000),
            |batch| black_box(binning.run_spatial_pass(batch).unwrap()),
            BatchSize::LargeInput,
        )
    });
}

fn bench_merge(c: &mut Criterion) {
    let binning = binning();
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    let sets: Vec<_> = (0..16)
        .map(|i| binning.run_spatial_pass(make_swath(&mut rng, i, 20_000)).unwrap())
        .collect();

    c.bench_function("temporal_binning/merge_16_passes", |b| {
        b.iter(|| black_box(binning.merge_all(&sets).unwrap()))
    });
}

criterion_group!(benches, bench_bin_index, bench_spatial_pass, bench_merge);
criterion_main!(benches);
