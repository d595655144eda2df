//! Benchmarks for spectral indices, feature stacks and grid alignment

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use landshift_algorithms::alignment::{align_stack, GridSpec, Resampling};
use landshift_algorithms::imagery::{
    build_feature_stack, ndvi, DenominatorPolicy, FeatureParams,
};
use landshift_core::{BandMap, GeoTransform, Raster, RasterStack};

fn create_band(size: usize, base: f64) -> Raster<f64> {
    let mut r = Raster::new(size, size);
    r.set_transform(GeoTransform::new(0.0, size as f64 * 10.0, 10.0, -10.0));
    for row in 0..size {
        for col in 0..size {
            let v = base + ((row * 7 + col * 13) % 200) as f64 * 1e-3;
            r.set(row, col, v).unwrap();
        }
    }
    r
}

fn create_scene(size: usize) -> RasterStack {
    let layers: Vec<Raster<f64>> = [0.05, 0.08, 0.06, 0.35, 0.2, 0.12]
        .iter()
        .map(|&base| create_band(size, base))
        .collect();
    RasterStack::from_layers(&layers).unwrap()
}

fn bench_ndvi(c: &mut Criterion) {
    let mut group = c.benchmark_group("imagery/ndvi");
    for size in [256, 512, 1024, 2048] {
        let nir = create_band(size, 0.35);
        let red = create_band(size, 0.06);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| ndvi(black_box(&nir), black_box(&red), DenominatorPolicy::Strict).unwrap())
        });
    }
    group.finish();
}

fn bench_feature_stack(c: &mut Criterion) {
    let mut group = c.benchmark_group("imagery/feature_stack");
    let bands = BandMap::sentinel2();
    for size in [256, 512, 1024] {
        let scene = create_scene(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                build_feature_stack(black_box(&scene), &bands, FeatureParams::default()).unwrap()
            })
        });
    }
    group.finish();
}

fn bench_align_bilinear(c: &mut Criterion) {
    let mut group = c.benchmark_group("imagery/align_bilinear");
    for size in [256, 512, 1024] {
        let scene = create_scene(size / 2);
        let reference = GridSpec::new(
            size,
            size,
            GeoTransform::new(0.0, size as f64 * 10.0, 10.0, -10.0),
            None,
        );
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| align_stack(black_box(&scene), &reference, Resampling::Bilinear).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_ndvi, bench_feature_stack, bench_align_bilinear);
criterion_main!(benches);
