//! Benchmarks for random forest training and per-pixel prediction

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use landshift_algorithms::classification::{ForestParams, TrainedModel, TrainingSet};
use landshift_core::{GeoTransform, Raster, RasterStack};
use landshift_parallel::ProcessingMode;
use ndarray::Array2;

const FEATURES: usize = 7;

fn feature_names() -> Vec<String> {
    (1..=FEATURES).map(|i| format!("f{i}")).collect()
}

/// Four classes separated along the first two features
fn create_training_set(samples: usize) -> TrainingSet {
    let mut values = Vec::with_capacity(samples * FEATURES);
    let mut labels = Vec::with_capacity(samples);
    for i in 0..samples {
        let class = (i % 4) as u8 + 1;
        for f in 0..FEATURES {
            let jitter = ((i * 31 + f * 17) % 97) as f64 / 970.0;
            let centre = match f {
                0 => f64::from(class % 2),
                1 => f64::from(class / 3),
                _ => 0.5,
            };
            values.push(centre + jitter);
        }
        labels.push(class);
    }
    TrainingSet::new(
        Array2::from_shape_vec((samples, FEATURES), values).unwrap(),
        labels,
        feature_names(),
    )
    .unwrap()
}

fn create_feature_stack(size: usize) -> RasterStack {
    let layers: Vec<Raster<f64>> = (0..FEATURES)
        .map(|f| {
            let mut r = Raster::new(size, size);
            r.set_transform(GeoTransform::new(0.0, size as f64, 1.0, -1.0));
            for row in 0..size {
                for col in 0..size {
                    r.set(row, col, ((row * 7 + col * 13 + f) % 100) as f64 / 100.0)
                        .unwrap();
                }
            }
            r
        })
        .collect();
    RasterStack::from_layers(&layers)
        .unwrap()
        .with_layer_names(feature_names())
        .unwrap()
}

fn bench_train(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification/train");
    group.sample_size(10);
    let set = create_training_set(2_000);
    for mode in [ProcessingMode::Sequential, ProcessingMode::Parallel] {
        let params = ForestParams {
            n_trees: 50,
            mode,
            ..Default::default()
        };
        group.bench_with_input(BenchmarkId::from_parameter(format!("{mode:?}")), &mode, |b, _| {
            b.iter(|| TrainedModel::train(black_box(&set), &params).unwrap())
        });
    }
    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification/predict");
    group.sample_size(10);
    let params = ForestParams {
        n_trees: 50,
        ..Default::default()
    };
    let model = TrainedModel::train(&create_training_set(2_000), &params).unwrap();
    for size in [128, 256, 512] {
        let stack = create_feature_stack(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| model.predict(black_box(&stack)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_train, bench_predict);
criterion_main!(benches);
