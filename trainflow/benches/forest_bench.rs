//! Benchmarks for forest fitting and prediction.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use ndarray::{Array1, Array2};
use trainflow::ml::{Classifier, ForestParams, RandomForest};

fn synthetic(n: usize) -> (Array2<f64>, Array1<f64>) {
    let x = Array2::from_shape_fn((n, 8), |(i, j)| ((i * 31 + j * 17) % 97) as f64 / 97.0);
    let y = x.column(0).mapv(|v| if v > 0.5 { 1.0 } else { 0.0 });
    (x, y)
}

fn forest_benchmark(c: &mut Criterion) {
    let (x, y) = synthetic(500);
    let params = ForestParams {
        n_estimators: 20,
        random_state: Some(42),
        ..ForestParams::default()
    };

    c.bench_function("forest_fit_500x8", |b| {
        b.iter(|| RandomForest::fit(params.clone(), black_box(x.view()), black_box(y.view())))
    });

    let Ok(model) = RandomForest::fit(params.clone(), x.view(), y.view()) else {
        return;
    };
    c.bench_function("forest_predict_500x8", |b| {
        b.iter(|| model.predict(black_box(x.view())))
    });
}

criterion_group!(benches, forest_benchmark);
criterion_main!(benches);
