use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wisconsin_ensemble::data::{SyntheticGenerator, TrainingSet};
use wisconsin_ensemble::ensemble::{predict, predict_batch, EnsembleTrainer, ModelBank};
use wisconsin_ensemble::features::enhance_matrix;

fn create_data(n_samples: usize) -> TrainingSet {
    let raw = SyntheticGenerator::default().with_samples(n_samples).generate().unwrap();
    enhance_matrix(&raw).unwrap()
}

fn bench_training(c: &mut Criterion) {
    let mut group = c.benchmark_group("training");
    group.sample_size(10); // Fewer samples for training benchmarks

    for n_samples in [200, 569].iter() {
        let data = create_data(*n_samples);

        group.bench_with_input(BenchmarkId::new("quick_ensemble", n_samples), &data, |b, data| {
            b.iter(|| {
                let trainer = EnsembleTrainer::new(ModelBank::quick());
                trainer.train(black_box(data)).unwrap()
            })
        });
    }

    group.finish();
}

fn bench_prediction(c: &mut Criterion) {
    let mut group = c.benchmark_group("prediction");

    // Train once
    let data = create_data(569);
    let bundle = EnsembleTrainer::new(ModelBank::quick()).train(&data).unwrap().bundle;

    let row = data.x.row(0).to_vec();
    group.bench_function("single", |b| b.iter(|| predict(black_box(&row), &bundle, false).unwrap()));

    for n_rows in [10, 100, 500].iter() {
        let batch = create_data(*n_rows).x;
        group.bench_with_input(BenchmarkId::new("batch", n_rows), &batch, |b, x| {
            b.iter(|| predict_batch(black_box(x), &bundle).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_training, bench_prediction);
criterion_main!(benches);
