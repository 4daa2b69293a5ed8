use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use ndarray::Array2;

use eeg_attention::spectral::{band_powers, connectivity};
use eeg_attention::{
    AttentionPipeline, ConnectivityMethod, Epoch, FeatureExtractor, SignalConditioner,
    SignalConfig,
};

const FS: f64 = 128.0;

fn test_epoch() -> Array2<f64> {
    Array2::from_shape_fn((14, 128), |(c, t)| {
        let time = t as f64 / FS;
        10.0 * (2.0 * std::f64::consts::PI * 10.0 * time + c as f64 * 0.9).sin()
            + 2.0 * (2.0 * std::f64::consts::PI * 23.0 * time).sin()
            + ((t * 7 + c * 13) % 17) as f64 * 0.1
    })
}

fn bench_condition(c: &mut Criterion) {
    let sc = SignalConditioner::new(SignalConfig::default()).unwrap();
    let epoch = test_epoch();
    c.bench_function("condition [14×128]", |b| {
        b.iter(|| {
            let (clean, q) = sc.condition(black_box(&epoch)).unwrap();
            black_box((clean.sum(), q.overall_score))
        })
    });
}

fn bench_band_powers(c: &mut Criterion) {
    let epoch = test_epoch();
    c.bench_function("band_powers [14×128]", |b| {
        b.iter(|| black_box(band_powers(black_box(&epoch), FS)))
    });
}

fn bench_connectivity_plv(c: &mut Criterion) {
    let epoch = test_epoch();
    c.bench_function("connectivity plv [14×128]", |b| {
        b.iter(|| {
            let m = connectivity(black_box(&epoch), ConnectivityMethod::Plv, FS);
            black_box(m.values.sum())
        })
    });
}

fn bench_feature_extraction(c: &mut Criterion) {
    let cfg = SignalConfig::default();
    let extractor = FeatureExtractor::new(&cfg);
    let epoch = test_epoch();
    c.bench_function("extract features [14×128]", |b| {
        b.iter(|| {
            let fv = extractor.extract(black_box(&epoch)).unwrap();
            black_box(fv.values.len())
        })
    });
}

fn bench_full_pipeline(c: &mut Criterion) {
    let pipeline = AttentionPipeline::new(SignalConfig::default()).unwrap();
    let epoch = Epoch::new(test_epoch(), 0.0);
    c.bench_function("process_epoch [14×128]", |b| {
        b.iter(|| {
            let r = pipeline.process_epoch(black_box(&epoch)).unwrap();
            black_box(r.metrics.attention_score)
        })
    });
}

criterion_group!(
    benches,
    bench_condition,
    bench_band_powers,
    bench_connectivity_plv,
    bench_feature_extraction,
    bench_full_pipeline
);
criterion_main!(benches);
