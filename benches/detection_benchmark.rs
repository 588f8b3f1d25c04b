use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mea_importer::{mean_centered, SpikeDetector, ThresholdEstimator};
use ndarray::Array1;

const SAMPLING_FREQUENCY: f64 = 10_000.0;

/// 60 s of pseudo-random noise with a bipolar spike every 50 ms.
fn synthetic_channel() -> Array1<f64> {
    let len = (60.0 * SAMPLING_FREQUENCY) as usize;
    let mut state: u64 = 0x2545_f491_4f6c_dd1d;
    let mut signal = Array1::from_shape_fn(len, |_| {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        (state >> 11) as f64 / (1u64 << 53) as f64 - 0.5
    });
    for start in (250..len - 2).step_by(500) {
        signal[start] = 8.0;
        signal[start + 1] = -6.0;
    }
    signal
}

pub fn bench_threshold(c: &mut Criterion) {
    let signal = mean_centered(synthetic_channel().view());
    let estimator = ThresholdEstimator::default();
    c.bench_function("estimate_threshold_60s", |b| {
        b.iter(|| black_box(estimator.estimate(signal.view(), SAMPLING_FREQUENCY)))
    });
}

pub fn bench_detection(c: &mut Criterion) {
    let signal = mean_centered(synthetic_channel().view());
    let threshold = ThresholdEstimator::default()
        .estimate(signal.view(), SAMPLING_FREQUENCY)
        .unwrap_or(1.0);
    let detector = SpikeDetector::default();
    c.bench_function("detect_spikes_60s", |b| {
        b.iter(|| black_box(detector.detect(signal.view(), threshold, SAMPLING_FREQUENCY)))
    });
}

criterion_group!(benches, bench_threshold, bench_detection);
criterion_main!(benches);
