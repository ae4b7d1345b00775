//! Benchmark for the preprocessing pipeline and classifier adapter

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use kicau::audio::{
    normalize_waveform, reduce_noise, resample, AudioConfig, AudioData, DenoiseConfig,
};
use kicau::model::{predict, resize_bilinear, Classifier};
use kicau::{Config, InferencePipeline, Result};
use ndarray::{Array3, Array4};

fn noisy_tone(sample_rate: u32, seconds: f32) -> AudioData {
    let n = (sample_rate as f32 * seconds) as usize;
    let mut state = 12345u32;
    let samples = (0..n)
        .map(|i| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let noise = (state >> 8) as f32 / (1u32 << 23) as f32 - 1.0;
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * 3200.0 * t).sin() * 0.3 + noise * 0.05
        })
        .collect();
    AudioData::new(samples, sample_rate)
}

fn bench_normalization(c: &mut Criterion) {
    let config = AudioConfig::default();
    let denoise = DenoiseConfig::default();
    let audio = noisy_tone(44100, 5.0);

    c.bench_function("resample_44k_to_16k_5s", |b| {
        b.iter(|| resample(black_box(&audio), black_box(config.sample_rate)))
    });

    let at_target = noisy_tone(config.sample_rate, 5.0);
    c.bench_function("denoise_5s", |b| {
        b.iter(|| {
            reduce_noise(
                black_box(&at_target.samples),
                black_box(config.sample_rate),
                black_box(&denoise),
            )
        })
    });

    c.bench_function("normalize_waveform_44k_5s", |b| {
        b.iter(|| normalize_waveform(black_box(&audio), black_box(&config), black_box(&denoise)))
    });
}

struct UniformModel;

impl Classifier for UniformModel {
    fn input_shape(&self) -> [Option<usize>; 4] {
        [None, Some(128), Some(128), Some(1)]
    }

    fn forward(&self, input: Array4<f32>) -> Result<Vec<f32>> {
        let mean = input.mean().unwrap_or(0.0);
        Ok((0..10).map(|i| (mean + i as f32).abs().fract()).collect())
    }
}

fn bench_classifier_adapter(c: &mut Criterion) {
    let features = Array3::from_shape_fn((40, 157, 1), |(m, t, _)| -((m * t) % 80) as f32);
    let class_names: Vec<String> = kicau::CLASS_NAMES.iter().map(|s| s.to_string()).collect();

    c.bench_function("resize_40x157_to_128x128", |b| {
        b.iter(|| resize_bilinear(black_box(&features), 128, 128))
    });

    c.bench_function("predict_with_resize", |b| {
        b.iter(|| predict(black_box(&features), &UniformModel, &class_names))
    });
}

fn bench_full_preprocessing(c: &mut Criterion) {
    let pipeline = InferencePipeline::new(&Config::default(), None);
    let audio = noisy_tone(22050, 8.0);

    c.bench_function("features_from_22k_8s", |b| {
        b.iter(|| pipeline.features_from(black_box(&audio)))
    });
}

criterion_group!(
    benches,
    bench_normalization,
    bench_classifier_adapter,
    bench_full_preprocessing
);
criterion_main!(benches);
