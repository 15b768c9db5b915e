//! Benchmarks for the filter models, the modulation stage and the output
//! limiter.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use acid_dsp::control::ControlBroker;
use acid_dsp::dsp::{FilterModel, LadderFilter, Limiter, SVFilter};
use acid_dsp::engine::{Bindings, FilterStage, SignalId};

use crate::BLOCK_SIZES;

pub fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");
    let broker = ControlBroker::with_defaults();
    let bindings = Bindings::from_broker(&broker);

    for &size in BLOCK_SIZES {
        // Generate a test signal (sawtooth-like ramp)
        let input: Vec<f32> = (0..size)
            .map(|i| (i as f32 / size as f32) * 2.0 - 1.0)
            .collect();

        let mut filter = SVFilter::lowpass(1000.0);
        filter.prepare(48_000.0);
        filter.set_resonance(0.5);
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("svf", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                filter.process(black_box(&mut buffer));
            })
        });

        let mut filter = LadderFilter::new();
        filter.prepare(48_000.0);
        filter.set_cutoff(1000.0);
        filter.set_resonance(0.7);
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("ladder", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                filter.process(black_box(&mut buffer));
            })
        });

        // Both models plus modulation, humanization and blend
        let mut stage =
            FilterStage::new(LadderFilter::new(), SVFilter::lowpass(1000.0), &bindings);
        stage.prepare(48_000.0);
        bindings.bus.write(SignalId::AMP_ENV, 0.8);
        bindings.bus.write(SignalId::ACCENT_ENV, 1.2);
        let mut buffer = input.clone();
        group.bench_with_input(BenchmarkId::new("stage", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&input);
                stage.process(black_box(&mut buffer));
            })
        });

        // Hot input so the gain follower is always working
        let hot: Vec<f32> = input.iter().map(|s| s * 2.5).collect();
        let mut limiter = Limiter::new();
        limiter.prepare(48_000.0);
        let mut buffer = hot.clone();
        group.bench_with_input(BenchmarkId::new("limiter", size), &size, |b, _| {
            b.iter(|| {
                buffer.copy_from_slice(&hot);
                limiter.process(black_box(&mut buffer));
            })
        });
    }

    group.finish();
}
