//! Benchmarks for the amplitude and accent envelopes.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use acid_dsp::control::ControlBroker;
use acid_dsp::dsp::{AccentEnvelope, AmpEnvelope};
use acid_dsp::engine::Bindings;

use crate::BLOCK_SIZES;

pub fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/envelope");
    let broker = ControlBroker::with_defaults();
    let bindings = Bindings::from_broker(&broker);

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // Attack/decay, retriggered through release so it never settles
        let mut env = AmpEnvelope::new(&bindings);
        group.bench_with_input(BenchmarkId::new("amp_active", size), &size, |b, _| {
            b.iter(|| {
                env.note_off();
                env.note_on();
                env.process(black_box(&mut buffer));
            })
        });

        // Sustain phase (holding steady)
        let mut env = AmpEnvelope::new(&bindings);
        env.note_on();
        for _ in 0..48_000 {
            env.next_sample();
        }
        group.bench_with_input(BenchmarkId::new("amp_sustain", size), &size, |b, _| {
            b.iter(|| {
                env.process(black_box(&mut buffer));
            })
        });

        // Accent burst with the ceiling ratcheting every block
        let mut accent = AccentEnvelope::new(&bindings);
        group.bench_with_input(BenchmarkId::new("accent", size), &size, |b, _| {
            b.iter(|| {
                accent.note_on(black_box(127));
                accent.process(black_box(&mut buffer));
            })
        });
    }

    group.finish();
}
