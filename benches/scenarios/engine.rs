//! Benchmarks for the complete engine.
//!
//! A held bass note with the filter knob swept and accents firing, which is
//! the busiest the callback gets.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion};
use acid_dsp::control::{ControlBroker, ParamId};
use acid_dsp::dsp::SawSquareOscillator;
use acid_dsp::engine::Engine;
use acid_dsp::io::{ControlKind, MidiEvent};

use crate::BLOCK_SIZES;

pub fn bench_engine(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/engine");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size];

        // === HELD NOTE ===
        let broker = Arc::new(ControlBroker::with_defaults());
        let mut engine = Engine::new(Arc::clone(&broker), SawSquareOscillator::new());
        engine.prepare(48_000.0);
        broker.submit(MidiEvent::NoteOn {
            channel: 1,
            key: 33,
            velocity: 100,
        });

        group.bench_with_input(BenchmarkId::new("held_note", size), &size, |b, _| {
            b.iter(|| {
                engine.process_block(black_box(&mut buffer));
            })
        });

        // === ACID LINE ===
        // Accented retriggers plus a cutoff sweep every block
        let broker = Arc::new(ControlBroker::with_defaults());
        let mut engine = Engine::new(Arc::clone(&broker), SawSquareOscillator::new());
        engine.prepare(48_000.0);
        let cutoff_cc = ParamId::Cutoff.default_spec().cc;
        let mut step = 0u32;

        group.bench_with_input(BenchmarkId::new("acid_line", size), &size, |b, _| {
            b.iter(|| {
                step = step.wrapping_add(1);
                let key = 33 + (step % 12) as u8;
                broker.submit_control_event(1, ControlKind::NoteOn, key, 127);
                broker.submit_control_event(1, ControlKind::NoteOff, key, 0);
                let delta = if step % 64 < 32 { 66 } else { 62 };
                broker.submit_control_event(1, ControlKind::ControlChange, cutoff_cc, delta);
                engine.process_block(black_box(&mut buffer));
            })
        });
    }

    group.finish();
}
