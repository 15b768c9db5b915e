//! Benchmarks for the real-time side of the control broker.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use acid_dsp::control::ControlBroker;
use acid_dsp::io::{MidiEvent, NoteEvent};

pub fn bench_broker(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/broker");
    let broker = ControlBroker::with_defaults();
    let mut drained: Vec<NoteEvent> = Vec::with_capacity(256);

    // Empty drain: what every block pays when nobody is playing
    group.bench_function("drain_empty", |b| {
        b.iter(|| {
            broker.drain_note_buffer(black_box(&mut drained));
        })
    });

    for &notes in &[1usize, 8, 32] {
        group.bench_with_input(BenchmarkId::new("submit_and_drain", notes), &notes, |b, &n| {
            b.iter(|| {
                for key in 0..n {
                    broker.submit(MidiEvent::NoteOn {
                        channel: 1,
                        key: key as u8,
                        velocity: 100,
                    });
                }
                broker.drain_note_buffer(black_box(&mut drained));
            })
        });
    }

    group.finish();
}
