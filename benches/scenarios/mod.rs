//! Real-world scenario benchmarks.
//!
//! The full engine as the audio callback drives it.

mod engine;

pub use engine::bench_engine;
