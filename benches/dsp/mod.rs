//! Benchmarks for the audio-rate building blocks.

mod broker;
mod envelope;
mod filter;

pub use broker::bench_broker;
pub use envelope::bench_envelope;
pub use filter::bench_filter;
