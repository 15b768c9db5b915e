pub mod atomic; // f32 atomics for lock-free sharing
pub mod control; // Parameters, controller mapping, presets
pub mod dsp;
pub mod engine; // Per-block orchestration and the signal bus
pub mod io;

pub const MAX_BLOCK_SIZE: usize = 2048;
pub const DEFAULT_SAMPLE_RATE: f32 = 48_000.0;
pub const MIN_TIME: f32 = 1.0 / 48_000.0;
