//! Audio-rate building blocks.
//!
//! Everything here is allocation-free once constructed and safe to run
//! inside the audio callback. Timing parameters are read through shared
//! [`Parameter`](crate::control::Parameter) handles, so a knob moved on an
//! ingestion thread shows up at the next sample without any locking.

/// Accent envelope with the ratcheting ceiling.
pub mod accent;
/// Exponential ADSR amplitude envelope.
pub mod envelope;
/// Filter model trait and the state-variable lowpass.
pub mod filter;
/// Four-pole ladder lowpass.
pub mod ladder;
/// Lookahead peak limiter for the output.
pub mod limiter;
/// Band-limited saw/square source.
pub mod oscillator;

pub use accent::AccentEnvelope;
pub use envelope::{AmpEnvelope, EnvelopeStage};
pub use filter::{FilterModel, SVFilter};
pub use ladder::LadderFilter;
pub use limiter::Limiter;
pub use oscillator::SawSquareOscillator;
