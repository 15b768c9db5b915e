//! Audio-thread orchestration.
//!
//! Per block: drain the broker's notes, render the voice (which publishes
//! both envelope levels on the bus), run the filter stage, which reads
//! them back, then limit and attenuate for the output.

pub mod bindings;
pub mod bus;
pub mod filter;
pub mod humanize;
pub mod voice;

use std::sync::Arc;

pub use self::bindings::Bindings;
pub use self::bus::{SignalBus, SignalId};
pub use self::filter::FilterStage;
pub use self::humanize::Humanizer;
pub use self::voice::{MonoVoice, Oscillator};

use crate::control::ControlBroker;
use crate::dsp::{FilterModel, LadderFilter, Limiter, SVFilter};
use crate::io::midi::NoteEvent;
use crate::{DEFAULT_SAMPLE_RATE, MAX_BLOCK_SIZE};

/// Upper bound on notes handled per drained block.
const NOTE_SCRATCH_CAPACITY: usize = 256;

/// Fixed attenuation after the limiter, leaving headroom for the host.
pub const OUTPUT_GAIN: f32 = 0.5;

pub struct Engine<O: Oscillator, P: FilterModel = LadderFilter, S: FilterModel = SVFilter> {
    broker: Arc<ControlBroker>,
    bindings: Bindings,
    voice: MonoVoice<O>,
    filter: FilterStage<P, S>,
    limiter: Limiter,
    notes: Vec<NoteEvent>,
    sample_rate: f32,
}

impl<O: Oscillator> Engine<O> {
    /// Wire `osc` to the broker with the ladder as primary filter and the
    /// state-variable lowpass as secondary.
    pub fn new(broker: Arc<ControlBroker>, osc: O) -> Self {
        let bindings = Bindings::from_broker(&broker);
        Self::with_filters(
            broker,
            bindings,
            osc,
            LadderFilter::new(),
            SVFilter::lowpass(1000.0),
        )
    }
}

impl<O: Oscillator, P: FilterModel, S: FilterModel> Engine<O, P, S> {
    pub fn with_filters(
        broker: Arc<ControlBroker>,
        bindings: Bindings,
        osc: O,
        primary: P,
        secondary: S,
    ) -> Self {
        let mut engine = Self {
            voice: MonoVoice::new(osc, &bindings),
            filter: FilterStage::new(primary, secondary, &bindings),
            limiter: Limiter::new(),
            broker,
            bindings,
            notes: Vec::with_capacity(NOTE_SCRATCH_CAPACITY),
            sample_rate: DEFAULT_SAMPLE_RATE,
        };
        engine.prepare(DEFAULT_SAMPLE_RATE);
        engine
    }

    /// Propagate a new sample rate to the voice, both filter models and
    /// the limiter.
    pub fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.voice.set_sample_rate(sample_rate);
        self.filter.prepare(sample_rate);
        self.limiter.prepare(sample_rate);
    }

    /// Render one mono block into `out`. Real-time safe.
    pub fn process_block(&mut self, out: &mut [f32]) {
        for chunk in out.chunks_mut(MAX_BLOCK_SIZE) {
            self.broker.drain_note_buffer(&mut self.notes);
            for &note in &self.notes {
                self.voice.handle_note(note);
            }

            self.voice.render(chunk);
            self.filter.process(chunk);
            self.limiter.process(chunk);
            for sample in chunk.iter_mut() {
                *sample *= OUTPUT_GAIN;
            }
        }
    }

    /// Silence everything: envelopes idle, filter and limiter state and the
    /// bus cleared.
    pub fn reset(&mut self) {
        self.voice.reset();
        self.filter.reset();
        self.limiter.reset();
        self.bindings.bus.clear();
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn voice(&self) -> &MonoVoice<O> {
        &self.voice
    }

    pub fn filter(&self) -> &FilterStage<P, S> {
        &self.filter
    }
}
