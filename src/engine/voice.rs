use crate::control::{ParamId, Parameter};
use crate::dsp::{AccentEnvelope, AmpEnvelope};
use crate::io::midi::{note_to_freq, NoteEvent};
use crate::MAX_BLOCK_SIZE;

use super::Bindings;

/// Portamento time at GLIDE = 1.0.
pub const MAX_GLIDE_SECONDS: f32 = 0.5;

/// Pitched source driven by the voice.
pub trait Oscillator: Send {
    fn prepare(&mut self, sample_rate: f32);

    /// Retune. With `slide` the oscillator glides to the new pitch,
    /// otherwise it jumps.
    fn set_frequency(&mut self, frequency_hz: f32, slide: bool);

    fn set_glide(&mut self, seconds: f32);

    /// 0.0 is a pure saw, 1.0 a pure square.
    fn set_waveform_ratio(&mut self, ratio: f32);

    fn process(&mut self, out: &mut [f32]);

    fn reset(&mut self);
}

/// The single voice of the instrument.
///
/// Keeps a stack of held keys with last-note priority: releasing the
/// sounding key slides back to the previous held one without retriggering,
/// and only releasing the last held key closes the amplitude envelope.
pub struct MonoVoice<O: Oscillator> {
    osc: O,
    amp: AmpEnvelope,
    accent: AccentEnvelope,
    held: Vec<u8>,
    glide: Parameter,
    waveform_ratio: Parameter,
    env_buffer: Box<[f32]>,
    accent_buffer: Box<[f32]>,
}

impl<O: Oscillator> MonoVoice<O> {
    pub fn new(osc: O, bindings: &Bindings) -> Self {
        Self {
            osc,
            amp: AmpEnvelope::new(bindings),
            accent: AccentEnvelope::new(bindings),
            // One slot per MIDI key, so pushes never reallocate
            held: Vec::with_capacity(128),
            glide: bindings.param(ParamId::Glide),
            waveform_ratio: bindings.param(ParamId::WaveformRatio),
            env_buffer: vec![0.0; MAX_BLOCK_SIZE].into_boxed_slice(),
            accent_buffer: vec![0.0; MAX_BLOCK_SIZE].into_boxed_slice(),
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.osc.prepare(sample_rate);
        self.amp.set_sample_rate(sample_rate);
        self.accent.set_sample_rate(sample_rate);
    }

    pub fn handle_note(&mut self, note: NoteEvent) {
        match note {
            NoteEvent::On { key, velocity } => self.note_on(key, velocity),
            NoteEvent::Off { key } => self.note_off(key),
        }
    }

    fn note_on(&mut self, key: u8, velocity: u8) {
        let slide = !self.held.is_empty();
        self.held.retain(|&held| held != key);
        self.held.push(key);

        self.osc.set_frequency(note_to_freq(key), slide);
        self.amp.note_on();
        self.accent.note_on(velocity);
    }

    fn note_off(&mut self, key: u8) {
        let sounding = self.held.last().copied();
        self.held.retain(|&held| held != key);

        if sounding != Some(key) {
            return;
        }
        match self.held.last() {
            Some(&previous) => self.osc.set_frequency(note_to_freq(previous), true),
            None => self.amp.note_off(),
        }
    }

    /// Render oscillator through the amplitude envelope into `out` and run
    /// the accent envelope alongside. Both envelopes publish to the bus.
    pub fn render(&mut self, out: &mut [f32]) {
        self.osc
            .set_glide(self.glide.current_value().max(0.0) * MAX_GLIDE_SECONDS);
        self.osc
            .set_waveform_ratio(self.waveform_ratio.current_value().clamp(0.0, 1.0));

        for chunk in out.chunks_mut(MAX_BLOCK_SIZE) {
            let len = chunk.len();
            let env = &mut self.env_buffer[..len];
            let accent = &mut self.accent_buffer[..len];

            self.osc.process(chunk);
            self.amp.process(env);
            self.accent.process(accent);

            for (sample, gain) in chunk.iter_mut().zip(env.iter()) {
                *sample *= gain;
            }
        }
    }

    pub fn reset(&mut self) {
        self.held.clear();
        self.osc.reset();
        self.amp.reset();
        self.accent.reset();
    }

    pub fn is_active(&self) -> bool {
        self.amp.is_active()
    }

    /// Key currently sounding, if any is held.
    pub fn current_key(&self) -> Option<u8> {
        self.held.last().copied()
    }

    pub fn amp_envelope(&self) -> &AmpEnvelope {
        &self.amp
    }

    pub fn accent_envelope(&self) -> &AccentEnvelope {
        &self.accent
    }

    pub fn oscillator(&self) -> &O {
        &self.osc
    }
}
