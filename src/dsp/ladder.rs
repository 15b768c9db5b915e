use std::f32::consts::PI;

use super::filter::{clamp_cutoff, FilterModel};
use crate::DEFAULT_SAMPLE_RATE;

/*
Four-pole ladder lowpass (24 dB/oct)
====================================

           ┌──────────────── tanh(y4) * k ◄─────────────────┐
           ↓                                                 │
  in ──►(−)──► [1-pole] ──► [1-pole] ──► [1-pole] ──► [1-pole] ──┴──► out

Four trapezoidal one-pole sections in series with the last output fed back
through a tanh. The saturation keeps high-resonance settings bounded and
gives the squelch of the diode/transistor ladders this imitates.

Resonance runs 0..1 and maps to feedback 0..4; self-oscillation starts
close to the top.
*/

pub struct LadderFilter {
    stages: [f32; 4],
    cutoff_hz: f32,
    resonance: f32,
    sample_rate: f32,
}

impl LadderFilter {
    /// Feedback gain at full resonance.
    pub const MAX_FEEDBACK: f32 = 4.0;

    pub fn new() -> Self {
        Self {
            stages: [0.0; 4],
            cutoff_hz: 1000.0,
            resonance: 0.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    #[inline]
    fn next_sample(&mut self, input: f32, g: f32, k: f32) -> f32 {
        let feedback = self.stages[3].tanh() * k;
        let mut signal = (input - feedback).clamp(-5.0, 5.0);

        for state in self.stages.iter_mut() {
            let v = (signal - *state) * g / (1.0 + g);
            let y = v + *state;
            *state = y + v;
            signal = y;
        }

        signal
    }
}

impl Default for LadderFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterModel for LadderFilter {
    fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.reset();
    }

    fn set_cutoff(&mut self, cutoff_hz: f32) {
        self.cutoff_hz = cutoff_hz;
    }

    fn set_resonance(&mut self, resonance: f32) {
        self.resonance = resonance.clamp(0.0, 1.0);
    }

    fn process(&mut self, buffer: &mut [f32]) {
        let cutoff = clamp_cutoff(self.cutoff_hz, self.sample_rate);
        let g = (PI * cutoff / self.sample_rate).tan();
        let k = self.resonance * Self::MAX_FEEDBACK;

        for sample in buffer.iter_mut() {
            *sample = self.next_sample(*sample, g, k);
        }
    }

    fn reset(&mut self) {
        self.stages = [0.0; 4];
    }
}
