use crate::engine::Oscillator;
use crate::DEFAULT_SAMPLE_RATE;

/*
Saw/Square Oscillator
=====================

The classic acid bass source: a sawtooth that morphs into a square.

  ratio 0.0   saw      /|/|/|
  ratio 1.0   square   ‾|_|‾|_

Both shapes are naive ramps with a PolyBLEP correction at each
discontinuity, which removes most of the aliasing for the cost of a couple
of multiplies per edge.

Glide
-----

When a note slides in over a held note the frequency chases the new target
with a one-pole curve:

    freq += (target - freq) * (1 - exp(-1 / (glide_seconds * sample_rate)))

A fresh (non-sliding) note jumps straight to its pitch.
*/

pub struct SawSquareOscillator {
    phase: f32,
    frequency: f32,
    target_frequency: f32,
    glide_seconds: f32,
    glide_coeff: f32,
    waveform_ratio: f32,
    sample_rate: f32,
}

impl SawSquareOscillator {
    pub fn new() -> Self {
        Self {
            phase: 0.0,
            frequency: 110.0,
            target_frequency: 110.0,
            glide_seconds: 0.0,
            glide_coeff: 1.0,
            waveform_ratio: 0.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    fn update_glide_coeff(&mut self) {
        let samples = self.glide_seconds * self.sample_rate;
        self.glide_coeff = if samples <= 1.0 {
            1.0
        } else {
            1.0 - (-1.0 / samples).exp()
        };
    }

    #[inline]
    fn next_sample(&mut self) -> f32 {
        self.frequency += (self.target_frequency - self.frequency) * self.glide_coeff;
        let dt = (self.frequency / self.sample_rate).clamp(0.0, 0.5);

        let saw = 2.0 * self.phase - 1.0 - poly_blep(self.phase, dt);

        let mut square = if self.phase < 0.5 { 1.0 } else { -1.0 };
        square += poly_blep(self.phase, dt);
        square -= poly_blep((self.phase + 0.5).fract(), dt);

        self.phase += dt;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        saw + (square - saw) * self.waveform_ratio
    }
}

impl Default for SawSquareOscillator {
    fn default() -> Self {
        Self::new()
    }
}

/// Polynomial band-limited step residual for a discontinuity at phase 0.
#[inline]
fn poly_blep(phase: f32, dt: f32) -> f32 {
    if dt <= 0.0 {
        0.0
    } else if phase < dt {
        let t = phase / dt;
        t + t - t * t - 1.0
    } else if phase > 1.0 - dt {
        let t = (phase - 1.0) / dt;
        t * t + t + t + 1.0
    } else {
        0.0
    }
}

impl Oscillator for SawSquareOscillator {
    fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.update_glide_coeff();
    }

    fn set_frequency(&mut self, frequency_hz: f32, slide: bool) {
        self.target_frequency = frequency_hz.max(0.0);
        if !slide {
            self.frequency = self.target_frequency;
        }
    }

    fn set_glide(&mut self, seconds: f32) {
        let seconds = seconds.max(0.0);
        if seconds != self.glide_seconds {
            self.glide_seconds = seconds;
            self.update_glide_coeff();
        }
    }

    fn set_waveform_ratio(&mut self, ratio: f32) {
        self.waveform_ratio = ratio.clamp(0.0, 1.0);
    }

    fn process(&mut self, out: &mut [f32]) {
        for sample in out.iter_mut() {
            *sample = self.next_sample();
        }
    }

    fn reset(&mut self) {
        self.phase = 0.0;
        self.frequency = self.target_frequency;
    }
}
