use std::f32::consts::TAU;

use crate::DEFAULT_SAMPLE_RATE;

/*
| model          | slope     | character                          |
| -------------- | --------- | ---------------------------------- |
| SVFilter       | 12 dB/oct | clean, peaks gently with resonance |
| LadderFilter   | 24 dB/oct | steep, saturating feedback         |

Both are lowpass and both clamp the requested cutoff into
[MIN_CUTOFF_HZ, MAX_CUTOFF_RATIO * sample_rate].
*/

/// Lowest cutoff any model will run at.
pub const MIN_CUTOFF_HZ: f32 = 10.0;

/// Highest cutoff as a fraction of the sample rate. Modulation may ask for
/// more (accent overshoot does); models clamp.
pub const MAX_CUTOFF_RATIO: f32 = 0.49;

/// A filter the modulation stage can drive.
///
/// Cutoff and resonance are set once per block; `process` filters the
/// buffer in place.
pub trait FilterModel: Send {
    fn prepare(&mut self, sample_rate: f32);

    fn set_cutoff(&mut self, cutoff_hz: f32);

    fn set_resonance(&mut self, resonance: f32);

    fn process(&mut self, buffer: &mut [f32]);

    fn reset(&mut self);
}

#[inline]
pub(crate) fn clamp_cutoff(cutoff_hz: f32, sample_rate: f32) -> f32 {
    let upper = (sample_rate * MAX_CUTOFF_RATIO).max(MIN_CUTOFF_HZ);
    if cutoff_hz.is_nan() {
        return MIN_CUTOFF_HZ;
    }
    cutoff_hz.clamp(MIN_CUTOFF_HZ, upper)
}

/// Topology-preserving state-variable lowpass (12 dB/oct).
pub struct SVFilter {
    ic1eq: f32, // First integrator's memory
    ic2eq: f32, // Second integrator's memory

    cutoff_hz: f32,
    resonance: f32,
    sample_rate: f32,
}

impl SVFilter {
    /// Resonance is clamped below this so damping never reaches zero.
    pub const MAX_RESONANCE: f32 = 0.98;

    pub fn lowpass(cutoff_hz: f32) -> Self {
        Self {
            ic1eq: 0.0,
            ic2eq: 0.0,
            cutoff_hz,
            resonance: 0.0,
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }

    #[inline]
    fn compute_g(&self) -> f32 {
        let cutoff = clamp_cutoff(self.cutoff_hz, self.sample_rate);
        let wd = TAU * cutoff;
        let wa = (2.0 * self.sample_rate) * (wd / (2.0 * self.sample_rate)).tan();
        wa / (2.0 * self.sample_rate)
    }

    /// One step of the two integrators; returns the lowpass tap.
    #[inline]
    pub fn next_sample(&mut self, sample: f32, k: f32, g: f32) -> f32 {
        let h = 1.0 / (1.0 + g * (g + k));
        let v3 = sample - self.ic2eq;
        let v1 = h * (self.ic1eq + g * v3);
        let v2 = self.ic2eq + g * v1;

        self.ic1eq = 2.0 * v1 - self.ic1eq;
        self.ic2eq = 2.0 * v2 - self.ic2eq;

        v2
    }
}

impl FilterModel for SVFilter {
    fn prepare(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        self.reset();
    }

    fn set_cutoff(&mut self, cutoff_hz: f32) {
        self.cutoff_hz = cutoff_hz;
    }

    fn set_resonance(&mut self, resonance: f32) {
        self.resonance = resonance.clamp(0.0, Self::MAX_RESONANCE);
    }

    fn process(&mut self, buffer: &mut [f32]) {
        let g = self.compute_g();
        let k = 2.0 - (2.0 * self.resonance);

        for sample in buffer.iter_mut() {
            *sample = self.next_sample(*sample, k, g);
        }
    }

    fn reset(&mut self) {
        self.ic1eq = 0.0;
        self.ic2eq = 0.0;
    }
}

/// Sine test signal shared by the filter tests.
#[cfg(test)]
pub(crate) fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (TAU * freq * i as f32 / sample_rate).sin())
        .collect()
}

/// Peak magnitude once the filter has settled.
#[cfg(test)]
pub(crate) fn peak_after_transient(buffer: &[f32]) -> f32 {
    let skip = buffer.len().min(256);
    buffer
        .get(skip..)
        .unwrap_or(buffer)
        .iter()
        .fold(0.0f32, |acc, &x| acc.max(x.abs()))
}
