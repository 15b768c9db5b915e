use crate::DEFAULT_SAMPLE_RATE;

/*
Output Limiter
==============

Last stage before the output gain. Resonance makeup on the filter blend
can push the signal well past full scale; the limiter pulls it back under
the threshold without clipping the waveform.

  in ──┬──────────► delay line (lookahead) ──────────► × gain ──► out
       │                                                  ↑
       └─► |x| > threshold ? threshold/|x| : 1 ──► window min ──► smoothing
                                                                  (attack / release)

Each input sample stores the gain it would need. The smallest of those
over the lookahead window is where the envelope must be by the time that
sample leaves the delay line. Attack converges 99% within the lookahead,
release recovers toward unity with LIMITER_RELEASE_SECONDS.

The gain is never above 1.0, so quiet material comes out unchanged, only
delayed. A final clamp at the threshold catches the 1% attack residue.
*/

/// Ceiling in dBFS.
pub const LIMITER_THRESHOLD_DB: f32 = -0.1;

/// Recovery time toward unity gain.
pub const LIMITER_RELEASE_SECONDS: f32 = 0.010;

/// How far ahead peaks are seen.
pub const LOOKAHEAD_SECONDS: f32 = 0.0015;

/// Ring buffer size; ~5 ms at 192 kHz.
const MAX_LOOKAHEAD: usize = 1024;

/// ln(0.01): 99% convergence within the lookahead.
const ATTACK_CONVERGENCE: f32 = -4.605_17;

/// Feed-forward lookahead peak limiter.
pub struct Limiter {
    threshold: f32,
    lookahead: usize,
    delay: [f32; MAX_LOOKAHEAD],
    target_gains: [f32; MAX_LOOKAHEAD],
    write_pos: usize,
    gain: f32,
    attack_coeff: f32,
    release_coeff: f32,
}

impl Limiter {
    pub fn new() -> Self {
        let mut limiter = Self {
            threshold: db_to_gain(LIMITER_THRESHOLD_DB),
            lookahead: 1,
            delay: [0.0; MAX_LOOKAHEAD],
            target_gains: [1.0; MAX_LOOKAHEAD],
            write_pos: 0,
            gain: 1.0,
            attack_coeff: 0.0,
            release_coeff: 0.0,
        };
        limiter.prepare(DEFAULT_SAMPLE_RATE);
        limiter
    }

    /// Derive lookahead and smoothing for `sample_rate` and clear state.
    pub fn prepare(&mut self, sample_rate: f32) {
        let lookahead = (LOOKAHEAD_SECONDS * sample_rate).round() as usize;
        self.lookahead = lookahead.clamp(1, MAX_LOOKAHEAD - 1);
        self.attack_coeff = (ATTACK_CONVERGENCE / self.lookahead as f32).exp();
        self.release_coeff = (-1.0 / (LIMITER_RELEASE_SECONDS * sample_rate).max(1.0)).exp();
        self.reset();
    }

    pub fn process(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            let peak = sample.abs();
            self.target_gains[self.write_pos] = if peak > self.threshold {
                self.threshold / peak
            } else {
                1.0
            };

            let target = self.window_min_gain();
            let coeff = if target < self.gain {
                self.attack_coeff
            } else {
                self.release_coeff
            };
            self.gain = self.gain * coeff + target * (1.0 - coeff);

            let read_pos = (self.write_pos + MAX_LOOKAHEAD - self.lookahead) % MAX_LOOKAHEAD;
            let out = (self.delay[read_pos] * self.gain).clamp(-self.threshold, self.threshold);

            self.delay[self.write_pos] = *sample;
            *sample = out;
            self.write_pos = (self.write_pos + 1) % MAX_LOOKAHEAD;
        }
    }

    pub fn reset(&mut self) {
        self.delay.fill(0.0);
        self.target_gains.fill(1.0);
        self.write_pos = 0;
        self.gain = 1.0;
    }

    /// Delay added to the signal, in samples.
    pub fn latency(&self) -> usize {
        self.lookahead
    }

    #[inline]
    fn window_min_gain(&self) -> f32 {
        (0..=self.lookahead)
            .map(|i| self.target_gains[(self.write_pos + MAX_LOOKAHEAD - i) % MAX_LOOKAHEAD])
            .fold(1.0f32, f32::min)
    }
}

impl Default for Limiter {
    fn default() -> Self {
        Self::new()
    }
}

#[inline]
fn db_to_gain(db: f32) -> f32 {
    10f32.powf(db / 20.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: f32 = 48_000.0;

    fn limiter() -> Limiter {
        let mut limiter = Limiter::new();
        limiter.prepare(SAMPLE_RATE);
        limiter
    }

    #[test]
    fn quiet_signal_passes_unchanged_after_latency() {
        let mut limiter = limiter();
        let mut buffer = [0.5f32; 256];
        limiter.process(&mut buffer);

        let latency = limiter.latency();
        assert!(buffer[..latency].iter().all(|&s| s == 0.0));
        assert!(buffer[latency..].iter().all(|&s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn hot_signal_never_exceeds_threshold() {
        let mut limiter = limiter();
        let threshold = db_to_gain(LIMITER_THRESHOLD_DB);

        let mut buffer: Vec<f32> = (0..4096)
            .map(|i| 2.4 * (i as f32 * 0.05).sin())
            .collect();
        limiter.process(&mut buffer);

        assert!(buffer.iter().all(|s| s.abs() <= threshold));
        // Limited, not silenced
        assert!(buffer[2048..].iter().any(|s| s.abs() > 0.5 * threshold));
    }

    #[test]
    fn gain_recovers_after_a_burst() {
        let mut limiter = limiter();
        let mut burst = [4.0f32; 128];
        limiter.process(&mut burst);

        // Ten release time constants of quiet material
        let mut quiet = vec![0.25f32; (SAMPLE_RATE * LIMITER_RELEASE_SECONDS * 10.0) as usize];
        limiter.process(&mut quiet);

        let last = *quiet.last().unwrap();
        assert!((last - 0.25).abs() < 1e-3, "gain stuck at {}", last / 0.25);
    }

    #[test]
    fn reset_clears_delay_line() {
        let mut limiter = limiter();
        let mut loud = [3.0f32; 64];
        limiter.process(&mut loud);
        limiter.reset();

        let mut silence = [0.0f32; 64];
        limiter.process(&mut silence);
        assert!(silence.iter().all(|&s| s == 0.0));
    }
}
