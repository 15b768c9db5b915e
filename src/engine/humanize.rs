use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// Relative spread of the per-block factor: 0.01 means +/-1%.
pub const HUMANIZE_RANGE: f32 = 0.01;

/// Per-block random multiplier in [1 - range, 1 + range].
///
/// Nudging cutoff and resonance a little every block keeps a held note
/// from sounding frozen, the way component drift does on hardware.
#[derive(Debug, Clone)]
pub struct Humanizer {
    rng: SmallRng,
    range: f32,
}

impl Humanizer {
    pub fn new(range: f32, seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            range: range.abs().min(1.0),
        }
    }

    #[inline]
    pub fn next_factor(&mut self) -> f32 {
        if self.range == 0.0 {
            return 1.0;
        }
        self.rng.random_range(1.0 - self.range..=1.0 + self.range)
    }
}
