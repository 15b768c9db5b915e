use std::sync::Arc;

use parking_lot::Mutex;

use super::envelope::{
    recompute_on_change, seconds, EnvelopeStage, StageShape, ATTACK_TARGET_RATIO,
    DECAY_RELEASE_TARGET_RATIO,
};
use crate::atomic::AtomicF32;
use crate::control::{ParamId, Parameter, Subscription};
use crate::engine::{Bindings, SignalBus, SignalId};
use crate::DEFAULT_SAMPLE_RATE;

/*
Accent Envelope
===============

A short attack/decay burst per note that pushes the filter open on
accented notes. Attack is fixed at 5 ms; ACCENT_DECAY sets the decay.

  value
   1.0 ┐ ╭╮
       │╱  ╲__
   0.0 └──────‾‾‾───→ time
        5ms  ACCENT_DECAY

Ceiling
-------

On hardware, firing accents in quick succession charges the accent
capacitor further each time, so fast accented runs build up. We model
that with a ceiling that starts at 1.0 and steps up on every note-on that
arrives before the envelope has gone idle:

    ceiling += 1 / (10 * ceiling)        (at most 2.0)

  note-on #   1     2      3      4      5   ...
  ceiling    1.0  1.100  1.191  1.275  1.353 ...

The steps shrink as the ceiling grows. Once the envelope falls back to idle
the ceiling is back at 1.0.

Output
------

The envelope runs normalized to 1.0. What reaches the bus is the block
peak scaled by the ceiling and by the note's accent amount:

    amount = velocity / 127 * max(ACCENT, ACCENT_FLOOR)

so an accent is always felt a little, even with the knob at zero.
*/

/// Fixed attack time of the accent burst.
pub const ACCENT_ATTACK_SECONDS: f32 = 0.005;

/// Upper bound of the ratcheting ceiling.
pub const MAX_CEILING: f32 = 2.0;

/// Minimum accent amount regardless of the ACCENT setting.
pub const ACCENT_FLOOR: f32 = 0.1;

struct AccentShape {
    recompute_lock: Mutex<()>,
    sample_rate: AtomicF32,
    attack: StageShape,
    decay: StageShape,
    decay_time: Parameter,
}

impl AccentShape {
    fn recompute(&self) {
        let _guard = self.recompute_lock.lock();
        let sample_rate = self.sample_rate.load();
        self.attack.configure(
            ACCENT_ATTACK_SECONDS,
            sample_rate,
            ATTACK_TARGET_RATIO,
            1.0 + ATTACK_TARGET_RATIO,
        );
        self.decay.configure(
            seconds(&self.decay_time),
            sample_rate,
            DECAY_RELEASE_TARGET_RATIO,
            -DECAY_RELEASE_TARGET_RATIO,
        );
    }
}

/// Accent envelope bound to ACCENT and ACCENT_DECAY.
///
/// Publishes the scaled block peak on [`SignalId::ACCENT_ENV`].
pub struct AccentEnvelope {
    shape: Arc<AccentShape>,
    _subscription: Vec<Subscription>,
    accent: Parameter,
    bus: Arc<SignalBus>,
    stage: EnvelopeStage,
    value: f32,
    ceiling: f32,
    amount: f32,
}

impl AccentEnvelope {
    pub fn new(bindings: &Bindings) -> Self {
        let shape = Arc::new(AccentShape {
            recompute_lock: Mutex::new(()),
            sample_rate: AtomicF32::new(DEFAULT_SAMPLE_RATE),
            attack: StageShape::default(),
            decay: StageShape::default(),
            decay_time: bindings.param(ParamId::AccentDecay),
        });
        shape.recompute();
        let subscription =
            recompute_on_change(&shape, &[&shape.decay_time], AccentShape::recompute);

        Self {
            shape,
            _subscription: subscription,
            accent: bindings.param(ParamId::Accent),
            bus: Arc::clone(&bindings.bus),
            stage: EnvelopeStage::Idle,
            value: 0.0,
            ceiling: 1.0,
            amount: 0.0,
        }
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.shape.sample_rate.store(sample_rate);
        self.shape.recompute();
    }

    /// Fire the accent. Overlapping a running burst raises the ceiling.
    pub fn note_on(&mut self, velocity: u8) {
        if self.stage != EnvelopeStage::Idle {
            self.ceiling = (self.ceiling + 1.0 / (10.0 * self.ceiling)).min(MAX_CEILING);
        }

        let accent = self.accent.current_value().max(ACCENT_FLOOR);
        self.amount = f32::from(velocity.min(127)) / 127.0 * accent;
        self.stage = EnvelopeStage::Attack;
    }

    /// Advance one sample and return the normalized value.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Attack => {
                self.value = self.shape.attack.step(self.value);
                if self.value >= 1.0 {
                    self.value = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                self.value = self.shape.decay.step(self.value);
                if self.value <= 0.0 {
                    self.go_idle();
                }
            }
            // The burst has no sustain or release of its own
            EnvelopeStage::Sustain | EnvelopeStage::Release => self.go_idle(),
            EnvelopeStage::Idle => {}
        }
        self.value
    }

    /// Render one block of scaled output and publish the scaled block peak.
    pub fn process(&mut self, out: &mut [f32]) {
        let mut peak = 0.0f32;
        for sample in out.iter_mut() {
            let scale = self.ceiling * self.amount;
            *sample = self.next_sample() * scale;
            peak = peak.max(*sample);
        }
        self.bus.write(SignalId::ACCENT_ENV, peak);
    }

    pub fn reset(&mut self) {
        self.go_idle();
    }

    pub fn is_active(&self) -> bool {
        self.stage != EnvelopeStage::Idle
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn ceiling(&self) -> f32 {
        self.ceiling
    }

    fn go_idle(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.value = 0.0;
        self.ceiling = 1.0;
    }
}
