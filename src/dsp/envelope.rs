use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::atomic::AtomicF32;
use crate::control::{ParamId, Parameter, Subscription};
use crate::engine::{Bindings, SignalBus, SignalId};
use crate::{DEFAULT_SAMPLE_RATE, MIN_TIME};

/*
Exponential ADSR Envelope
=========================

This module implements the amplitude envelope of the instrument, shaped
like the capacitor charge/discharge of an analog envelope circuit rather
than straight lines.

Vocabulary
----------

  value       The envelope's current output (0.0 to 1.0).

  stage       Idle, Attack, Decay, Sustain or Release.

  coefficient How much of the previous value survives each sample (0..1).
              Derived from the stage time and the sample rate.

  base        What gets added every sample. Together with the coefficient
              it fixes the curve's asymptote: asymptote = base / (1 - coeff).

  target ratio How far past the stage boundary the asymptote sits, relative
              to the stage's full swing. Small ratios give a long, slow tail;
              large ratios give something close to a straight line.


The Shape: One-Pole Curves
--------------------------

Every active stage runs the same recurrence:

    value = base + value * coefficient

which is a one-pole lowpass chasing an asymptote. The trick is that the
asymptote sits *beyond* the boundary the stage is aiming for, so the curve
actually crosses it in finite time:

  Level
   1.3 ┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄┄  attack asymptote (1 + 0.3)
   1.0 ┐      ╭╮
       │     ╱  ╲_
    S  │    ╱     ‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾‾╲
       │   ╱                       ╲_
   0.0 └──╱──────────────────────────‾‾──→ Time
   ───────────────────────────────────────  release asymptote (0 - 0.0001)

Attack uses a ratio of 0.3: the curve is still bending when it hits 1.0,
which gives the snappy, slightly convex attack of analog gear. Decay and
release use 0.0001: a nearly pure exponential tail that still reaches its
boundary.


The Math: Time to Coefficient
-----------------------------

For a stage lasting `n` samples with target ratio `r`:

    coefficient = exp(-ln((1 + r) / r) / n)

    attack   base = (1 + r)       * (1 - coefficient)
    decay    base = (sustain - r) * (1 - coefficient)
    release  base = (0 - r)       * (1 - coefficient)

A zero-length stage gets coefficient 0, so its first sample lands on the
asymptote and the stage ends immediately.


The State Machine
-----------------

    ┌──────┐ note_on  ┌────────┐ value ≥ 1 ┌───────┐ value ≤ S ┌─────────┐
    │ Idle │ ───────→ │ Attack │ ────────→ │ Decay │ ────────→ │ Sustain │
    └──────┘          └────────┘           └───────┘           └─────────┘
        ↑                 ↑  │ note_off        │ note_off           │ note_off
        │  value ≤ 0      │  ↓                 ↓                    ↓
        └──────────── ┌─────────┐ ←──────────────────────────────────┘
                      │ Release │
                      └─────────┘
                        note_on (legato: restart attack from current value)

On every boundary crossing the value is snapped exactly onto the boundary
before the stage changes.

Note-on only acts from Idle or Release. A note-on while the gate is already
high (attack, decay, sustain) leaves the stage alone: overlapping notes on
a mono synth slide rather than retrigger.


Sharing Across Threads
----------------------

Coefficients and bases live in atomics next to the parameter handles they
come from. Moving a knob runs the parameter's listener on the ingestion
thread, which recomputes the affected stages and stores coefficient and
base separately. The audio thread may see a fresh coefficient with a stale
base (or the reverse) for one sample. That sample is off by at most one
coefficient step and the next one is exact.

Recomputes are serialized by a lock on the ingestion side, so two threads
moving knobs at once cannot leave an older read stored last. The audio
thread never touches that lock.
*/

/// Attack curve target ratio.
pub const ATTACK_TARGET_RATIO: f32 = 0.3;

/// Decay and release curve target ratio.
pub const DECAY_RELEASE_TARGET_RATIO: f32 = 0.0001;

/// Per-sample coefficient of an exponential segment lasting `num_samples`.
#[inline]
pub fn exp_env_coeff(num_samples: f32, target_ratio: f32) -> f32 {
    if num_samples <= 0.0 {
        return 0.0;
    }
    (-((1.0 + target_ratio) / target_ratio).ln() / num_samples).exp()
}

/// Stage of the envelope state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

/// Coefficient and base of one exponential stage.
#[derive(Debug, Default)]
pub struct StageShape {
    coefficient: AtomicF32,
    base: AtomicF32,
}

impl StageShape {
    /// Configure a stage of `seconds` at `sample_rate` that chases
    /// `asymptote`.
    pub fn configure(&self, seconds: f32, sample_rate: f32, target_ratio: f32, asymptote: f32) {
        let num_samples = seconds.max(0.0) * sample_rate;
        let coefficient = exp_env_coeff(num_samples, target_ratio);
        self.coefficient.store(coefficient);
        self.base.store(asymptote * (1.0 - coefficient));
    }

    #[inline]
    pub fn step(&self, value: f32) -> f32 {
        self.base.load() + value * self.coefficient.load()
    }

    #[cfg(test)]
    pub(crate) fn coefficient(&self) -> f32 {
        self.coefficient.load()
    }
}

/// Stage shapes of the amplitude envelope plus the parameters they derive
/// from. Shared between the audio-side envelope and the parameter
/// listeners.
struct AmpShape {
    recompute_lock: Mutex<()>,
    sample_rate: AtomicF32,
    attack: StageShape,
    decay: StageShape,
    release: StageShape,
    sustain: AtomicF32,

    attack_time: Parameter,
    decay_time: Parameter,
    sustain_level: Parameter,
    release_time: Parameter,
}

impl AmpShape {
    fn recompute(&self) {
        let _guard = self.recompute_lock.lock();
        let sample_rate = self.sample_rate.load();
        let sustain = self.sustain_level.current_value().clamp(0.0, 1.0);

        self.sustain.store(sustain);
        self.attack.configure(
            seconds(&self.attack_time),
            sample_rate,
            ATTACK_TARGET_RATIO,
            1.0 + ATTACK_TARGET_RATIO,
        );
        self.decay.configure(
            seconds(&self.decay_time),
            sample_rate,
            DECAY_RELEASE_TARGET_RATIO,
            sustain - DECAY_RELEASE_TARGET_RATIO,
        );
        self.release.configure(
            seconds(&self.release_time),
            sample_rate,
            DECAY_RELEASE_TARGET_RATIO,
            -DECAY_RELEASE_TARGET_RATIO,
        );
    }
}

/// Stage time in seconds. Invalid handles read as the shortest stage.
pub(crate) fn seconds(param: &Parameter) -> f32 {
    param.current_value().max(MIN_TIME)
}

/// Register `recompute` on every parameter in `params`.
///
/// Listeners hold only a weak reference to the shape, and the returned
/// subscriptions unregister them when the envelope is dropped.
pub(crate) fn recompute_on_change<T, F>(
    shape: &Arc<T>,
    params: &[&Parameter],
    recompute: F,
) -> Vec<Subscription>
where
    T: Send + Sync + 'static,
    F: Fn(&T) + Clone + Send + Sync + 'static,
{
    params
        .iter()
        .map(|param| {
            let weak: Weak<T> = Arc::downgrade(shape);
            let recompute = recompute.clone();
            param.subscribe(move |_| {
                if let Some(shape) = weak.upgrade() {
                    recompute(&shape);
                }
            })
        })
        .collect()
}

/// Amplitude envelope bound to ATTACK, DECAY, SUSTAIN and RELEASE.
///
/// Publishes the mean of every rendered block on [`SignalId::AMP_ENV`].
pub struct AmpEnvelope {
    shape: Arc<AmpShape>,
    _subscriptions: Vec<Subscription>,
    bus: Arc<SignalBus>,
    stage: EnvelopeStage,
    value: f32,
}

impl AmpEnvelope {
    pub fn new(bindings: &Bindings) -> Self {
        let shape = Arc::new(AmpShape {
            recompute_lock: Mutex::new(()),
            sample_rate: AtomicF32::new(DEFAULT_SAMPLE_RATE),
            attack: StageShape::default(),
            decay: StageShape::default(),
            release: StageShape::default(),
            sustain: AtomicF32::new(0.0),
            attack_time: bindings.param(ParamId::Attack),
            decay_time: bindings.param(ParamId::Decay),
            sustain_level: bindings.param(ParamId::Sustain),
            release_time: bindings.param(ParamId::Release),
        });
        shape.recompute();

        let subscriptions = recompute_on_change(
            &shape,
            &[
                &shape.attack_time,
                &shape.decay_time,
                &shape.sustain_level,
                &shape.release_time,
            ],
            AmpShape::recompute,
        );

        Self {
            shape,
            _subscriptions: subscriptions,
            bus: Arc::clone(&bindings.bus),
            stage: EnvelopeStage::Idle,
            value: 0.0,
        }
    }

    /// Recompute every stage for a new sample rate.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.shape.sample_rate.store(sample_rate);
        self.shape.recompute();
    }

    pub fn sample_rate(&self) -> f32 {
        self.shape.sample_rate.load()
    }

    /// Gate high. Starts the attack from the current value when idle or
    /// releasing; ignored otherwise.
    pub fn note_on(&mut self) {
        if matches!(self.stage, EnvelopeStage::Idle | EnvelopeStage::Release) {
            self.stage = EnvelopeStage::Attack;
        }
    }

    /// Gate low: release from wherever the envelope is.
    pub fn note_off(&mut self) {
        if self.stage != EnvelopeStage::Idle {
            self.stage = EnvelopeStage::Release;
        }
    }

    /// Advance one sample and return the new value.
    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let shape = &*self.shape;
        match self.stage {
            EnvelopeStage::Idle => {
                self.value = 0.0;
            }
            EnvelopeStage::Attack => {
                self.value = shape.attack.step(self.value);
                if self.value >= 1.0 {
                    self.value = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
            }
            EnvelopeStage::Decay => {
                let sustain = shape.sustain.load();
                self.value = shape.decay.step(self.value);
                if self.value <= sustain {
                    self.value = sustain;
                    self.stage = EnvelopeStage::Sustain;
                }
            }
            EnvelopeStage::Sustain => {
                self.value = shape.sustain.load();
            }
            EnvelopeStage::Release => {
                self.value = shape.release.step(self.value);
                if self.value <= 0.0 {
                    self.value = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
            }
        }
        self.value
    }

    /// Render one block of envelope values and publish the block mean.
    pub fn process(&mut self, out: &mut [f32]) {
        if out.is_empty() {
            return;
        }

        let mut sum = 0.0;
        for sample in out.iter_mut() {
            *sample = self.next_sample();
            sum += *sample;
        }
        self.bus.write(SignalId::AMP_ENV, sum / out.len() as f32);
    }

    /// Force the envelope idle. Parameter values are left alone.
    pub fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.value = 0.0;
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

    #[cfg(test)]
    fn attack_shape(&self) -> &StageShape {
        &self.shape.attack
    }
}
