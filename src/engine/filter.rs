use std::sync::Arc;

use super::bus::{SignalBus, SignalId};
use super::humanize::{Humanizer, HUMANIZE_RANGE};
use super::Bindings;
use crate::control::{ParamId, Parameter};
use crate::dsp::FilterModel;
use crate::MAX_BLOCK_SIZE;

/*
Filter Modulation
=================

Once per block the stage turns the knobs and the envelope levels on the
bus into a cutoff, then runs two filter models side by side and blends
them.

  AMP_ENV ──× ENV_MOD × K1 ──┐
                             ├──+──► cutoff ratio ──► Hz ──× humanize ──► primary ──┐
  ACCENT_ENV ──× K2 ─────────┘  ↑                                                   ├─ mix ──► out
                       CUTOFF ratio                            RESONANCE ──► secondary × comp ─┘

Ratio to Hz
-----------

    ratio = CUTOFF.unscaled_ratio() + amp * ENV_MOD * K1 + accent * K2

    ratio ≤ 1    CUTOFF.value_for_ratio(ratio)
    ratio > 1    ratio² * CUTOFF.value_for_ratio(1.0)

Past the top of the knob the cutoff keeps climbing quadratically instead of
pinning at the maximum, so a hard accent on a wide-open filter still
opens it further. The filter models clamp below Nyquist.

Blend
-----

The secondary model gets louder makeup gain as resonance rises:

    out = (1 - mix) * primary + mix * secondary * (1 + 1.5 * resonance)
*/

/// Weight of the amplitude envelope on the cutoff ratio (K1).
pub const ENV_MOD_AMOUNT: f32 = 0.5;

/// Weight of the accent envelope on the cutoff ratio (K2).
pub const ACCENT_AMOUNT: f32 = 0.25;

/// Makeup gain slope of the secondary model against resonance.
pub const RESONANCE_COMPENSATION: f32 = 1.5;

const DEFAULT_HUMANIZE_SEED: u64 = 0x5EED_ACD1;

/// Cutoff in Hz for a modulated ratio, extrapolating quadratically past 1.0.
pub fn cutoff_for_ratio(cutoff: &Parameter, ratio: f32) -> f32 {
    if ratio <= 1.0 {
        cutoff.value_for_ratio(ratio.max(0.0))
    } else {
        ratio * ratio * cutoff.value_for_ratio(1.0)
    }
}

pub struct FilterStage<P: FilterModel, S: FilterModel> {
    primary: P,
    secondary: S,
    cutoff: Parameter,
    resonance: Parameter,
    env_mod: Parameter,
    mix: Parameter,
    bus: Arc<SignalBus>,
    humanizer: Humanizer,
    scratch: Box<[f32]>,
    last_cutoff: f32,
    last_resonance: f32,
}

impl<P: FilterModel, S: FilterModel> FilterStage<P, S> {
    pub fn new(primary: P, secondary: S, bindings: &Bindings) -> Self {
        Self::with_humanizer(
            primary,
            secondary,
            bindings,
            Humanizer::new(HUMANIZE_RANGE, DEFAULT_HUMANIZE_SEED),
        )
    }

    pub fn with_humanizer(
        primary: P,
        secondary: S,
        bindings: &Bindings,
        humanizer: Humanizer,
    ) -> Self {
        Self {
            primary,
            secondary,
            cutoff: bindings.param(ParamId::Cutoff),
            resonance: bindings.param(ParamId::Resonance),
            env_mod: bindings.param(ParamId::EnvMod),
            mix: bindings.param(ParamId::FilterMix),
            bus: Arc::clone(&bindings.bus),
            humanizer,
            scratch: vec![0.0; MAX_BLOCK_SIZE].into_boxed_slice(),
            last_cutoff: 0.0,
            last_resonance: 0.0,
        }
    }

    pub fn prepare(&mut self, sample_rate: f32) {
        self.primary.prepare(sample_rate);
        self.secondary.prepare(sample_rate);
    }

    /// Cutoff ratio from the knob and the current bus levels.
    pub fn cutoff_ratio(&self) -> f32 {
        let env_mod =
            self.bus.read(SignalId::AMP_ENV) * self.env_mod.current_value() * ENV_MOD_AMOUNT;
        let accent = self.bus.read(SignalId::ACCENT_ENV) * ACCENT_AMOUNT;
        self.cutoff.unscaled_ratio() + env_mod + accent
    }

    /// Modulated cutoff in Hz, before humanization.
    pub fn modulated_cutoff(&self) -> f32 {
        cutoff_for_ratio(&self.cutoff, self.cutoff_ratio())
    }

    /// Filter `buffer` in place.
    pub fn process(&mut self, buffer: &mut [f32]) {
        for chunk in buffer.chunks_mut(MAX_BLOCK_SIZE) {
            self.process_chunk(chunk);
        }
    }

    fn process_chunk(&mut self, buffer: &mut [f32]) {
        let cutoff = self.modulated_cutoff() * self.humanizer.next_factor();
        let resonance =
            self.resonance.current_value().max(0.0) * self.humanizer.next_factor();
        self.last_cutoff = cutoff;
        self.last_resonance = resonance;

        self.primary.set_cutoff(cutoff);
        self.primary.set_resonance(resonance);
        self.secondary.set_cutoff(cutoff);
        self.secondary.set_resonance(resonance);

        let secondary = &mut self.scratch[..buffer.len()];
        secondary.copy_from_slice(buffer);

        self.primary.process(buffer);
        self.secondary.process(secondary);

        let mix = self.mix.current_value().clamp(0.0, 1.0);
        let compensation = 1.0 + RESONANCE_COMPENSATION * resonance;
        for (out, wet) in buffer.iter_mut().zip(secondary.iter()) {
            *out = (1.0 - mix) * *out + mix * *wet * compensation;
        }
    }

    pub fn reset(&mut self) {
        self.primary.reset();
        self.secondary.reset();
    }

    /// Cutoff applied to the models in the last block (after humanization).
    pub fn last_cutoff(&self) -> f32 {
        self.last_cutoff
    }

    pub fn last_resonance(&self) -> f32 {
        self.last_resonance
    }

    pub fn primary(&self) -> &P {
        &self.primary
    }

    pub fn secondary(&self) -> &S {
        &self.secondary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::{BrokerConfig, ParameterMap};

    /// Multiplies by a fixed gain and remembers its settings.
    #[derive(Default)]
    struct GainModel {
        gain: f32,
        cutoff: f32,
        resonance: f32,
    }

    impl GainModel {
        fn new(gain: f32) -> Self {
            Self {
                gain,
                ..Self::default()
            }
        }
    }

    impl FilterModel for GainModel {
        fn prepare(&mut self, _sample_rate: f32) {}

        fn set_cutoff(&mut self, cutoff_hz: f32) {
            self.cutoff = cutoff_hz;
        }

        fn set_resonance(&mut self, resonance: f32) {
            self.resonance = resonance;
        }

        fn process(&mut self, buffer: &mut [f32]) {
            for sample in buffer.iter_mut() {
                *sample *= self.gain;
            }
        }

        fn reset(&mut self) {}
    }

    fn bindings() -> Bindings {
        let config = BrokerConfig::default();
        let params: ParameterMap = ParamId::ALL
            .into_iter()
            .map(|id| (id, config.build_parameter(id)))
            .collect();
        Bindings::new(params, Arc::new(SignalBus::new()))
    }

    fn stage(b: &Bindings, humanize: f32) -> FilterStage<GainModel, GainModel> {
        FilterStage::with_humanizer(
            GainModel::new(1.0),
            GainModel::new(2.0),
            b,
            Humanizer::new(humanize, 3),
        )
    }

    #[test]
    fn overshoot_exceeds_nominal_maximum() {
        let cutoff = BrokerConfig::default().build_parameter(ParamId::Cutoff);
        let top = cutoff.value_for_ratio(1.0);

        assert!(cutoff_for_ratio(&cutoff, 1.2) > top);
        assert!((cutoff_for_ratio(&cutoff, 1.2) - 1.44 * top).abs() < 1e-2);
        assert_eq!(cutoff_for_ratio(&cutoff, 1.0), top);
        assert_eq!(cutoff_for_ratio(&cutoff, -0.5), cutoff.value_for_ratio(0.0));
    }

    #[test]
    fn ratio_sums_knob_envelope_and_accent() {
        let b = bindings();
        let stage = stage(&b, 0.0);
        let base = b.param(ParamId::Cutoff).unscaled_ratio();
        let env_mod = b.param(ParamId::EnvMod).current_value();

        assert!((stage.cutoff_ratio() - base).abs() < 1e-6);

        b.bus.write(SignalId::AMP_ENV, 0.8);
        b.bus.write(SignalId::ACCENT_ENV, 0.4);
        let expected = base + 0.8 * env_mod * ENV_MOD_AMOUNT + 0.4 * ACCENT_AMOUNT;
        assert!((stage.cutoff_ratio() - expected).abs() < 1e-6);
    }

    #[test]
    fn models_receive_modulated_settings() {
        let b = bindings();
        let mut stage = stage(&b, 0.0);
        b.bus.write(SignalId::AMP_ENV, 1.0);

        let mut block = [0.5f32; 64];
        stage.process(&mut block);

        let expected = stage.modulated_cutoff();
        assert_eq!(stage.primary().cutoff, expected);
        assert_eq!(stage.secondary().cutoff, expected);
        assert_eq!(
            stage.primary().resonance,
            b.param(ParamId::Resonance).current_value()
        );
    }

    #[test]
    fn blend_applies_mix_and_resonance_compensation() {
        let b = bindings();
        let mut stage = stage(&b, 0.0);
        let mix = b.param(ParamId::FilterMix).current_value();
        let resonance = b.param(ParamId::Resonance).current_value();

        let mut block = [1.0f32; 32];
        stage.process(&mut block);

        let expected = (1.0 - mix) + mix * 2.0 * (1.0 + RESONANCE_COMPENSATION * resonance);
        assert!(block.iter().all(|&s| (s - expected).abs() < 1e-5));
    }

    #[test]
    fn humanization_stays_within_range() {
        let b = bindings();
        let mut stage = stage(&b, HUMANIZE_RANGE);
        let nominal = stage.modulated_cutoff();

        let mut block = [0.0f32; 16];
        for _ in 0..200 {
            stage.process(&mut block);
            let ratio = stage.last_cutoff() / nominal;
            let bound = HUMANIZE_RANGE + 1e-5;
            assert!((1.0 - bound..=1.0 + bound).contains(&ratio), "ratio {ratio}");
        }
    }
}
