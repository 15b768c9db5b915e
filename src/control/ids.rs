use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::parameter::{Scale, DEFAULT_STEPS};

/// Identifier of every user-controllable parameter of the instrument.
///
/// The string form (`"ATTACK"`, `"CUTOFF"`, ...) is what the controller
/// map and the preset files use as keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParamId {
    Attack,
    Decay,
    Sustain,
    Release,
    WaveformRatio,
    Glide,
    Cutoff,
    Resonance,
    EnvMod,
    FilterMix,
    Accent,
    AccentDecay,
}

impl ParamId {
    pub const ALL: [ParamId; 12] = [
        ParamId::Attack,
        ParamId::Decay,
        ParamId::Sustain,
        ParamId::Release,
        ParamId::WaveformRatio,
        ParamId::Glide,
        ParamId::Cutoff,
        ParamId::Resonance,
        ParamId::EnvMod,
        ParamId::FilterMix,
        ParamId::Accent,
        ParamId::AccentDecay,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ParamId::Attack => "ATTACK",
            ParamId::Decay => "DECAY",
            ParamId::Sustain => "SUSTAIN",
            ParamId::Release => "RELEASE",
            ParamId::WaveformRatio => "WAVEFORM_RATIO",
            ParamId::Glide => "GLIDE",
            ParamId::Cutoff => "CUTOFF",
            ParamId::Resonance => "RESONANCE",
            ParamId::EnvMod => "ENV_MOD",
            ParamId::FilterMix => "FILTER_MIX",
            ParamId::Accent => "ACCENT",
            ParamId::AccentDecay => "ACCENT_DECAY",
        }
    }

    /// Value distribution used when building this parameter.
    pub fn scale(self) -> Scale {
        match self {
            ParamId::Cutoff => Scale::Logarithmic,
            _ => Scale::Linear,
        }
    }

    /// Discretization count used when building this parameter.
    pub fn steps(self) -> usize {
        match self {
            // Finer grid so relative encoders sweep the filter smoothly
            ParamId::Cutoff => 430,
            _ => DEFAULT_STEPS,
        }
    }
}

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown parameter identifier: {0}")]
pub struct UnknownParamId(pub String);

impl FromStr for ParamId {
    type Err = UnknownParamId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ParamId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| UnknownParamId(s.to_owned()))
    }
}
