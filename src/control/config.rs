//! Controller map: which CC drives which parameter, and each parameter's
//! range.
//!
//! The file format is a flat JSON object:
//!
//! ```json
//! {
//!     "GLOBAL_CHANNEL": 1,
//!     "SAVE_PATCH_CC": 102,
//!     "CUTOFF": { "CC": 26, "DEFAULT": 800.0, "MIN": 30.0, "MAX": 8000.0 }
//! }
//! ```
//!
//! A user file only needs the entries it overrides; everything else keeps
//! the compiled-in defaults.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ids::ParamId;
use super::parameter::Parameter;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read controller map: {0}")]
    Io(#[from] io::Error),

    #[error("failed to parse controller map: {0}")]
    Parse(#[from] serde_json::Error),
}

/// MIDI binding and range of a single parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "CC")]
    pub cc: u8,
    #[serde(rename = "DEFAULT")]
    pub default: f32,
    #[serde(rename = "MIN")]
    pub min: f32,
    #[serde(rename = "MAX")]
    pub max: f32,
}

impl ParamSpec {
    pub const fn new(cc: u8, default: f32, min: f32, max: f32) -> Self {
        Self {
            cc,
            default,
            min,
            max,
        }
    }
}

impl ParamId {
    /// Built-in binding used when no controller map overrides it.
    pub fn default_spec(self) -> ParamSpec {
        match self {
            ParamId::Attack => ParamSpec::new(20, 0.005, 0.001, 2.0),
            ParamId::Decay => ParamSpec::new(21, 0.3, 0.01, 5.0),
            ParamId::Sustain => ParamSpec::new(22, 0.6, 0.0, 1.0),
            ParamId::Release => ParamSpec::new(23, 0.1, 0.005, 5.0),
            ParamId::WaveformRatio => ParamSpec::new(24, 0.0, 0.0, 1.0),
            ParamId::Glide => ParamSpec::new(25, 0.0, 0.0, 1.0),
            ParamId::Cutoff => ParamSpec::new(26, 800.0, 30.0, 8000.0),
            ParamId::Resonance => ParamSpec::new(27, 0.3, 0.0, 0.95),
            ParamId::EnvMod => ParamSpec::new(28, 0.5, 0.0, 1.0),
            ParamId::FilterMix => ParamSpec::new(29, 0.5, 0.0, 1.0),
            ParamId::Accent => ParamSpec::new(30, 0.5, 0.0, 1.0),
            ParamId::AccentDecay => ParamSpec::new(31, 0.2, 0.01, 2.0),
        }
    }
}

pub const DEFAULT_GLOBAL_CHANNEL: u8 = 1;
pub const DEFAULT_SAVE_PATCH_CC: u8 = 102;

/// Everything the broker needs to wire controllers to parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    /// MIDI channel (1-16) the instrument listens on.
    #[serde(rename = "GLOBAL_CHANNEL")]
    pub global_channel: u8,
    /// Controller number that arms the next program change as a save.
    #[serde(rename = "SAVE_PATCH_CC")]
    pub save_patch_cc: u8,
    #[serde(flatten)]
    pub parameters: BTreeMap<ParamId, ParamSpec>,
}

/// User overlay, every entry optional.
#[derive(Debug, Default, Deserialize)]
struct ConfigOverlay {
    #[serde(rename = "GLOBAL_CHANNEL", default)]
    global_channel: Option<u8>,
    #[serde(rename = "SAVE_PATCH_CC", default)]
    save_patch_cc: Option<u8>,
    /// Every other key. Only known identifiers with a well-formed entry
    /// are kept; the rest is skipped with a warning.
    #[serde(flatten)]
    entries: BTreeMap<String, serde_json::Value>,
}

impl ConfigOverlay {
    fn parameters(self) -> impl Iterator<Item = (ParamId, ParamSpec)> {
        self.entries.into_iter().filter_map(|(key, value)| {
            let id = match key.parse::<ParamId>() {
                Ok(id) => id,
                Err(e) => {
                    log::warn!("Ignoring controller map entry: {}", e);
                    return None;
                }
            };
            match serde_json::from_value::<ParamSpec>(value) {
                Ok(spec) => Some((id, spec)),
                Err(e) => {
                    log::warn!("Ignoring malformed entry for {}: {}", id, e);
                    None
                }
            }
        })
    }
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            global_channel: DEFAULT_GLOBAL_CHANNEL,
            save_patch_cc: DEFAULT_SAVE_PATCH_CC,
            parameters: ParamId::ALL
                .into_iter()
                .map(|id| (id, id.default_spec()))
                .collect(),
        }
    }
}

impl BrokerConfig {
    /// Parse a controller map and lay it over the defaults.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let overlay: ConfigOverlay = serde_json::from_str(json)?;
        let mut config = Self::default();

        if let Some(channel) = overlay.global_channel {
            config.global_channel = channel;
        }
        if let Some(cc) = overlay.save_patch_cc {
            config.save_patch_cc = cc;
        }
        config.parameters.extend(overlay.parameters());

        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        log::info!("Loading controller map from {:?}", path);
        let json = fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Like [`BrokerConfig::load`], but never fails: any problem falls back
    /// to the defaults so the instrument still boots.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(ConfigError::Io(e)) if e.kind() == io::ErrorKind::NotFound => {
                log::info!("No controller map at {:?}, using defaults", path);
                Self::default()
            }
            Err(e) => {
                log::warn!("{}; using defaults", e);
                Self::default()
            }
        }
    }

    pub fn spec(&self, id: ParamId) -> ParamSpec {
        self.parameters
            .get(&id)
            .copied()
            .unwrap_or_else(|| id.default_spec())
    }

    /// Build the live parameter for `id` from its spec.
    pub fn build_parameter(&self, id: ParamId) -> Parameter {
        let spec = self.spec(id);
        Parameter::new(spec.default, spec.min, spec.max, id.scale(), id.steps())
    }
}
