// Purpose - control-rate state: parameters, controller mapping, presets

pub mod broker;
pub mod config;
pub mod ids;
pub mod parameter;
pub mod preset;

pub use broker::ControlBroker;
pub use config::{BrokerConfig, ConfigError, ParamSpec};
pub use ids::{ParamId, UnknownParamId};
pub use parameter::{Parameter, Scale, Subscription, DEFAULT_STEPS};
pub use preset::{JsonPresetStore, MemoryPresetStore, Preset, PresetError, PresetStore};

use std::collections::HashMap;

/// The canonical parameter set, keyed by identifier.
///
/// Cloning the map clones the handles, so every clone views the same live
/// values. Missing entries read as the invalid handle.
#[derive(Debug, Clone, Default)]
pub struct ParameterMap {
    params: HashMap<ParamId, Parameter>,
}

impl ParameterMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ParamId, param: Parameter) {
        self.params.insert(id, param);
    }

    /// Handle for `id`, or an invalid handle when it was never registered.
    pub fn get(&self, id: ParamId) -> Parameter {
        self.params.get(&id).cloned().unwrap_or_default()
    }

    pub fn contains(&self, id: ParamId) -> bool {
        self.params.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ParamId, &Parameter)> {
        self.params.iter().map(|(id, param)| (*id, param))
    }
}

impl FromIterator<(ParamId, Parameter)> for ParameterMap {
    fn from_iter<I: IntoIterator<Item = (ParamId, Parameter)>>(iter: I) -> Self {
        Self {
            params: iter.into_iter().collect(),
        }
    }
}
