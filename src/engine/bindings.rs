use std::sync::Arc;

use super::bus::SignalBus;
use crate::control::{ControlBroker, ParamId, Parameter, ParameterMap};

/// Everything an engine module is wired to at construction: the live
/// parameter set and the shared signal bus.
#[derive(Debug, Clone)]
pub struct Bindings {
    pub params: ParameterMap,
    pub bus: Arc<SignalBus>,
}

impl Bindings {
    pub fn new(params: ParameterMap, bus: Arc<SignalBus>) -> Self {
        Self { params, bus }
    }

    /// Bind to the broker's parameters and a fresh bus.
    pub fn from_broker(broker: &ControlBroker) -> Self {
        Self::new(broker.parameters(), Arc::new(SignalBus::new()))
    }

    #[inline]
    pub fn param(&self, id: ParamId) -> Parameter {
        self.params.get(id)
    }
}
