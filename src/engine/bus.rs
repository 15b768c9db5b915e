use crate::atomic::AtomicF32;

/*
Modulation Signal Bus
=====================

A fixed table of scalar signals shared between modules at audio rate.
Producers write once per block, consumers read whenever they like:

  AmpEnvelope ──write──► [ AMP_ENV    ] ──read──► FilterStage
  AccentEnv   ──write──► [ ACCENT_ENV ] ──read──► FilterStage

Each slot is its own atomic. There is no ordering between slots and no
queueing: a reader sees the latest value written, which is all a per-block
modulation signal needs.

Any `SignalId` is accepted. Reads outside the table answer 0.0, writes
outside it are dropped.
*/

/// Index of a bus slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalId(pub usize);

impl SignalId {
    /// Block mean of the amplitude envelope.
    pub const AMP_ENV: SignalId = SignalId(0);
    /// Block peak of the accent envelope, already scaled by ceiling and accent.
    pub const ACCENT_ENV: SignalId = SignalId(1);

    /// Number of slots on the bus.
    pub const COUNT: usize = 2;
}

#[derive(Debug)]
pub struct SignalBus {
    slots: [AtomicF32; SignalId::COUNT],
}

impl SignalBus {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| AtomicF32::new(0.0)),
        }
    }

    #[inline]
    pub fn read(&self, id: SignalId) -> f32 {
        self.slots.get(id.0).map_or(0.0, AtomicF32::load)
    }

    #[inline]
    pub fn write(&self, id: SignalId, value: f32) {
        if let Some(slot) = self.slots.get(id.0) {
            slot.store(value);
        }
    }

    /// Zero every slot.
    pub fn clear(&self) {
        for slot in &self.slots {
            slot.store(0.0);
        }
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}
