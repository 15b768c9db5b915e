use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam::queue::SegQueue;
use log::{debug, info, warn};
use parking_lot::Mutex;

use super::config::BrokerConfig;
use super::ids::ParamId;
use super::parameter::Parameter;
use super::preset::{MemoryPresetStore, Preset, PresetStore};
use super::ParameterMap;
use crate::io::midi::{ControlKind, MidiEvent, NoteEvent};

/*
Control Broker
==============

Every external control event enters here, from whatever thread the
transport delivers it on. The broker turns it into one of three things:

  note on/off      ──► note buffer ──► drained once per block by the audio thread
  control change   ──► Parameter::apply_delta (relative encoders)
  program change   ──► preset save (when armed) or preset restore


Note buffer
-----------

  ingestion thread                              audio thread
  ----------------                              ------------
  try_lock ─ ok ──► flush fallback, push ──┐
      │                                    ├── Vec<NoteEvent> ◄── try_lock ─ ok ──► swap
      └─ busy ──► SegQueue fallback ───────┘                         │
                                                                     └─ busy ──► no notes this block

Neither side ever waits on the other. A note that meets a busy lock is
parked in the fallback queue and moved into the buffer, ahead of the new
event, by the next ingestion call that gets the lock. Notes can be late,
never lost or reordered.

The audio thread drains by swapping its own (cleared) vector with the
internal one, so it never allocates either.


Relative controllers
--------------------

Encoders send 64 +/- n per detent. Values within 10 of center become a
delta; anything further out is treated as a transmission glitch and dropped.
*/

/// Center value of a relative (two's-offset) encoder.
pub const RELATIVE_CENTER: i32 = 64;

/// Largest accepted encoder step per message.
pub const MAX_RELATIVE_STEP: i32 = 10;

const NOTE_BUFFER_CAPACITY: usize = 256;

pub struct ControlBroker {
    global_channel: u8,
    save_patch_cc: u8,
    by_cc: HashMap<u8, Parameter>,
    params: ParameterMap,
    notes: Mutex<Vec<NoteEvent>>,
    fallback: SegQueue<NoteEvent>,
    armed: AtomicBool,
    presets: Mutex<Box<dyn PresetStore>>,
}

impl ControlBroker {
    /// Build every parameter from `config` and take ownership of the preset
    /// store.
    pub fn new(config: &BrokerConfig, presets: impl PresetStore + 'static) -> Self {
        let mut params = ParameterMap::new();
        let mut by_cc = HashMap::new();

        for id in ParamId::ALL {
            let param = config.build_parameter(id);
            let cc = config.spec(id).cc;
            if let Some(previous) = by_cc.insert(cc, param.clone()) {
                warn!("CC {} was bound twice, {} replaces {:?}", cc, id, previous);
            }
            params.insert(id, param);
        }

        info!(
            "Control broker listening on channel {}, save CC {}",
            config.global_channel, config.save_patch_cc
        );

        let presets: Box<dyn PresetStore> = Box::new(presets);

        Self {
            global_channel: config.global_channel,
            save_patch_cc: config.save_patch_cc,
            by_cc,
            params,
            notes: Mutex::new(Vec::with_capacity(NOTE_BUFFER_CAPACITY)),
            fallback: SegQueue::new(),
            armed: AtomicBool::new(false),
            presets: Mutex::new(presets),
        }
    }

    /// Compiled-in controller map and an in-memory preset store.
    pub fn with_defaults() -> Self {
        Self::new(&BrokerConfig::default(), MemoryPresetStore::new())
    }

    /// Raw ingestion form: `(channel, kind, number, value)`.
    pub fn submit_control_event(&self, channel: u8, kind: ControlKind, number: u8, value: u8) {
        self.submit(MidiEvent::from_parts(channel, kind, number, value));
    }

    /// Decode a MIDI message and submit it. Unhandled messages are ignored.
    pub fn submit_raw(&self, bytes: &[u8]) {
        match MidiEvent::from_bytes(bytes) {
            Some(event) => self.submit(event),
            None => debug!("Ignoring MIDI message {:02X?}", bytes),
        }
    }

    /// Typed ingestion point. Safe to call from any thread.
    pub fn submit(&self, event: MidiEvent) {
        if event.channel() != self.global_channel {
            debug!(
                "Discarding {:?}: channel {} is not {}",
                event,
                event.channel(),
                self.global_channel
            );
            return;
        }

        match event {
            MidiEvent::NoteOn { .. } | MidiEvent::NoteOff { .. } => {
                if let Some(note) = event.note_event() {
                    self.enqueue_note(note);
                }
            }
            MidiEvent::ControlChange {
                controller, value, ..
            } => self.control_change(controller, value),
            MidiEvent::ProgramChange { program, .. } => self.program_change(program),
            MidiEvent::PitchBend { .. } => {}
        }
    }

    /// Swap the pending notes into `out`. `out` is cleared first and comes
    /// back empty when the buffer is busy.
    ///
    /// Real-time safe: one `try_lock` and a pointer swap.
    pub fn drain_note_buffer(&self, out: &mut Vec<NoteEvent>) {
        out.clear();
        if let Some(mut notes) = self.notes.try_lock() {
            std::mem::swap(&mut *notes, out);
        }
    }

    /// Move parked notes into the buffer without submitting anything new.
    /// Hosts call this from an idle tick so a lone contended note does not
    /// wait for the next event.
    pub fn flush_pending_notes(&self) {
        if self.fallback.is_empty() {
            return;
        }
        if let Some(mut notes) = self.notes.try_lock() {
            Self::flush_fallback(&self.fallback, &mut notes);
        }
    }

    /// Handle for `id` (shares live state with the broker's copy).
    pub fn parameter(&self, id: ParamId) -> Parameter {
        self.params.get(id)
    }

    pub fn parameter_by_name(&self, name: &str) -> Option<Parameter> {
        name.parse::<ParamId>().ok().map(|id| self.params.get(id))
    }

    /// The canonical parameter set, for wiring engine modules.
    pub fn parameters(&self) -> ParameterMap {
        self.params.clone()
    }

    /// Whether the next program change saves instead of loads.
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub fn global_channel(&self) -> u8 {
        self.global_channel
    }

    fn enqueue_note(&self, note: NoteEvent) {
        match self.notes.try_lock() {
            Some(mut notes) => {
                Self::flush_fallback(&self.fallback, &mut notes);
                notes.push(note);
            }
            None => self.fallback.push(note),
        }
    }

    fn flush_fallback(fallback: &SegQueue<NoteEvent>, notes: &mut Vec<NoteEvent>) {
        while let Some(parked) = fallback.pop() {
            notes.push(parked);
        }
    }

    fn control_change(&self, controller: u8, value: u8) {
        if controller == self.save_patch_cc {
            let was_armed = self.armed.fetch_xor(true, Ordering::AcqRel);
            info!("Preset save {}", if was_armed { "disarmed" } else { "armed" });
            return;
        }

        let Some(param) = self.by_cc.get(&controller) else {
            return;
        };

        let delta = i32::from(value) - RELATIVE_CENTER;
        if delta.abs() > MAX_RELATIVE_STEP {
            debug!("Discarding CC {} value {}: outside relative band", controller, value);
            return;
        }
        param.apply_delta(delta);
    }

    fn program_change(&self, slot: u8) {
        if self.armed.swap(false, Ordering::AcqRel) {
            let preset: Preset = self
                .params
                .iter()
                .map(|(id, param)| (id.as_str().to_owned(), param.current_index()))
                .collect();
            self.presets.lock().save(slot, preset);
            info!("Saved preset slot {}", slot);
            return;
        }

        let Some(preset) = self.presets.lock().load(slot) else {
            debug!("Preset slot {} is empty", slot);
            return;
        };

        for (name, index) in preset.iter() {
            match name.parse::<ParamId>() {
                Ok(id) if self.params.contains(id) => self.params.get(id).set_index(index),
                _ => debug!("Preset slot {} names unknown parameter {}", slot, name),
            }
        }
        info!("Loaded preset slot {}", slot);
    }
}
