/// A decoded channel message. Channels are 1-based (1-16).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    PitchBend { channel: u8, value: i16 },
    ProgramChange { channel: u8, program: u8 },
}

/// Kind tag for the raw `(channel, kind, number, value)` ingestion form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    NoteOn,
    NoteOff,
    ControlChange,
    ProgramChange,
}

/// What the audio thread receives from the note queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteEvent {
    On { key: u8, velocity: u8 },
    Off { key: u8 },
}

impl MidiEvent {
    /// Assemble an event from the raw ingestion form.
    ///
    /// A note-on with velocity 0 is a note-off, as on the wire.
    pub fn from_parts(channel: u8, kind: ControlKind, number: u8, value: u8) -> Self {
        match kind {
            ControlKind::NoteOn if value == 0 => MidiEvent::NoteOff {
                channel,
                key: number,
                velocity: 0,
            },
            ControlKind::NoteOn => MidiEvent::NoteOn {
                channel,
                key: number,
                velocity: value,
            },
            ControlKind::NoteOff => MidiEvent::NoteOff {
                channel,
                key: number,
                velocity: value,
            },
            ControlKind::ControlChange => MidiEvent::ControlChange {
                channel,
                controller: number,
                value,
            },
            ControlKind::ProgramChange => MidiEvent::ProgramChange {
                channel,
                program: number,
            },
        }
    }

    /// Decode a channel voice message. Anything else (system messages,
    /// truncated packets, messages we do not handle) yields `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        let channel = (status & 0x0F) + 1;
        let data_byte = |i: usize| data.get(i).map(|b| b & 0x7F);

        match status & 0xF0 {
            0x80 => Some(MidiEvent::NoteOff {
                channel,
                key: data_byte(0)?,
                velocity: data_byte(1)?,
            }),
            0x90 => Some(Self::from_parts(
                channel,
                ControlKind::NoteOn,
                data_byte(0)?,
                data_byte(1)?,
            )),
            0xB0 => Some(MidiEvent::ControlChange {
                channel,
                controller: data_byte(0)?,
                value: data_byte(1)?,
            }),
            0xC0 => Some(MidiEvent::ProgramChange {
                channel,
                program: data_byte(0)?,
            }),
            0xE0 => {
                let lsb = i16::from(data_byte(0)?);
                let msb = i16::from(data_byte(1)?);
                Some(MidiEvent::PitchBend {
                    channel,
                    value: ((msb << 7) | lsb) - 8192,
                })
            }
            _ => None,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::ControlChange { channel, .. }
            | MidiEvent::PitchBend { channel, .. }
            | MidiEvent::ProgramChange { channel, .. } => channel,
        }
    }

    /// The note-queue form of this event, if it is a note message.
    pub fn note_event(&self) -> Option<NoteEvent> {
        match *self {
            MidiEvent::NoteOn { key, velocity, .. } => Some(NoteEvent::On { key, velocity }),
            MidiEvent::NoteOff { key, .. } => Some(NoteEvent::Off { key }),
            _ => None,
        }
    }
}

/// Convert MIDI note number to frequency in Hz.
/// A4 = 440 Hz = MIDI note 69
#[inline]
pub fn note_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}
