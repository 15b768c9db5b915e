// Purpose - external interfaces, wire format conversions

pub mod midi;

pub use midi::{note_to_freq, ControlKind, MidiEvent, NoteEvent};
