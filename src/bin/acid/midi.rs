//! MIDI input: every message from the first input port goes to the broker.

use std::sync::Arc;

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use midir::{MidiInput, MidiInputConnection};

use acid_dsp::control::ControlBroker;

/// Connect the first available input port. Without any port the synth
/// still runs (presets and defaults only), so that is not an error.
pub fn connect(broker: Arc<ControlBroker>) -> EyreResult<Option<MidiInputConnection<()>>> {
    let midi_in = MidiInput::new("acid input").wrap_err("failed to initialise MIDI input")?;

    let ports = midi_in.ports();
    let Some(port) = ports.first() else {
        log::warn!("No MIDI input ports found; running without a controller");
        return Ok(None);
    };
    let port_name = midi_in
        .port_name(port)
        .wrap_err("failed to read MIDI port name")?;

    let connection = midi_in
        .connect(
            port,
            "acid-read-input",
            move |_stamp, message, _| broker.submit_raw(message),
            (),
        )
        .map_err(|e| eyre!("failed to connect to MIDI port {}: {}", port_name, e))?;

    log::info!("Opened MIDI port: {}", port_name);
    Ok(Some(connection))
}
