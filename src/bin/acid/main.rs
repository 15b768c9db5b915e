//! acid - monophonic bass synth driven by a MIDI controller
//!
//! Run with: cargo run --bin acid
//!
//! The controller map is read from `$ACID_CONFIG` (default
//! `parameters.json`), presets live in `presets.json`. Both fall back to
//! built-in defaults when missing.

mod audio;
mod midi;

use std::env;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use acid_dsp::control::{BrokerConfig, ControlBroker, JsonPresetStore};

const CONFIG_ENV: &str = "ACID_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "parameters.json";
const PRESET_PATH: &str = "presets.json";
const IDLE_TICK: Duration = Duration::from_millis(10);

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config_path = env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_owned());
    let config = BrokerConfig::load_or_default(&config_path);
    let presets = JsonPresetStore::open(PRESET_PATH);
    let broker = Arc::new(ControlBroker::new(&config, presets));

    let _stream = audio::start(Arc::clone(&broker))?;
    let _midi = midi::connect(Arc::clone(&broker))?;

    log::info!("Playing on MIDI channel {}. Press Ctrl+C to stop", broker.global_channel());

    loop {
        broker.flush_pending_notes();
        thread::sleep(IDLE_TICK);
    }
}
