//! Output stream: runs the engine inside the cpal callback.

use std::sync::Arc;

use color_eyre::eyre::{eyre, Result as EyreResult, WrapErr};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use acid_dsp::control::ControlBroker;
use acid_dsp::dsp::SawSquareOscillator;
use acid_dsp::engine::Engine;
use acid_dsp::MAX_BLOCK_SIZE;

/// Open the default output device and start rendering. The stream stops
/// when the returned handle is dropped.
pub fn start(broker: Arc<ControlBroker>) -> EyreResult<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| eyre!("no default output device available"))?;
    let config = device
        .default_output_config()
        .wrap_err("failed to fetch default output config")?;

    let sample_rate = config.sample_rate().0 as f32;
    let channels = config.channels() as usize;
    log::info!("Audio output: {} Hz, {} channels", sample_rate, channels);

    let mut engine = Engine::new(broker, SawSquareOscillator::new());
    engine.prepare(sample_rate);

    let mut render_buf = vec![0.0f32; MAX_BLOCK_SIZE];

    let stream = device
        .build_output_stream(
            &config.into(),
            move |data: &mut [f32], _| {
                let total_frames = data.len() / channels;
                let mut frames_written = 0;

                while frames_written < total_frames {
                    let frames_to_render = (total_frames - frames_written).min(MAX_BLOCK_SIZE);
                    let block = &mut render_buf[..frames_to_render];
                    engine.process_block(block);

                    // Mono to all channels
                    let out_off = frames_written * channels;
                    for (i, &s) in block.iter().enumerate() {
                        let frame = out_off + i * channels;
                        data[frame..frame + channels].fill(s);
                    }

                    frames_written += frames_to_render;
                }
            },
            |err| log::error!("Audio error: {}", err),
            None,
        )
        .wrap_err("failed to build output stream")?;

    stream.play().wrap_err("failed to start output stream")?;
    Ok(stream)
}
