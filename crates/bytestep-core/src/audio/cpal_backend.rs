//! cpal output stream
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │   Coordinator    │───push()───────────►│   Command Queue     │
//! │    service       │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         ▲                                           │ pop()
//!         │ LaneEvent rings / LaneAtomics             ▼
//!         │                                ┌─────────────────────┐
//!         └────────────────────────────────│  cpal audio thread  │
//!                                          │ (owns ByteStepEngine)│
//!                                          └─────────────────────┘
//! ```
//!
//! The callback owns the engine outright: no lock is ever taken on the audio
//! thread.

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{BufferSize as CpalBufferSize, SampleFormat, Stream, StreamConfig};

use super::config::AudioConfig;
use super::device::{default_device, find_device};
use super::error::{AudioError, AudioResult};
use crate::engine::{ByteStepEngine, EngineCommand, MAX_BUFFER_SIZE};
use crate::types::StereoBuffer;

/// Keeps the output stream alive. Drop it to stop audio.
pub struct AudioHandle {
    _stream: Stream,
    sample_rate: u32,
    buffer_size: u32,
}

impl AudioHandle {
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// One-way output latency
    pub fn latency_ms(&self) -> f32 {
        self.buffer_size as f32 / self.sample_rate as f32 * 1000.0
    }
}

/// State moved into the audio callback
struct AudioCallbackState {
    engine: ByteStepEngine,
    command_rx: rtrb::Consumer<EngineCommand>,
    master_buffer: StereoBuffer,
}

impl AudioCallbackState {
    fn new(engine: ByteStepEngine, command_rx: rtrb::Consumer<EngineCommand>) -> Self {
        Self {
            engine,
            command_rx,
            master_buffer: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    /// Apply pending commands, then render `n_frames` into the master buffer
    fn process(&mut self, n_frames: usize) {
        self.master_buffer.set_len_from_capacity(n_frames.min(MAX_BUFFER_SIZE));
        self.engine.process_commands(&mut self.command_rx);
        self.engine.process(&mut self.master_buffer);
    }

    /// Fill an interleaved device buffer, rendering at most `MAX_BUFFER_SIZE`
    /// frames at a time
    fn render(&mut self, data: &mut [f32], channels: usize) {
        if channels == 0 {
            return;
        }
        for block in data.chunks_mut(MAX_BUFFER_SIZE * channels) {
            self.process(block.len() / channels);
            self.write_interleaved(block, channels);
        }
    }

    /// Write the master buffer into an interleaved device buffer
    fn write_interleaved(&self, data: &mut [f32], channels: usize) {
        let samples = self.master_buffer.as_slice();
        for (i, frame) in data.chunks_mut(channels).enumerate() {
            match samples.get(i) {
                Some(sample) => {
                    frame[0] = sample.left;
                    if channels > 1 {
                        frame[1] = sample.right;
                    }
                    for ch in frame.iter_mut().skip(2) {
                        *ch = 0.0;
                    }
                }
                None => frame.fill(0.0),
            }
        }
    }
}

/// Open the configured device and start rendering `engine` into it
///
/// `command_rx` is the consumer half of the engine's command queue; the
/// producer half belongs to the coordinator service.
pub fn start_audio_system(
    config: &AudioConfig,
    engine: ByteStepEngine,
    command_rx: rtrb::Consumer<EngineCommand>,
) -> AudioResult<AudioHandle> {
    let device = match &config.device {
        Some(id) => find_device(id)?,
        None => default_device()?,
    };
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let supported = select_output_config(&device, config)?;
    let sample_rate = supported.sample_rate().0;
    let buffer_size = config.buffer_size.frames();

    let stream_config = StreamConfig {
        channels: supported.channels(),
        sample_rate: supported.sample_rate(),
        buffer_size: CpalBufferSize::Fixed(buffer_size),
    };

    log::info!(
        "Audio config: {} channels, {}Hz, {} frames (~{:.1}ms latency)",
        stream_config.channels,
        sample_rate,
        buffer_size,
        config.buffer_size.latency_ms(sample_rate)
    );

    let stream = build_output_stream(&device, &stream_config, AudioCallbackState::new(engine, command_rx))?;
    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;

    log::info!("Audio stream started");

    Ok(AudioHandle {
        _stream: stream,
        sample_rate,
        buffer_size,
    })
}

/// Pick an f32 stereo config at the target rate, falling back step by step
fn select_output_config(
    device: &cpal::Device,
    config: &AudioConfig,
) -> AudioResult<cpal::SupportedStreamConfig> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    let target = config.target_sample_rate();
    let in_range = |c: &cpal::SupportedStreamConfigRange| {
        target >= c.min_sample_rate().0 && target <= c.max_sample_rate().0
    };

    let best = supported
        .iter()
        .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2 && in_range(c))
        .or_else(|| {
            supported
                .iter()
                .find(|c| c.sample_format() == SampleFormat::F32 && c.channels() >= 2)
        })
        .ok_or_else(|| AudioError::ConfigError("No f32 stereo output configuration".to_string()))?;

    let rate = if in_range(best) {
        cpal::SampleRate(target)
    } else {
        let fallback = best.max_sample_rate();
        log::warn!(
            "Audio device doesn't support {}Hz, falling back to {}Hz (material plays at the wrong speed)",
            target,
            fallback.0
        );
        fallback
    };

    Ok(best.clone().with_sample_rate(rate))
}

fn build_output_stream(
    device: &cpal::Device,
    config: &StreamConfig,
    mut state: AudioCallbackState,
) -> AudioResult<Stream> {
    let channels = config.channels as usize;

    device
        .build_output_stream(
            config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                state.render(data, channels);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))
}
