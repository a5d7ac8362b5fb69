//! Audio output via cpal
//!
//! The audio thread owns the [`ByteStepEngine`](crate::engine::ByteStepEngine)
//! exclusively:
//!
//! - **Coordinator**: sends commands via the lock-free command queue
//! - **Audio thread**: drains the queue, renders every lane, writes the device buffer
//! - **Atomics**: lane state is read through relaxed atomics (no locks)
//!
//! # Example Usage
//!
//! ```ignore
//! use bytestep_core::audio::{start_audio_system, AudioConfig};
//! use bytestep_core::engine::{command_channel, ByteStepEngine};
//!
//! let (engine, lane_events) = ByteStepEngine::new(3, params, mixer);
//! let (command_tx, command_rx) = command_channel();
//! let handle = start_audio_system(&AudioConfig::default(), engine, command_rx)?;
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, LOW_LATENCY_BUFFER_SIZE, MIN_BUFFER_SIZE};
pub use cpal_backend::{start_audio_system, AudioHandle};
pub use device::{default_device, find_device, list_output_devices, OutputDevice};
pub use error::{AudioError, AudioResult};
