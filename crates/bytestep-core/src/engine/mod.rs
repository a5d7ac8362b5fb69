//! Convergence engine - lanes, envelope, mixer, real-time queues
//!
//! This module contains everything that runs on the audio thread:
//! - Lane: per-lane convergence state machine and echo overlay
//! - Mixer: sums lanes into the master bus
//! - ByteStepEngine: owns the lanes and drains the command queue
//! - Command/event queues and the deferred-drop collector

mod command;
mod engine;
mod envelope;
mod gc;
mod lane;
mod meter;
mod mixer;
mod params;
mod processor;
pub mod quantize;

pub use command::*;
pub use engine::*;
pub use envelope::*;
pub use gc::*;
pub use lane::*;
pub use meter::*;
pub use mixer::*;
pub use params::*;
pub use processor::*;
