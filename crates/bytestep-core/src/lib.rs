//! ByteStep Core - byte-step convergence synthesis engine

pub mod arrangement;
pub mod audio;
pub mod buffer;
pub mod config;
pub mod coordinator;
pub mod engine;
pub mod message;
pub mod source;
pub mod types;

pub use types::*;
