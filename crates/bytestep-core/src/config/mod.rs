//! Configuration for bytestep sessions
//!
//! - Generic YAML config loading/saving (with first-run defaults)
//! - Standard config and sample paths
//! - The top-level [`ByteStepConfig`]
//!
//! # Usage
//!
//! ```ignore
//! use bytestep_core::config::{default_config_path, load_config, ByteStepConfig};
//!
//! let config: ByteStepConfig = load_config(&default_config_path("bytestep.yaml"));
//! let coordinator = config.coordinator_config();
//! ```

mod io;
mod paths;
mod settings;

pub use io::{load_config, load_or_init_config, save_config};
pub use paths::{default_config_dir, default_config_path, default_sample_dir};
pub use settings::{ByteStepConfig, DEFAULT_METER_INTERVAL_MS, MAX_LANES};
