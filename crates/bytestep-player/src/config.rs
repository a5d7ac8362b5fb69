//! Player configuration
//!
//! Stored as YAML in the user's config directory.
//! Default location: ~/.config/bytestep/player.yaml

use std::path::{Path, PathBuf};

use bytestep_core::config::{default_config_path, default_sample_dir, load_or_init_config, ByteStepConfig};
use serde::{Deserialize, Serialize};

/// Config file name inside the bytestep config directory
pub const CONFIG_FILE: &str = "player.yaml";

/// Root configuration structure
///
/// Engine settings sit at the top level next to the player's own keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Directory scanned for `.wav` source material
    pub sample_dir: PathBuf,
    /// Interval between status lines on stdout (0 disables them)
    pub status_interval_ms: u64,
    #[serde(flatten)]
    pub engine: ByteStepConfig,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            sample_dir: default_sample_dir(),
            status_interval_ms: 1000,
            engine: ByteStepConfig::default(),
        }
    }
}

pub fn default_config_file() -> PathBuf {
    default_config_path(CONFIG_FILE)
}

/// Load the player config, writing the defaults on first run
pub fn load(path: &Path) -> PlayerConfig {
    load_or_init_config(path)
}
