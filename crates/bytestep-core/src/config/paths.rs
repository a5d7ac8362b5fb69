//! Standard locations for bytestep files

use std::path::PathBuf;

/// `~/.config/bytestep` (or the platform equivalent)
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bytestep")
}

/// `~/.config/bytestep/{filename}`
pub fn default_config_path(filename: &str) -> PathBuf {
    default_config_dir().join(filename)
}

/// Default directory scanned for source material: `~/Music/bytestep-samples`
pub fn default_sample_dir() -> PathBuf {
    dirs::audio_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Music")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("bytestep-samples")
}
