//! YAML configuration I/O
//!
//! Works with any serializable configuration type. Loading never fails: a
//! missing or broken file falls back to `T::default()` with a log line, so a
//! session always starts.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Load configuration from a YAML file, or defaults if it is missing or invalid
///
/// ```ignore
/// let config: ByteStepConfig = load_config(&default_config_path("bytestep.yaml"));
/// ```
pub fn load_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Default,
{
    match read_config(path) {
        Ok(Some(config)) => {
            log::info!("Loaded config from {:?}", path);
            config
        }
        Ok(None) => {
            log::info!("No config at {:?}, using defaults", path);
            T::default()
        }
        Err(e) => {
            log::warn!("{:#}, using defaults", e);
            T::default()
        }
    }
}

/// Like [`load_config`], but writes the defaults out when no file exists yet
///
/// A failed write is logged; the defaults are still returned.
pub fn load_or_init_config<T>(path: &Path) -> T
where
    T: DeserializeOwned + Serialize + Default,
{
    if path.exists() {
        return load_config(path);
    }
    let config = T::default();
    match save_config(&config, path) {
        Ok(()) => log::info!("Wrote default config to {:?}", path),
        Err(e) => log::warn!("Could not write default config: {:#}", e),
    }
    config
}

/// `Ok(None)` when there is no file at `path`
fn read_config<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read config file {:?}", path))?;
    let config =
        serde_yaml::from_str(&contents).with_context(|| format!("Failed to parse config file {:?}", path))?;
    Ok(Some(config))
}

/// Save configuration to a YAML file, creating parent directories
pub fn save_config<T>(config: &T, path: &Path) -> Result<()>
where
    T: Serialize,
{
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
    }

    let yaml = serde_yaml::to_string(config).context("Failed to serialize config to YAML")?;
    std::fs::write(path, yaml).with_context(|| format!("Failed to write config file: {:?}", path))?;

    log::debug!("Saved config to {:?}", path);
    Ok(())
}
