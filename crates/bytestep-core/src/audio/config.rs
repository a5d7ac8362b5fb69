//! Output stream configuration

use serde::{Deserialize, Serialize};

use crate::engine::MAX_BUFFER_SIZE;
use crate::types::SAMPLE_RATE;

/// Block size used when the config leaves it to us (frames)
pub const DEFAULT_BUFFER_SIZE: u32 = 512;

/// Block size for [`BufferSize::LowLatency`] (frames)
pub const LOW_LATENCY_BUFFER_SIZE: u32 = 256;

/// Smallest block size accepted for a fixed request (frames)
pub const MIN_BUFFER_SIZE: u32 = 64;

/// Preferred block size for the output stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BufferSize {
    #[default]
    Default,
    /// Specific size in frames, clamped to `MIN_BUFFER_SIZE..=MAX_BUFFER_SIZE`
    Fixed(u32),
    LowLatency,
}

impl BufferSize {
    /// Frames to request from the device
    pub fn frames(&self) -> u32 {
        match self {
            BufferSize::Default => DEFAULT_BUFFER_SIZE,
            BufferSize::Fixed(frames) => (*frames).clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE as u32),
            BufferSize::LowLatency => LOW_LATENCY_BUFFER_SIZE,
        }
    }

    pub fn latency_ms(&self, sample_rate: u32) -> f32 {
        self.frames() as f32 / sample_rate as f32 * 1000.0
    }
}

/// Output device identifier: device name plus optional host ("ALSA", "JACK", ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceId {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

impl DeviceId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            host: None,
        }
    }

    pub fn with_host(name: &str, host: &str) -> Self {
        Self {
            name: name.to_string(),
            host: Some(host.to_string()),
        }
    }

    pub fn display_label(&self) -> String {
        match &self.host {
            Some(host) => format!("[{}] {}", host, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Output device (None = system default)
    pub device: Option<DeviceId>,
    pub buffer_size: BufferSize,
    /// Preferred sample rate (None = the material's decode rate)
    pub sample_rate: Option<u32>,
}

impl AudioConfig {
    pub fn target_sample_rate(&self) -> u32 {
        self.sample_rate.unwrap_or(SAMPLE_RATE)
    }

    pub fn with_device(mut self, device: DeviceId) -> Self {
        self.device = Some(device);
        self
    }

    pub fn with_buffer_frames(mut self, frames: u32) -> Self {
        self.buffer_size = BufferSize::Fixed(frames);
        self
    }

    pub fn with_sample_rate(mut self, rate: u32) -> Self {
        self.sample_rate = Some(rate);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_size_frames() {
        assert_eq!(BufferSize::Default.frames(), DEFAULT_BUFFER_SIZE);
        assert_eq!(BufferSize::Fixed(16).frames(), MIN_BUFFER_SIZE);
        assert_eq!(BufferSize::Fixed(1 << 20).frames(), MAX_BUFFER_SIZE as u32);
        assert_eq!(BufferSize::Fixed(1024).frames(), 1024);
    }

    #[test]
    fn test_latency() {
        let latency = BufferSize::Fixed(441).latency_ms(44100);
        assert!((latency - 10.0).abs() < 1e-4);
    }

    #[test]
    fn test_device_label() {
        assert_eq!(DeviceId::new("hw:0").display_label(), "hw:0");
        assert_eq!(DeviceId::with_host("hw:0", "ALSA").display_label(), "[ALSA] hw:0");
    }

    #[test]
    fn test_config_yaml() {
        let config = AudioConfig::default().with_buffer_frames(256).with_sample_rate(48000);
        let yaml = serde_yaml::to_string(&config).unwrap();
        let back: AudioConfig = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, config);
        assert_eq!(back.target_sample_rate(), 48000);
        assert_eq!(AudioConfig::default().target_sample_rate(), SAMPLE_RATE);
    }
}
