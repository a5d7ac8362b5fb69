//! Mixer - sums lane outputs into the master bus
//!
//! Features:
//! - Per-lane gain (every lane starts at the same level)
//! - Master volume
//! - Hard clip at the output so overlapping lanes never exceed full scale

use serde::{Deserialize, Serialize};

use crate::types::{Sample, StereoSample};

/// Default per-lane gain; three lanes at this level leave headroom
pub const DEFAULT_LANE_GAIN: f32 = 0.35;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerConfig {
    pub lane_gain: f32,
    pub master_volume: f32,
}

impl Default for MixerConfig {
    fn default() -> Self {
        Self {
            lane_gain: DEFAULT_LANE_GAIN,
            master_volume: 1.0,
        }
    }
}

pub struct Mixer {
    lane_gains: Vec<f32>,
    master_volume: f32,
}

impl Mixer {
    pub fn new(lane_count: usize, config: MixerConfig) -> Self {
        Self {
            lane_gains: vec![config.lane_gain.max(0.0); lane_count],
            master_volume: config.master_volume.clamp(0.0, 1.0),
        }
    }

    pub fn lane_gain(&self, lane: usize) -> Option<f32> {
        self.lane_gains.get(lane).copied()
    }

    pub fn set_lane_gain(&mut self, lane: usize, gain: f32) {
        if let Some(g) = self.lane_gains.get_mut(lane) {
            *g = gain.max(0.0);
        }
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
    }

    /// Add one lane's stereo output into `master`
    #[inline]
    pub fn accumulate(&self, lane: usize, left: &[Sample], right: &[Sample], master: &mut [StereoSample]) {
        let gain = self.lane_gains.get(lane).copied().unwrap_or(0.0);
        if gain == 0.0 {
            return;
        }
        for ((out, &l), &r) in master.iter_mut().zip(left).zip(right) {
            *out += StereoSample::new(l, r) * gain;
        }
    }

    /// Apply master volume and clip to full scale
    #[inline]
    pub fn finish(&self, master: &mut [StereoSample]) {
        for out in master.iter_mut() {
            let scaled = *out * self.master_volume;
            *out = StereoSample::new(scaled.left.clamp(-1.0, 1.0), scaled.right.clamp(-1.0, 1.0));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lanes_sum_with_gain() {
        let mixer = Mixer::new(2, MixerConfig::default());
        let mut master = vec![StereoSample::silence(); 4];
        mixer.accumulate(0, &[1.0; 4], &[0.5; 4], &mut master);
        mixer.accumulate(1, &[1.0; 4], &[0.5; 4], &mut master);
        mixer.finish(&mut master);

        assert!((master[0].left - 0.7).abs() < 1e-6);
        assert!((master[0].right - 0.35).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_lane_is_ignored() {
        let mixer = Mixer::new(1, MixerConfig::default());
        let mut master = vec![StereoSample::silence(); 2];
        mixer.accumulate(5, &[1.0; 2], &[1.0; 2], &mut master);
        assert_eq!(master[0], StereoSample::silence());
    }

    #[test]
    fn test_output_is_clipped() {
        let mut mixer = Mixer::new(3, MixerConfig::default());
        for lane in 0..3 {
            mixer.set_lane_gain(lane, 1.0);
        }
        let mut master = vec![StereoSample::silence(); 1];
        for lane in 0..3 {
            mixer.accumulate(lane, &[1.0], &[-1.0], &mut master);
        }
        mixer.finish(&mut master);
        assert_eq!(master[0], StereoSample::new(1.0, -1.0));
    }

    #[test]
    fn test_master_volume_clamped() {
        let mut mixer = Mixer::new(1, MixerConfig::default());
        mixer.set_master_volume(4.0);
        assert_eq!(mixer.master_volume(), 1.0);
        mixer.set_master_volume(-1.0);
        assert_eq!(mixer.master_volume(), 0.0);
    }
}
