//! Convergence parameters shared by every lane

use serde::{Deserialize, Serialize};

use super::envelope::{DEFAULT_FADE_RAMP, DEFAULT_FADE_WINDOW};
use super::quantize::DEFAULT_STEP;

/// Refill trigger, percent of a cycle's frames that finished converging
pub const DEFAULT_REFILL_THRESHOLD: f32 = 96.0;

/// Cross-lane trigger, percent of a cycle's frames that finished converging
pub const DEFAULT_CROSS_LANE_THRESHOLD: f32 = 50.0;

/// Echo stretch factor
pub const DEFAULT_PITCH: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvergenceParams {
    /// Byte-domain step applied per frame
    pub step: u8,
    pub refill_threshold: f32,
    pub cross_lane_threshold: f32,
    /// Echo playback runs this many times slower than the buffer
    pub pitch: usize,
    /// Fade window in buffer lengths
    pub fade_window: usize,
    /// Fraction of the fade window spent on each ramp
    pub fade_ramp: f32,
}

impl Default for ConvergenceParams {
    fn default() -> Self {
        Self {
            step: DEFAULT_STEP,
            refill_threshold: DEFAULT_REFILL_THRESHOLD,
            cross_lane_threshold: DEFAULT_CROSS_LANE_THRESHOLD,
            pitch: DEFAULT_PITCH,
            fade_window: DEFAULT_FADE_WINDOW,
            fade_ramp: DEFAULT_FADE_RAMP,
        }
    }
}

impl ConvergenceParams {
    /// Clamp values that would stall or break the per-frame loop
    pub fn sanitized(mut self) -> Self {
        self.step = self.step.max(1);
        self.pitch = self.pitch.max(1);
        self.fade_window = self.fade_window.max(1);
        self.fade_ramp = self.fade_ramp.clamp(0.0, 0.5);
        self
    }
}
