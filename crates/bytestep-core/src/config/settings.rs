//! Top-level engine configuration

use serde::{Deserialize, Serialize};

use crate::arrangement::ArrangementPolicy;
use crate::audio::AudioConfig;
use crate::coordinator::{CoordinatorConfig, PrefetchConfig};
use crate::engine::{ConvergenceParams, MixerConfig};
use crate::types::DEFAULT_LANE_COUNT;

/// Default interval between level reports
pub const DEFAULT_METER_INTERVAL_MS: u64 = 40;

/// Most lanes a config may ask for
pub const MAX_LANES: usize = 16;

/// Everything that shapes a bytestep session
///
/// Every field has a default, so a partial YAML file is fine:
///
/// ```yaml
/// lanes: 4
/// arrangement:
///   type: repeat
///   justify: center
/// convergence:
///   step: 1
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ByteStepConfig {
    pub lanes: usize,
    pub convergence: ConvergenceParams,
    pub arrangement: ArrangementPolicy,
    pub prefetch: PrefetchConfig,
    pub mixer: MixerConfig,
    pub meter_interval_ms: u64,
    /// Seed for arrangement and lane routing (None = entropy)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub audio: AudioConfig,
}

impl Default for ByteStepConfig {
    fn default() -> Self {
        Self {
            lanes: DEFAULT_LANE_COUNT,
            convergence: ConvergenceParams::default(),
            arrangement: ArrangementPolicy::default(),
            prefetch: PrefetchConfig::default(),
            mixer: MixerConfig::default(),
            meter_interval_ms: DEFAULT_METER_INTERVAL_MS,
            seed: None,
            audio: AudioConfig::default(),
        }
    }
}

impl ByteStepConfig {
    /// Lane count clamped to `1..=MAX_LANES`
    pub fn lane_count(&self) -> usize {
        if self.lanes == 0 || self.lanes > MAX_LANES {
            log::warn!(
                "Lane count {} out of range, clamping to 1..={}",
                self.lanes,
                MAX_LANES
            );
        }
        self.lanes.clamp(1, MAX_LANES)
    }

    /// Convergence parameters with out-of-range values replaced
    pub fn convergence_params(&self) -> ConvergenceParams {
        self.convergence.sanitized()
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            lanes: self.lane_count(),
            prefetch: self.prefetch,
            arrangement: self.arrangement,
            seed: self.seed,
            meter_interval_ms: self.meter_interval_ms,
        }
    }
}
