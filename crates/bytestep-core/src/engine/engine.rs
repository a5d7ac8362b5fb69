//! Main engine - owns the lanes and mixes them to the master output

use std::sync::Arc;

use crate::types::{LaneId, Sample, StereoBuffer};

use super::command::{event_channel, EngineCommand, LaneEvent};
use super::lane::{Lane, LaneAtomics};
use super::mixer::{Mixer, MixerConfig};
use super::params::ConvergenceParams;
use super::processor::FrameProcessor;

/// Maximum block size rendered in one pass
///
/// Per-lane scratch is pre-allocated at this size so the audio callback never
/// allocates. Larger host blocks are rendered in several passes.
pub const MAX_BUFFER_SIZE: usize = 8192;

/// The byte-step engine
///
/// Runs every lane once per block and sums them through the [`Mixer`]. Lives
/// on the audio thread; the control context talks to it only through the
/// command queue and reads lane state through [`LaneAtomics`].
pub struct ByteStepEngine {
    lanes: Vec<Lane>,
    mixer: Mixer,
    /// Pre-allocated per-lane render buffers (left, right)
    scratch: Vec<[Vec<Sample>; 2]>,
}

impl ByteStepEngine {
    /// Create an engine with `lane_count` lanes
    ///
    /// Returns the engine and one event consumer per lane, in lane order.
    pub fn new(
        lane_count: usize,
        params: ConvergenceParams,
        mixer: MixerConfig,
    ) -> (Self, Vec<rtrb::Consumer<LaneEvent>>) {
        let mut lanes = Vec::with_capacity(lane_count);
        let mut consumers = Vec::with_capacity(lane_count);
        for i in 0..lane_count {
            let (tx, rx) = event_channel();
            lanes.push(Lane::new(LaneId(i), params, tx));
            consumers.push(rx);
        }
        let engine = Self {
            lanes,
            mixer: Mixer::new(lane_count, mixer),
            scratch: (0..lane_count)
                .map(|_| [vec![0.0; MAX_BUFFER_SIZE], vec![0.0; MAX_BUFFER_SIZE]])
                .collect(),
        };
        (engine, consumers)
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.len()
    }

    pub fn lane(&self, id: usize) -> Option<&Lane> {
        self.lanes.get(id)
    }

    pub fn lane_mut(&mut self, id: usize) -> Option<&mut Lane> {
        self.lanes.get_mut(id)
    }

    /// Lock-free state handles for every lane, in lane order
    ///
    /// Call once during initialization, before the engine moves to the audio
    /// thread, and keep the Arcs.
    pub fn lane_atomics(&self) -> Vec<Arc<LaneAtomics>> {
        self.lanes.iter().map(Lane::atomics).collect()
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    /// Drain and apply every pending command (real-time safe)
    pub fn process_commands(&mut self, rx: &mut rtrb::Consumer<EngineCommand>) {
        while let Ok(cmd) = rx.pop() {
            self.apply(cmd);
        }
    }

    pub fn apply(&mut self, cmd: EngineCommand) {
        match cmd {
            EngineCommand::Start { lane } => {
                if let Some(l) = self.lanes.get_mut(lane) {
                    l.start();
                }
            }
            EngineCommand::Stop { lane } => {
                if let Some(l) = self.lanes.get_mut(lane) {
                    l.stop();
                }
            }
            EngineCommand::StartAll => self.lanes.iter_mut().for_each(Lane::start),
            EngineCommand::StopAll => self.lanes.iter_mut().for_each(Lane::stop),
            EngineCommand::LoadPair { lane, pair } => {
                // An unknown lane drops the pair, which the GC thread reclaims
                if let Some(l) = self.lanes.get_mut(lane) {
                    l.load_pair(pair);
                }
            }
            EngineCommand::SetLaneGain { lane, gain } => self.mixer.set_lane_gain(lane, gain),
            EngineCommand::SetMasterVolume(volume) => self.mixer.set_master_volume(volume),
        }
    }

    /// Render one block into `master`
    pub fn process(&mut self, master: &mut StereoBuffer) {
        master.fill_silence();
        let total = master.len();
        let mut offset = 0;

        while offset < total {
            let frames = (total - offset).min(MAX_BUFFER_SIZE);
            let out = &mut master.as_mut_slice()[offset..offset + frames];

            for (idx, (lane, [left, right])) in
                self.lanes.iter_mut().zip(self.scratch.iter_mut()).enumerate()
            {
                let left = &mut left[..frames];
                let right = &mut right[..frames];
                {
                    let mut outputs: [&mut [Sample]; 2] = [&mut *left, &mut *right];
                    lane.produce_frame(&mut outputs);
                }
                self.mixer.accumulate(idx, left, right, out);
            }
            self.mixer.finish(out);

            offset += frames;
        }
    }
}
