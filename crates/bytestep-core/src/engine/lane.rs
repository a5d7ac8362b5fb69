//! Lane - one convergence engine instance
//!
//! A lane owns a [`WorkingPair`] and walks a playback position over it, one
//! frame at a time. At every frame it nudges buffer A toward buffer B in the
//! 8-bit byte domain and writes the result back into A, so the material slowly
//! turns from one sample into the other. Once the fade envelope is armed, a
//! stretched echo of A is crossfaded under the direct output.
//!
//! At each cycle boundary (`position % len == 0`) the lane:
//! 1. swaps in a pending pair if one was delivered, or
//! 2. measures how much of the last cycle had finished converging and fires
//!    the refill and cross-lane triggers, each at most once per pair.
//!
//! All state lives here and is touched only by the audio thread. The control
//! context reads a mirror of it through [`LaneAtomics`].

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use basedrop::Owned;

use super::command::LaneEvent;
use super::envelope::FadeEnvelope;
use super::meter::{Loudness, LoudnessAccumulator};
use super::params::ConvergenceParams;
use super::processor::FrameProcessor;
use super::quantize::{from_byte, step_toward, to_byte};
use crate::buffer::{SampleBuffer, WorkingPair};
use crate::types::{LaneId, Sample};

/// Lock-free lane state for the control context
///
/// Written by the audio thread at the end of every block, read anywhere.
/// Floats are stored as their bit patterns. All access is `Relaxed`: readers
/// only need visibility, not ordering against other memory.
pub struct LaneAtomics {
    pub position: AtomicU64,
    pub round: AtomicU64,
    /// Convergence percentage measured at the last cycle boundary
    progress: AtomicU32,
    pub playing: AtomicBool,
    pub loaded: AtomicBool,
    rms: AtomicU32,
    peak: AtomicU32,
    /// Channel reads that failed and were replaced by silence
    pub channel_errors: AtomicU64,
    /// Events dropped because the lane's event queue was full
    pub dropped_events: AtomicU64,
    pub swaps: AtomicU64,
}

impl LaneAtomics {
    pub fn new() -> Self {
        Self {
            position: AtomicU64::new(0),
            round: AtomicU64::new(0),
            progress: AtomicU32::new(0f32.to_bits()),
            playing: AtomicBool::new(false),
            loaded: AtomicBool::new(false),
            rms: AtomicU32::new(0f32.to_bits()),
            peak: AtomicU32::new(0f32.to_bits()),
            channel_errors: AtomicU64::new(0),
            dropped_events: AtomicU64::new(0),
            swaps: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn round(&self) -> u64 {
        self.round.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn progress(&self) -> f32 {
        f32::from_bits(self.progress.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn loudness(&self) -> Loudness {
        Loudness {
            rms: f32::from_bits(self.rms.load(Ordering::Relaxed)),
            peak: f32::from_bits(self.peak.load(Ordering::Relaxed)),
        }
    }

    #[inline]
    pub fn channel_errors(&self) -> u64 {
        self.channel_errors.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn swaps(&self) -> u64 {
        self.swaps.load(Ordering::Relaxed)
    }

    fn set_progress(&self, percent: f32) {
        self.progress.store(percent.to_bits(), Ordering::Relaxed);
    }

    fn set_loudness(&self, loudness: Loudness) {
        self.rms.store(loudness.rms.to_bits(), Ordering::Relaxed);
        self.peak.store(loudness.peak.to_bits(), Ordering::Relaxed);
    }
}

impl Default for LaneAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// One convergence engine instance
pub struct Lane {
    id: LaneId,
    params: ConvergenceParams,
    pair: Option<Owned<WorkingPair>>,
    /// Delivered pair waiting for the next cycle boundary
    pending: Option<Owned<WorkingPair>>,
    playback_position: u64,
    round_counter: u64,
    finished_samples: u64,
    playing: bool,
    has_requested_refill: bool,
    has_cross_lane_triggered: bool,
    fade: Option<FadeEnvelope>,
    atomics: Arc<LaneAtomics>,
    events: rtrb::Producer<LaneEvent>,
}

impl Lane {
    pub fn new(id: LaneId, params: ConvergenceParams, events: rtrb::Producer<LaneEvent>) -> Self {
        Self {
            id,
            params: params.sanitized(),
            pair: None,
            pending: None,
            playback_position: 0,
            round_counter: 0,
            finished_samples: 0,
            playing: false,
            has_requested_refill: false,
            has_cross_lane_triggered: false,
            fade: None,
            atomics: Arc::new(LaneAtomics::new()),
            events,
        }
    }

    pub fn id(&self) -> LaneId {
        self.id
    }

    pub fn atomics(&self) -> Arc<LaneAtomics> {
        Arc::clone(&self.atomics)
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn start(&mut self) {
        self.playing = true;
        self.atomics.playing.store(true, Ordering::Relaxed);
    }

    pub fn stop(&mut self) {
        self.playing = false;
        self.atomics.playing.store(false, Ordering::Relaxed);
    }

    pub fn playback_position(&self) -> u64 {
        self.playback_position
    }

    pub fn round_counter(&self) -> u64 {
        self.round_counter
    }

    pub fn finished_samples(&self) -> u64 {
        self.finished_samples
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    pub fn pair(&self) -> Option<&WorkingPair> {
        self.pair.as_deref()
    }

    /// Deliver a new pair
    ///
    /// With nothing loaded the pair is installed immediately. Otherwise it
    /// waits for the next cycle boundary; a second delivery before then
    /// replaces the first.
    pub fn load_pair(&mut self, pair: Owned<WorkingPair>) {
        if self.pair.is_none() {
            self.install(pair);
        } else {
            self.pending = Some(pair);
        }
    }

    fn install(&mut self, pair: Owned<WorkingPair>) {
        // The replaced pair is reclaimed by the GC thread
        self.pair = Some(pair);
        self.playback_position = 0;
        self.finished_samples = 0;
        self.has_requested_refill = false;
        self.has_cross_lane_triggered = false;
        self.atomics.loaded.store(true, Ordering::Relaxed);
        self.atomics.swaps.fetch_add(1, Ordering::Relaxed);
    }

    fn emit(&mut self, event: LaneEvent) {
        if self.events.push(event).is_err() {
            self.atomics.dropped_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Cycle boundary bookkeeping
    fn on_cycle_boundary(&mut self, output_channels: usize) {
        self.round_counter += 1;

        if let Some(next) = self.pending.take() {
            self.install(next);
            self.emit(LaneEvent::PairSwapped);
            return;
        }

        let len = self.pair.as_ref().map_or(0, |p| p.len());
        let total = (len * output_channels) as u64;
        let percent = if total == 0 {
            0.0
        } else {
            (self.finished_samples as f64 / total as f64 * 100.0) as f32
        };
        self.atomics.set_progress(percent);

        if percent >= self.params.refill_threshold && !self.has_requested_refill {
            self.has_requested_refill = true;
            self.emit(LaneEvent::RequestNewSample);
        }

        if percent >= self.params.cross_lane_threshold && !self.has_cross_lane_triggered {
            self.has_cross_lane_triggered = true;
            self.fade = Some(FadeEnvelope::for_window(
                len,
                self.params.fade_window,
                self.params.fade_ramp,
            ));
            self.emit(LaneEvent::NextTrigger);
        }

        self.finished_samples = 0;
    }

    fn publish(&self, outputs: &[&mut [Sample]]) {
        let mut acc = LoudnessAccumulator::default();
        for out in outputs.iter() {
            acc.add(out);
        }
        self.atomics.set_loudness(acc.finish());
        self.atomics
            .position
            .store(self.playback_position, Ordering::Relaxed);
        self.atomics.round.store(self.round_counter, Ordering::Relaxed);
    }
}

/// Converge one channel at `index`; returns the new A sample and whether it finished
#[inline]
fn converge_channel(
    a: &mut SampleBuffer,
    b: &SampleBuffer,
    channel: usize,
    index: usize,
    step: u8,
) -> Option<(Sample, bool)> {
    let target = to_byte(b.get(channel, index)?);
    let slot = a.channel_mut(channel)?.get_mut(index)?;
    let stepped = step_toward(to_byte(*slot), target, step);
    let value = from_byte(stepped.value);
    *slot = value;
    Some((value, stepped.finished))
}

/// Linearly interpolated read of A, `pitch` times slower than playback
#[inline]
fn echo_sample(a: &SampleBuffer, channel: usize, position: u64, pitch: usize) -> Option<Sample> {
    let data = a.channel(channel)?;
    let len = data.len();
    if len == 0 {
        return None;
    }
    let d = position % (len as u64 * pitch as u64);
    let index = d as f64 / pitch as f64;
    let i0 = index.floor() as usize % len;
    let i1 = (i0 + 1) % len;
    let frac = (index - index.floor()) as Sample;
    Some(data[i0] * (1.0 - frac) + data[i1] * frac)
}

impl FrameProcessor for Lane {
    fn produce_frame(&mut self, outputs: &mut [&mut [Sample]]) -> bool {
        for out in outputs.iter_mut() {
            out.fill(0.0);
        }
        if !self.playing || self.pair.is_none() {
            self.publish(outputs);
            return true;
        }

        let frames = outputs.iter().map(|o| o.len()).min().unwrap_or(0);
        let output_channels = outputs.len();
        let step = self.params.step;
        let pitch = self.params.pitch;

        for i in 0..frames {
            let len = match self.pair.as_ref() {
                Some(pair) => pair.len() as u64,
                None => break,
            };
            if self.playback_position % len == 0 {
                self.on_cycle_boundary(output_channels);
            }

            let Some(pair) = self.pair.as_mut() else {
                break;
            };
            let cnt = (self.playback_position % pair.len() as u64) as usize;
            let envelope = self.fade.as_mut().map(FadeEnvelope::advance);
            let (a, b) = pair.split_mut();

            for (ch, out) in outputs.iter_mut().enumerate() {
                match converge_channel(a, b, ch, cnt, step) {
                    Some((direct, finished)) => {
                        if finished {
                            self.finished_samples += 1;
                        }
                        out[i] = match envelope {
                            Some(env) => {
                                let echo = echo_sample(a, ch, self.playback_position, pitch)
                                    .unwrap_or(0.0);
                                direct * (1.0 - env) + echo * env
                            }
                            None => direct,
                        };
                    }
                    None => {
                        self.atomics.channel_errors.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }

            if self.fade.is_some_and(|f| f.is_finished()) {
                self.fade = None;
            }
            self.playback_position += 1;
        }

        self.publish(outputs);
        true
    }
}
