//! Coordinator service - the control-side thread driving all lanes
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐  CoordinatorCommand   ┌──────────────────────┐   EngineCommand   ┌─────────────┐
//! │ Host / main │ ────────────────────► │  CoordinatorService  │ ────────────────► │ Audio thread│
//! │             │ ◄──────────────────── │     (background)     │ ◄──────────────── │  (engine)   │
//! └─────────────┘   CoordinatorEvent    └──────────────────────┘     LaneEvent     └─────────────┘
//!                                         │  FetchRequest  ▲
//!                                         ▼                │ FetchResult
//!                                       ┌──────────────────────┐
//!                                       │    Fetch worker      │
//!                                       │   (SampleSource)     │
//!                                       └──────────────────────┘
//! ```
//!
//! The service loop wakes on a command, a fetch result, or the poll timeout.
//! On every wake it drains the lanes' event rings and runs whichever periodic
//! tasks are due: prefetch top-up, pending refill retry, level report.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use basedrop::Owned;
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};

use super::coordinator::{Delivery, LaneCoordinator};
use super::pool::DEFAULT_TARGET_DEPTH;
use crate::arrangement::ArrangementPolicy;
use crate::buffer::SampleBuffer;
use crate::engine::{gc_handle, EngineCommand, LaneAtomics, LaneEvent, Loudness};
use crate::message::{validate_send_sample, LaneMessage, LaneNotification};
use crate::source::{FetchError, SampleSource};
use crate::types::LaneId;

/// Interval between health checks of the lane error counters
const HEALTH_INTERVAL: Duration = Duration::from_secs(1);

// ============================================================================
// Configuration
// ============================================================================

/// Prefetch and polling cadence
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrefetchConfig {
    /// Buffers each lane's pool tries to hold
    pub target_depth: usize,
    /// Background top-up interval
    pub interval_ms: u64,
    /// Upper bound between retries of a starved refill
    pub refill_retry_ms: u64,
    /// Longest the service sleeps before draining lane events
    pub event_poll_ms: u64,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            target_depth: DEFAULT_TARGET_DEPTH,
            interval_ms: 5000,
            refill_retry_ms: 400,
            event_poll_ms: 10,
        }
    }
}

/// Everything the service needs besides its channels
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub lanes: usize,
    pub prefetch: PrefetchConfig,
    pub arrangement: ArrangementPolicy,
    pub seed: Option<u64>,
    pub meter_interval_ms: u64,
}

// ============================================================================
// Commands and events
// ============================================================================

/// Commands for the CoordinatorService
pub enum CoordinatorCommand {
    /// A message addressed to one lane's port
    Message { lane: LaneId, message: LaneMessage },
    /// Give every lane the same buffer in both slots, then start them all
    Bootstrap(SampleBuffer),
    /// Ask for a refill of one lane as if it had requested it
    RequestRefill(LaneId),
    SetLaneGain { lane: LaneId, gain: f32 },
    SetMasterVolume(f32),
    Shutdown,
}

/// Per-lane level snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LaneLevel {
    pub lane: usize,
    pub rms: f32,
    pub peak: f32,
    /// Convergence percentage at the last cycle boundary
    pub progress: f32,
    pub round: u64,
    pub playing: bool,
}

/// Level snapshot of all lanes, published on the meter cadence
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelReport {
    pub lanes: Vec<LaneLevel>,
}

impl LevelReport {
    pub fn from_atomics(atomics: &[Arc<LaneAtomics>]) -> Self {
        Self {
            lanes: atomics
                .iter()
                .enumerate()
                .map(|(i, a)| {
                    let Loudness { rms, peak } = a.loudness();
                    LaneLevel {
                        lane: i,
                        rms,
                        peak,
                        progress: a.progress(),
                        round: a.round(),
                        playing: a.is_playing(),
                    }
                })
                .collect(),
        }
    }
}

/// Events published by the service
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    ServiceStarted,
    /// A lane notification in its wire form
    Notification(LaneNotification),
    PairDelivered { lane: LaneId, frames: usize },
    Levels(LevelReport),
    ServiceStopped,
}

/// Handle to a running service thread
pub struct ServiceHandle<Cmd> {
    pub command_tx: Sender<Cmd>,
    pub thread_handle: Option<thread::JoinHandle<()>>,
}

impl<Cmd> ServiceHandle<Cmd> {
    pub fn send(&self, cmd: Cmd) -> Result<(), channel::SendError<Cmd>> {
        self.command_tx.send(cmd)
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }
}

impl ServiceHandle<CoordinatorCommand> {
    /// Stop the service and wait for its thread
    pub fn shutdown(&mut self) {
        let _ = self.command_tx.send(CoordinatorCommand::Shutdown);
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                log::error!("CoordinatorService thread panicked");
            }
        }
    }
}

// ============================================================================
// Fetch worker
// ============================================================================

struct FetchRequest {
    lane: LaneId,
}

struct FetchResult {
    lane: LaneId,
    result: Result<SampleBuffer, FetchError>,
}

/// Runs the sample source until the request channel closes
fn spawn_fetch_worker(
    mut source: Box<dyn SampleSource>,
    request_rx: Receiver<FetchRequest>,
    result_tx: Sender<FetchResult>,
) -> thread::JoinHandle<()> {
    thread::Builder::new()
        .name("bytestep-fetch".to_string())
        .spawn(move || {
            log::info!("Fetch worker started ({})", source.name());
            while let Ok(FetchRequest { lane }) = request_rx.recv() {
                let result = source.fetch_sample();
                if result_tx.send(FetchResult { lane, result }).is_err() {
                    break;
                }
            }
            log::info!("Fetch worker stopped");
        })
        .expect("Failed to spawn fetch worker")
}

// ============================================================================
// Service
// ============================================================================

/// Background service coordinating refills across lanes
pub struct CoordinatorService {
    config: CoordinatorConfig,
    coordinator: LaneCoordinator,
    engine_tx: rtrb::Producer<EngineCommand>,
    lane_events: Vec<rtrb::Consumer<LaneEvent>>,
    atomics: Vec<Arc<LaneAtomics>>,
    event_tx: Option<Sender<CoordinatorEvent>>,
    fetch_tx: Option<Sender<FetchRequest>>,
    in_flight: Vec<usize>,
    /// Last seen error counters per lane: (channel errors, dropped events)
    seen_errors: Vec<(u64, u64)>,
    last_prefetch: Option<Instant>,
    last_retry: Instant,
    last_meter: Instant,
    last_health: Instant,
}

impl CoordinatorService {
    /// Spawn the service and its fetch worker
    ///
    /// `lane_events` and `atomics` come from [`ByteStepEngine::new`] and
    /// [`ByteStepEngine::lane_atomics`], in lane order.
    ///
    /// [`ByteStepEngine::new`]: crate::engine::ByteStepEngine::new
    /// [`ByteStepEngine::lane_atomics`]: crate::engine::ByteStepEngine::lane_atomics
    pub fn spawn(
        config: CoordinatorConfig,
        engine_tx: rtrb::Producer<EngineCommand>,
        lane_events: Vec<rtrb::Consumer<LaneEvent>>,
        atomics: Vec<Arc<LaneAtomics>>,
        source: Box<dyn SampleSource>,
        event_tx: Option<Sender<CoordinatorEvent>>,
    ) -> ServiceHandle<CoordinatorCommand> {
        let (command_tx, command_rx) = channel::unbounded();
        let (fetch_tx, fetch_rx) = channel::unbounded();
        let (result_tx, result_rx) = channel::unbounded();

        let thread_handle = thread::Builder::new()
            .name("bytestep-coordinator".to_string())
            .spawn(move || {
                let worker = spawn_fetch_worker(source, fetch_rx, result_tx);
                let mut service = Self::new(config, engine_tx, lane_events, atomics, event_tx, fetch_tx);

                service.publish(CoordinatorEvent::ServiceStarted);
                service.run(command_rx, result_rx);
                service.publish(CoordinatorEvent::ServiceStopped);

                // Closing the request channel stops the worker after its current fetch
                service.fetch_tx = None;
                if worker.join().is_err() {
                    log::error!("Fetch worker panicked");
                }
            })
            .expect("Failed to spawn coordinator service");

        ServiceHandle {
            command_tx,
            thread_handle: Some(thread_handle),
        }
    }

    fn new(
        config: CoordinatorConfig,
        engine_tx: rtrb::Producer<EngineCommand>,
        lane_events: Vec<rtrb::Consumer<LaneEvent>>,
        atomics: Vec<Arc<LaneAtomics>>,
        event_tx: Option<Sender<CoordinatorEvent>>,
        fetch_tx: Sender<FetchRequest>,
    ) -> Self {
        let lanes = config.lanes;
        let coordinator = LaneCoordinator::new(
            lanes,
            config.prefetch.target_depth,
            config.arrangement,
            config.seed,
        );
        let now = Instant::now();
        Self {
            config,
            coordinator,
            engine_tx,
            lane_events,
            atomics,
            event_tx,
            fetch_tx: Some(fetch_tx),
            in_flight: vec![0; lanes],
            seen_errors: vec![(0, 0); lanes],
            last_prefetch: None,
            last_retry: now,
            last_meter: now,
            last_health: now,
        }
    }

    /// Main service loop
    fn run(&mut self, command_rx: Receiver<CoordinatorCommand>, result_rx: Receiver<FetchResult>) {
        log::info!(
            "CoordinatorService started: {} lanes, arrangement {:?}",
            self.config.lanes,
            self.config.arrangement
        );
        let poll = Duration::from_millis(self.config.prefetch.event_poll_ms.max(1));

        loop {
            crossbeam::select! {
                recv(command_rx) -> cmd => {
                    match cmd {
                        Ok(CoordinatorCommand::Shutdown) => {
                            log::info!("CoordinatorService shutting down");
                            break;
                        }
                        Ok(cmd) => self.handle_command(cmd),
                        Err(_) => {
                            log::info!("Command channel closed, shutting down");
                            break;
                        }
                    }
                }
                recv(result_rx) -> result => {
                    if let Ok(result) = result {
                        self.handle_fetch(result);
                    }
                }
                default(poll) => {}
            }

            self.drain_lane_events();
            self.tick(Instant::now());
        }

        log::info!("CoordinatorService stopped");
    }

    fn handle_command(&mut self, cmd: CoordinatorCommand) {
        match cmd {
            CoordinatorCommand::Message { lane, message } => self.handle_message(lane, message),
            CoordinatorCommand::Bootstrap(buffer) => {
                log::info!("Bootstrapping {} lanes with a {}-frame sample", self.config.lanes, buffer.len());
                for delivery in self.coordinator.bootstrap(&buffer) {
                    self.deliver(delivery);
                }
                self.push_engine(EngineCommand::StartAll);
            }
            CoordinatorCommand::RequestRefill(lane) => {
                if let Some(delivery) = self.coordinator.request_refill(lane) {
                    self.deliver(delivery);
                }
                self.top_up(lane);
            }
            CoordinatorCommand::SetLaneGain { lane, gain } => {
                self.push_engine(EngineCommand::SetLaneGain { lane: lane.index(), gain });
            }
            CoordinatorCommand::SetMasterVolume(volume) => {
                self.push_engine(EngineCommand::SetMasterVolume(volume));
            }
            CoordinatorCommand::Shutdown => {}
        }
    }

    /// Lane port: start, stop, sendSample
    fn handle_message(&mut self, lane: LaneId, message: LaneMessage) {
        if lane.index() >= self.config.lanes {
            log::warn!("Dropping message for unknown {}", lane);
            return;
        }
        match message {
            LaneMessage::Start => {
                self.push_engine(EngineCommand::Start { lane: lane.index() });
            }
            LaneMessage::Stop => {
                self.push_engine(EngineCommand::Stop { lane: lane.index() });
            }
            LaneMessage::SendSample { buffer, index } => match validate_send_sample(buffer, index) {
                Ok(delivery) => {
                    if let Some(pair) = self.coordinator.deliver_slot(lane, delivery.slot, delivery.buffer) {
                        self.deliver(pair);
                    }
                }
                Err(e) => log::warn!("{}: dropping sendSample: {}", lane, e),
            },
        }
    }

    fn handle_fetch(&mut self, FetchResult { lane, result }: FetchResult) {
        if let Some(n) = self.in_flight.get_mut(lane.index()) {
            *n = n.saturating_sub(1);
        }
        match result {
            Ok(buffer) => {
                log::debug!("{}: fetched {} frames", lane, buffer.len());
                if let Some(delivery) = self.coordinator.push_sample(lane, buffer.into_stereo()) {
                    self.deliver(delivery);
                    self.top_up(lane);
                }
            }
            Err(e) => log::warn!("{}: fetch failed: {}", lane, e),
        }
    }

    /// Drain every lane's event ring
    fn drain_lane_events(&mut self) {
        for idx in 0..self.lane_events.len() {
            while let Ok(event) = self.lane_events[idx].pop() {
                let lane = LaneId(idx);
                if let Some(notification) = LaneNotification::from_event(lane, event) {
                    log::debug!("{}: {:?}", lane, event);
                    self.publish(CoordinatorEvent::Notification(notification));
                }
                let Some(refill) = self.coordinator.handle_event(lane, event) else {
                    continue;
                };
                if let Some(delivery) = refill.delivery {
                    self.deliver(delivery);
                }
                self.top_up(refill.target);
            }
        }
    }

    /// Run periodic tasks that are due
    fn tick(&mut self, now: Instant) {
        let prefetch_due = self
            .last_prefetch
            .map_or(true, |t| now.duration_since(t) >= Duration::from_millis(self.config.prefetch.interval_ms));
        if prefetch_due {
            self.last_prefetch = Some(now);
            self.prefetch();
        }

        if now.duration_since(self.last_retry) >= Duration::from_millis(self.config.prefetch.refill_retry_ms) {
            self.last_retry = now;
            for delivery in self.coordinator.retry_pending() {
                self.deliver(delivery);
            }
        }

        if now.duration_since(self.last_meter) >= Duration::from_millis(self.config.meter_interval_ms) {
            self.last_meter = now;
            self.publish(CoordinatorEvent::Levels(LevelReport::from_atomics(&self.atomics)));
        }

        if now.duration_since(self.last_health) >= HEALTH_INTERVAL {
            self.last_health = now;
            self.check_health();
        }
    }

    /// Request fetches until every pool is at its target depth
    fn prefetch(&mut self) {
        for (lane, count) in self.coordinator.deficits(&self.in_flight) {
            self.request_fetches(lane, count);
        }
    }

    fn top_up(&mut self, lane: LaneId) {
        if let Some((_, count)) = self
            .coordinator
            .deficits(&self.in_flight)
            .into_iter()
            .find(|(l, _)| *l == lane)
        {
            self.request_fetches(lane, count);
        }
    }

    fn request_fetches(&mut self, lane: LaneId, count: usize) {
        let Some(fetch_tx) = self.fetch_tx.as_ref() else {
            return;
        };
        for _ in 0..count {
            if fetch_tx.send(FetchRequest { lane }).is_err() {
                log::error!("Fetch worker is gone, cannot prefetch for {}", lane);
                return;
            }
            self.in_flight[lane.index()] += 1;
        }
    }

    /// Hand an arranged pair to the engine
    fn deliver(&mut self, Delivery { lane, pair }: Delivery) {
        let frames = pair.len();
        let pair = Owned::new(&gc_handle(), pair);
        if self.push_engine(EngineCommand::LoadPair { lane: lane.index(), pair }) {
            log::info!("{}: delivered pair of {} frames", lane, frames);
            self.publish(CoordinatorEvent::PairDelivered { lane, frames });
        }
    }

    fn push_engine(&mut self, cmd: EngineCommand) -> bool {
        match self.engine_tx.push(cmd) {
            Ok(()) => true,
            Err(_) => {
                log::error!("Engine command queue full, command dropped");
                false
            }
        }
    }

    fn publish(&self, event: CoordinatorEvent) {
        let Some(tx) = self.event_tx.as_ref() else {
            return;
        };
        match tx.try_send(event) {
            Ok(()) | Err(TrySendError::Disconnected(_)) => {}
            Err(TrySendError::Full(_)) => log::trace!("Coordinator event queue full, event dropped"),
        }
    }

    /// Turn audio-thread error counters into log lines
    fn check_health(&mut self) {
        for (idx, atomics) in self.atomics.iter().enumerate() {
            let current = (atomics.channel_errors(), atomics.dropped_events());
            let (errors, dropped) = self.seen_errors[idx];
            if current.0 > errors {
                log::warn!(
                    "{}: {} channel read(s) failed and were replaced by silence",
                    LaneId(idx),
                    current.0 - errors
                );
            }
            if current.1 > dropped {
                log::warn!("{}: {} lane event(s) dropped", LaneId(idx), current.1 - dropped);
            }
            self.seen_errors[idx] = current;
        }
    }
}
