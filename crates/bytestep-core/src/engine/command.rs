//! Lock-free queues between the control context and the audio thread
//!
//! Control → audio: one [`EngineCommand`] ring, drained at the start of every
//! audio callback. Audio → control: one [`LaneEvent`] ring per lane, pushed
//! from inside the callback when a lane crosses a completion threshold.
//!
//! Both directions use `rtrb`: fixed capacity allocated up front, wait-free
//! push and pop, single producer and single consumer.

use basedrop::Owned;

use crate::buffer::WorkingPair;

/// Commands sent from the control context to the audio thread
pub enum EngineCommand {
    /// Start converging on a lane
    Start { lane: usize },
    /// Stop a lane (it outputs silence but keeps its state)
    Stop { lane: usize },
    StartAll,
    StopAll,
    /// Deliver a freshly arranged pair to a lane
    ///
    /// Installed immediately when the lane has nothing to play, otherwise held
    /// until the lane's next cycle boundary. `Owned` keeps the command
    /// pointer-sized and moves deallocation of the replaced pair off the
    /// audio thread.
    LoadPair {
        lane: usize,
        pair: Owned<WorkingPair>,
    },
    /// Per-lane mix gain
    SetLaneGain { lane: usize, gain: f32 },
    /// Master output volume (0.0 - 1.0)
    SetMasterVolume(f32),
}

/// Notifications a lane raises at a cycle boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaneEvent {
    /// Convergence passed the refill threshold: this lane wants new material
    RequestNewSample,
    /// Convergence passed the cross-lane threshold: route a refill elsewhere
    NextTrigger,
    /// A pending pair was swapped in
    PairSwapped,
}

/// Capacity of the command queue
///
/// A refill burst is at most one `LoadPair` per lane; start-up sends a start
/// and a gain per lane on top of that.
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Capacity of each lane's event queue
pub const EVENT_QUEUE_CAPACITY: usize = 64;

/// Create the command channel `(Producer, Consumer)`
///
/// The producer lives in the coordinator service, the consumer in the engine.
pub fn command_channel() -> (rtrb::Producer<EngineCommand>, rtrb::Consumer<EngineCommand>) {
    rtrb::RingBuffer::new(COMMAND_QUEUE_CAPACITY)
}

/// Create one lane's event channel
pub fn event_channel() -> (rtrb::Producer<LaneEvent>, rtrb::Consumer<LaneEvent>) {
    rtrb::RingBuffer::new(EVENT_QUEUE_CAPACITY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_channel_roundtrip() {
        let (mut tx, mut rx) = command_channel();
        tx.push(EngineCommand::Start { lane: 1 }).unwrap();
        let cmd = rx.pop().unwrap();
        assert!(matches!(cmd, EngineCommand::Start { lane: 1 }));
        assert!(rx.pop().is_err());
    }

    #[test]
    fn test_command_size() {
        // Owned<WorkingPair> is a single pointer
        let size = std::mem::size_of::<EngineCommand>();
        assert!(size <= 24, "EngineCommand is {} bytes, expected <= 24", size);
    }

    #[test]
    fn test_event_channel_is_bounded() {
        let (mut tx, _rx) = event_channel();
        for _ in 0..EVENT_QUEUE_CAPACITY {
            tx.push(LaneEvent::NextTrigger).unwrap();
        }
        assert!(tx.push(LaneEvent::NextTrigger).is_err());
    }
}
