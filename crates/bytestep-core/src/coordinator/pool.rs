//! Per-lane FIFO of ready sample buffers

use std::collections::VecDeque;

use crate::buffer::SampleBuffer;

/// Default number of buffers each pool tries to hold
pub const DEFAULT_TARGET_DEPTH: usize = 2;

/// Ready buffers for one lane
///
/// Pushed by the fetch side, popped two at a time by a refill. Capacity is not
/// bounded here: the prefetch tick stops requesting once `target_depth` is
/// reached, so the queue stays around that size.
#[derive(Debug, Default)]
pub struct PrefetchPool {
    queue: VecDeque<SampleBuffer>,
    target_depth: usize,
}

impl PrefetchPool {
    pub fn new(target_depth: usize) -> Self {
        Self {
            queue: VecDeque::with_capacity(target_depth.max(2)),
            target_depth,
        }
    }

    pub fn push(&mut self, buffer: SampleBuffer) {
        self.queue.push_back(buffer);
    }

    /// Pop the two oldest buffers, or nothing if fewer than two are ready
    pub fn pop_pair(&mut self) -> Option<(SampleBuffer, SampleBuffer)> {
        if self.queue.len() < 2 {
            return None;
        }
        let first = self.queue.pop_front()?;
        let second = self.queue.pop_front()?;
        Some((first, second))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn can_refill(&self) -> bool {
        self.queue.len() >= 2
    }

    pub fn target_depth(&self) -> usize {
        self.target_depth
    }

    /// Buffers still missing to reach the target, counting `in_flight` fetches
    pub fn deficit(&self, in_flight: usize) -> usize {
        self.target_depth.saturating_sub(self.queue.len() + in_flight)
    }
}
