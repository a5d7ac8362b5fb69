//! Lane coordinator - refill routing and prefetch bookkeeping
//!
//! Pure control-side state, no threads and no queues: the service feeds it lane
//! events, fetched buffers and port messages, and pushes whatever pairs it
//! hands back to the engine.
//!
//! Routing rules:
//! - `RequestNewSample` from a lane refills that same lane
//! - `NextTrigger` from a lane refills a different lane, chosen uniformly
//!
//! A refill pops two buffers from the target lane's pool into its inbox slots,
//! where they are arranged into a [`WorkingPair`]. A lane whose pool holds
//! fewer than two buffers keeps the request pending until enough arrive.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::inbox::SampleInbox;
use super::pool::PrefetchPool;
use crate::arrangement::ArrangementPolicy;
use crate::buffer::{SampleBuffer, WorkingPair};
use crate::engine::LaneEvent;
use crate::types::LaneId;

/// Outstanding refills kept per lane; further requests are folded in
pub const MAX_PENDING_REFILLS: u32 = 2;

/// A pair ready for a lane
#[derive(Debug)]
pub struct Delivery {
    pub lane: LaneId,
    pub pair: WorkingPair,
}

/// Outcome of a routed lane event
#[derive(Debug)]
pub struct Refill {
    /// Lane the refill went to
    pub target: LaneId,
    /// Set when the target's pool already held two buffers
    pub delivery: Option<Delivery>,
}

pub struct LaneCoordinator {
    pools: Vec<PrefetchPool>,
    inboxes: Vec<SampleInbox>,
    pending_refills: Vec<u32>,
    policy: ArrangementPolicy,
    rng: StdRng,
}

impl LaneCoordinator {
    /// `seed` makes every random choice reproducible; `None` seeds from entropy
    pub fn new(
        lane_count: usize,
        target_depth: usize,
        policy: ArrangementPolicy,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            pools: (0..lane_count).map(|_| PrefetchPool::new(target_depth)).collect(),
            inboxes: (0..lane_count).map(|_| SampleInbox::new()).collect(),
            pending_refills: vec![0; lane_count],
            policy,
            rng,
        }
    }

    pub fn lane_count(&self) -> usize {
        self.pools.len()
    }

    pub fn pool(&self, lane: LaneId) -> Option<&PrefetchPool> {
        self.pools.get(lane.index())
    }

    pub fn pending_refills(&self, lane: LaneId) -> u32 {
        self.pending_refills.get(lane.index()).copied().unwrap_or(0)
    }

    pub fn policy(&self) -> ArrangementPolicy {
        self.policy
    }

    /// Lane a refill should go to for an event raised by `lane`
    pub fn route(&mut self, lane: LaneId, event: LaneEvent) -> Option<LaneId> {
        match event {
            LaneEvent::RequestNewSample => Some(lane),
            LaneEvent::NextTrigger => Some(self.pick_other_lane(lane)),
            LaneEvent::PairSwapped => None,
        }
    }

    /// Uniformly pick a lane other than `lane`
    ///
    /// Rejection sampling over all lanes. With a single lane there is no
    /// other lane, so the lane itself is returned.
    pub fn pick_other_lane(&mut self, lane: LaneId) -> LaneId {
        let count = self.lane_count();
        if count <= 1 {
            return lane;
        }
        loop {
            let candidate = LaneId(self.rng.gen_range(0..count));
            if candidate != lane {
                return candidate;
            }
        }
    }

    /// Handle a lane event end to end: route, then refill the target
    ///
    /// `None` for events that need no refill.
    pub fn handle_event(&mut self, lane: LaneId, event: LaneEvent) -> Option<Refill> {
        let target = self.route(lane, event)?;
        if target != lane {
            log::debug!("{}: cross-lane trigger routed to {}", lane, target);
        }
        Some(Refill {
            target,
            delivery: self.request_refill(target),
        })
    }

    /// Refill `lane` from its pool, or leave the request pending
    pub fn request_refill(&mut self, lane: LaneId) -> Option<Delivery> {
        let idx = lane.index();
        let pool = self.pools.get_mut(idx)?;
        match pool.pop_pair() {
            Some((first, second)) => self.fill_slots(lane, first, second),
            None => {
                let pending = &mut self.pending_refills[idx];
                *pending = (*pending + 1).min(MAX_PENDING_REFILLS);
                log::debug!(
                    "{}: refill pending, pool holds {} buffer(s)",
                    lane,
                    pool.len()
                );
                None
            }
        }
    }

    /// Add a fetched buffer to a lane's pool, satisfying a pending refill if it can
    pub fn push_sample(&mut self, lane: LaneId, buffer: SampleBuffer) -> Option<Delivery> {
        let idx = lane.index();
        self.pools.get_mut(idx)?.push(buffer);
        self.satisfy_pending(lane)
    }

    /// Retry every pending refill whose pool has filled up
    pub fn retry_pending(&mut self) -> Vec<Delivery> {
        (0..self.lane_count())
            .filter_map(|i| self.satisfy_pending(LaneId(i)))
            .collect()
    }

    fn satisfy_pending(&mut self, lane: LaneId) -> Option<Delivery> {
        let idx = lane.index();
        if self.pending_refills.get(idx).copied().unwrap_or(0) == 0 {
            return None;
        }
        let (first, second) = self.pools[idx].pop_pair()?;
        self.pending_refills[idx] -= 1;
        self.fill_slots(lane, first, second)
    }

    fn fill_slots(&mut self, lane: LaneId, first: SampleBuffer, second: SampleBuffer) -> Option<Delivery> {
        self.deliver_slot(lane, 0, first);
        self.deliver_slot(lane, 1, second)
    }

    /// Put a buffer into one of a lane's inbox slots
    ///
    /// Returns the arranged pair once both slots are filled.
    pub fn deliver_slot(&mut self, lane: LaneId, slot: usize, buffer: SampleBuffer) -> Option<Delivery> {
        let (first, second) = self.inboxes.get_mut(lane.index())?.deliver(slot, buffer)?;
        self.arrange(lane, first, second)
    }

    fn arrange(&mut self, lane: LaneId, first: SampleBuffer, second: SampleBuffer) -> Option<Delivery> {
        let arranged = self.policy.arrange(first, second, &mut self.rng);
        match WorkingPair::new(arranged.s1, arranged.s2) {
            Ok(pair) => {
                log::debug!("{}: arranged pair of {} frames", lane, pair.len());
                Some(Delivery { lane, pair })
            }
            Err(e) => {
                log::warn!("{}: dropping unusable pair: {}", lane, e);
                None
            }
        }
    }

    /// Start-up material: the same buffer in both slots of every lane
    pub fn bootstrap(&mut self, buffer: &SampleBuffer) -> Vec<Delivery> {
        (0..self.lane_count())
            .filter_map(|i| {
                let lane = LaneId(i);
                self.deliver_slot(lane, 0, buffer.clone());
                self.deliver_slot(lane, 1, buffer.clone())
            })
            .collect()
    }

    /// Buffers to fetch per lane so each pool reaches its target depth
    pub fn deficits(&self, in_flight: &[usize]) -> Vec<(LaneId, usize)> {
        self.pools
            .iter()
            .enumerate()
            .map(|(i, pool)| {
                let flying = in_flight.get(i).copied().unwrap_or(0);
                // A pending refill needs two buffers even past the target depth
                let needed = if self.pending_refills[i] > 0 {
                    pool.deficit(flying).max(2usize.saturating_sub(pool.len() + flying))
                } else {
                    pool.deficit(flying)
                };
                (LaneId(i), needed)
            })
            .filter(|(_, n)| *n > 0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arrangement::Justify;

    fn buffer(len: usize, value: f32) -> SampleBuffer {
        SampleBuffer::new(vec![vec![value; len], vec![value; len]], 44100).unwrap()
    }

    fn coordinator(lanes: usize) -> LaneCoordinator {
        LaneCoordinator::new(lanes, 2, ArrangementPolicy::Equal, Some(1))
    }

    #[test]
    fn test_request_new_sample_refills_same_lane() {
        let mut c = coordinator(3);
        assert!(c.push_sample(LaneId(1), buffer(100, 0.1)).is_none());
        assert!(c.push_sample(LaneId(1), buffer(40, 0.2)).is_none());

        assert!(c.handle_event(LaneId(1), LaneEvent::PairSwapped).is_none());

        let refill = c.handle_event(LaneId(1), LaneEvent::RequestNewSample).unwrap();
        assert_eq!(refill.target, LaneId(1));
        let delivery = refill.delivery.unwrap();
        assert_eq!(delivery.lane, LaneId(1));
        assert_eq!(delivery.pair.len(), 100);
        assert!(c.pool(LaneId(1)).unwrap().is_empty());
    }

    #[test]
    fn test_next_trigger_never_targets_self() {
        let mut c = coordinator(3);
        for _ in 0..200 {
            let target = c.route(LaneId(0), LaneEvent::NextTrigger).unwrap();
            assert_ne!(target, LaneId(0));
            assert!(target.index() < 3);
        }
    }

    #[test]
    fn test_next_trigger_covers_other_lanes() {
        let mut c = coordinator(4);
        let mut seen = [false; 4];
        for _ in 0..200 {
            seen[c.pick_other_lane(LaneId(2)).index()] = true;
        }
        assert_eq!(seen, [true, true, false, true]);
    }

    #[test]
    fn test_single_lane_routes_to_itself() {
        let mut c = coordinator(1);
        assert_eq!(c.route(LaneId(0), LaneEvent::NextTrigger), Some(LaneId(0)));
    }

    #[test]
    fn test_routing_is_reproducible_with_seed() {
        let mut a = LaneCoordinator::new(5, 2, ArrangementPolicy::Random, Some(99));
        let mut b = LaneCoordinator::new(5, 2, ArrangementPolicy::Random, Some(99));
        for i in 0..50 {
            let lane = LaneId(i % 5);
            assert_eq!(a.pick_other_lane(lane), b.pick_other_lane(lane));
        }
    }

    #[test]
    fn test_starved_refill_waits_for_samples() {
        let mut c = coordinator(2);
        assert!(c.request_refill(LaneId(0)).is_none());
        assert_eq!(c.pending_refills(LaneId(0)), 1);

        assert!(c.push_sample(LaneId(0), buffer(10, 0.0)).is_none());
        let delivery = c.push_sample(LaneId(0), buffer(10, 0.5)).unwrap();
        assert_eq!(delivery.lane, LaneId(0));
        assert_eq!(c.pending_refills(LaneId(0)), 0);
    }

    #[test]
    fn test_pending_refills_are_capped() {
        let mut c = coordinator(1);
        for _ in 0..5 {
            c.request_refill(LaneId(0));
        }
        assert_eq!(c.pending_refills(LaneId(0)), MAX_PENDING_REFILLS);
    }

    #[test]
    fn test_retry_pending_delivers_when_ready() {
        let mut c = coordinator(2);
        c.request_refill(LaneId(1));
        assert!(c.retry_pending().is_empty());
        c.pools[1].push(buffer(8, 0.0));
        c.pools[1].push(buffer(8, 0.0));
        let deliveries = c.retry_pending();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].lane, LaneId(1));
    }

    #[test]
    fn test_arranges_with_policy() {
        let mut c = LaneCoordinator::new(
            1,
            2,
            ArrangementPolicy::Repeat {
                justify: Justify::Start,
            },
            Some(3),
        );
        c.push_sample(LaneId(0), buffer(10, 0.5));
        c.push_sample(LaneId(0), buffer(25, 0.1));
        let delivery = c.request_refill(LaneId(0)).unwrap();
        let a = delivery.pair.a().channel(0).unwrap();
        assert_eq!(a.len(), 25);
        assert!(a[..20].iter().all(|&s| s == 0.5));
        assert!(a[20..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_bootstrap_gives_every_lane_a_pair() {
        let mut c = coordinator(3);
        let deliveries = c.bootstrap(&buffer(64, 0.3));
        assert_eq!(deliveries.len(), 3);
        for (i, d) in deliveries.iter().enumerate() {
            assert_eq!(d.lane, LaneId(i));
            assert_eq!(d.pair.a(), d.pair.b());
        }
    }

    #[test]
    fn test_empty_buffers_are_dropped() {
        let mut c = coordinator(1);
        assert!(c.deliver_slot(LaneId(0), 0, SampleBuffer::default()).is_none());
        assert!(c.deliver_slot(LaneId(0), 1, SampleBuffer::default()).is_none());
    }

    #[test]
    fn test_deficits() {
        let mut c = coordinator(2);
        assert_eq!(c.deficits(&[0, 0]), vec![(LaneId(0), 2), (LaneId(1), 2)]);
        assert_eq!(c.deficits(&[2, 1]), vec![(LaneId(1), 1)]);

        c.push_sample(LaneId(0), buffer(4, 0.0));
        c.push_sample(LaneId(0), buffer(4, 0.0));
        assert_eq!(c.deficits(&[0, 2]), vec![]);
    }

    #[test]
    fn test_unknown_lane_is_ignored() {
        let mut c = coordinator(1);
        assert!(c.request_refill(LaneId(4)).is_none());
        assert!(c.push_sample(LaneId(4), buffer(4, 0.0)).is_none());
    }
}
