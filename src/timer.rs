//! Timer wheel over virtual time (spec.md §4.6, `filament/time/set`).
//!
//! A min-heap of one-shot timers keyed by target virtual time. Past
//! targets fire on the next Weave rather than being rejected — the
//! kernel never fails a late timer, it just reports the skew.

use crate::types::{ProcessId, VirtualTime};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Eq, PartialEq)]
struct TimerEntry {
    target: VirtualTime,
    owner: ProcessId,
    generation: u64,
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .target
            .cmp(&self.target)
            .then_with(|| other.generation.cmp(&self.generation))
    }
}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A fired timer, ready to be deposited as a `filament/time/fire`
/// inbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FiredTimer {
    /// The process that registered the timer.
    pub owner: ProcessId,
    /// The virtual time the timer was scheduled against.
    pub target: VirtualTime,
    /// Signed skew: `actual - target` at the moment it fired.
    pub skew: i64,
}

/// Min-heap of one-shot virtual-time timers.
#[derive(Debug, Default)]
pub struct TimerWheel {
    heap: BinaryHeap<TimerEntry>,
    next_generation: u64,
}

impl TimerWheel {
    /// Creates an empty wheel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a one-shot timer for `owner` targeting `target`
    /// virtual time.
    pub fn set(&mut self, owner: ProcessId, target: VirtualTime) {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.heap.push(TimerEntry { target, owner, generation });
    }

    /// The earliest still-pending target time, if any.
    #[must_use]
    pub fn peek_target(&self) -> Option<VirtualTime> {
        self.heap.peek().map(|e| e.target)
    }

    /// Pops every timer whose target is `<= now`, computing its skew.
    pub fn fire_due(&mut self, now: VirtualTime) -> Vec<FiredTimer> {
        let mut fired = Vec::new();
        while let Some(entry) = self.heap.peek() {
            if entry.target > now {
                break;
            }
            let Some(entry) = self.heap.pop() else { break };
            fired.push(FiredTimer {
                owner: entry.owner,
                target: entry.target,
                skew: now.skew_from(entry.target),
            });
        }
        fired
    }

    /// Number of pending timers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True if no timers are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Drops every pending timer for `owner` — used on process
    /// termination.
    pub fn cancel_owner(&mut self, owner: ProcessId) {
        let remaining: BinaryHeap<TimerEntry> =
            self.heap.drain().filter(|e| e.owner != owner).collect();
        self.heap = remaining;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pid(n: u64) -> ProcessId {
        ProcessId::from_raw(n)
    }

    #[test]
    fn fires_in_target_order() {
        let mut wheel = TimerWheel::new();
        wheel.set(pid(1), VirtualTime(200));
        wheel.set(pid(2), VirtualTime(100));
        wheel.set(pid(3), VirtualTime(150));
        assert_eq!(wheel.peek_target(), Some(VirtualTime(100)));
    }

    #[test]
    fn fire_due_returns_skew_and_leaves_future_timers_pending() {
        let mut wheel = TimerWheel::new();
        wheel.set(pid(1), VirtualTime(100));
        wheel.set(pid(2), VirtualTime(200));
        let fired = wheel.fire_due(VirtualTime(130));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].owner, pid(1));
        assert_eq!(fired[0].skew, 30);
        assert_eq!(wheel.peek_target(), Some(VirtualTime(200)));
    }

    #[test]
    fn past_target_fires_next_weave_with_positive_skew() {
        let mut wheel = TimerWheel::new();
        wheel.set(pid(1), VirtualTime(10));
        let fired = wheel.fire_due(VirtualTime(50));
        assert_eq!(fired[0].skew, 40);
    }

    #[test]
    fn cancel_owner_drops_only_that_owners_timers() {
        let mut wheel = TimerWheel::new();
        wheel.set(pid(1), VirtualTime(10));
        wheel.set(pid(2), VirtualTime(20));
        wheel.cancel_owner(pid(1));
        assert_eq!(wheel.len(), 1);
        assert_eq!(wheel.peek_target(), Some(VirtualTime(20)));
    }
}
