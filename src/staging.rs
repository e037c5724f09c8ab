//! Per-process staging area (spec.md §4.3).
//!
//! The staging area is a zero-initialized scratch buffer, reset at the
//! start of every Weave. Static (manifest-declared) topics are written
//! and read sequentially against a per-topic cursor; writes accumulate
//! until commit moves them into the timeline, or are dropped intact on
//! discard.

use crate::error::{Error, Result};
use crate::value::Value;
use std::collections::HashMap;

/// Minimum staging capacity the spec guarantees (`MIN_BUS_BYTES`).
pub const MIN_BUS_BYTES: usize = 65_536;

#[derive(Debug, Default, Clone)]
struct Topic {
    pending: Vec<Value>,
    read_cursor: usize,
}

/// Per-process staging area. One instance lives for the process's whole
/// lifetime; [`StagingArea::begin_weave`] resets it at the top of every
/// Weave (spec.md §4.8, Ingress phase).
#[derive(Debug, Default)]
pub struct StagingArea {
    capacity: usize,
    topics: HashMap<String, Topic>,
}

impl StagingArea {
    /// Creates a staging area with at least `MIN_BUS_BYTES` capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(MIN_BUS_BYTES),
            topics: HashMap::new(),
        }
    }

    /// The configured byte capacity (informational; values are tracked
    /// as typed [`Value`]s here rather than raw bytes, since the codec
    /// already enforces size/shape at the channel and ABI boundary).
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Resets every topic's sequential read cursor for the new Weave.
    /// Called at Ingress (spec.md §4.3, §4.8). Pending writes are left
    /// untouched here — commit drains them into the timeline and
    /// discard clears them explicitly, so by the time Ingress runs for
    /// the next Weave every topic's pending list is already empty.
    pub fn begin_weave(&mut self) {
        for topic in self.topics.values_mut() {
            topic.read_cursor = 0;
        }
    }

    /// Drops every topic's pending writes intact, without moving them
    /// into the timeline. Called from the Weave discard phase
    /// (spec.md §4.3: "on discard the buffer is dropped intact").
    pub fn discard(&mut self) {
        for topic in self.topics.values_mut() {
            topic.pending.clear();
        }
    }

    /// Writes a value to a static topic, buffering until commit.
    pub fn write(&mut self, topic: &str, value: Value) {
        self.topics.entry(topic.to_owned()).or_default().pending.push(value);
    }

    /// Reads the next value on `topic` starting at `start`, or `None` at
    /// end of the topic's pending values (spec.md §4.3: "`start` argument
    /// to read").
    pub fn read(&mut self, topic: &str, start: usize) -> Option<&Value> {
        let t = self.topics.get_mut(topic)?;
        t.read_cursor = start;
        t.pending.get(start)
    }

    /// All pending writes on `topic`, in write order — used by the Weave
    /// commit phase to move static-topic outputs into the timeline.
    #[must_use]
    pub fn drain_topic(&mut self, topic: &str) -> Vec<Value> {
        self.topics
            .get_mut(topic)
            .map(|t| std::mem::take(&mut t.pending))
            .unwrap_or_default()
    }

    /// All topics that currently hold pending writes, for the commit
    /// phase to iterate without the caller needing to know topic names
    /// up front.
    #[must_use]
    pub fn pending_topics(&self) -> Vec<String> {
        self.topics
            .iter()
            .filter(|(_, t)| !t.pending.is_empty())
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Injects a host-originated inbound event (spec.md §4.6) directly
    /// onto a topic, bypassing the write-count bookkeeping a module
    /// write would use — used by the capability router at ingress.
    pub fn inject_inbound(&mut self, topic: &str, value: Value) -> Result<()> {
        if topic.is_empty() {
            return Err(Error::invalid("inbound topic must not be empty"));
        }
        self.write(topic, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_returns_value_at_start() {
        let mut staging = StagingArea::new(0);
        staging.write("a", Value::U64(7));
        staging.write("a", Value::U64(8));
        assert_eq!(staging.read("a", 0), Some(&Value::U64(7)));
        assert_eq!(staging.read("a", 1), Some(&Value::U64(8)));
        assert_eq!(staging.read("a", 2), None);
    }

    #[test]
    fn begin_weave_resets_cursor_but_leaves_pending_writes() {
        let mut staging = StagingArea::new(0);
        staging.write("a", Value::U64(1));
        staging.read("a", 0);
        staging.begin_weave();
        assert_eq!(staging.read("a", 0), Some(&Value::U64(1)));
    }

    #[test]
    fn discard_drops_pending_writes_intact() {
        let mut staging = StagingArea::new(0);
        staging.write("a", Value::U64(1));
        staging.discard();
        assert!(staging.drain_topic("a").is_empty());
    }

    #[test]
    fn capacity_is_floored_at_min_bus_bytes() {
        let staging = StagingArea::new(100);
        assert_eq!(staging.capacity(), MIN_BUS_BYTES);
    }

    #[test]
    fn drain_topic_empties_pending_writes() {
        let mut staging = StagingArea::new(0);
        staging.write("out", Value::I64(1));
        let drained = staging.drain_topic("out");
        assert_eq!(drained, vec![Value::I64(1)]);
        assert!(staging.drain_topic("out").is_empty());
    }
}
