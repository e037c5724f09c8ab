//! Append-only per-process event log with three retention policies
//! (spec.md §4.5) and cursor-based iteration.

pub mod cursor;
pub mod policy;

pub use cursor::Cursor;
pub use policy::{MutablePolicy, PolicyKind, PrunablePolicy, RetentionPolicy, StrictPolicy};

use crate::error::{Error, Result};
use crate::types::{Tick, VirtualTime};
use crate::value::Value;
use std::collections::HashMap;

/// W3C-style trace context carried on every committed event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraceContext {
    /// 128-bit trace id, split as two 64-bit halves for storage.
    pub trace_id: u128,
    /// 64-bit span id.
    pub span_id: u64,
    /// Trace flags (bit 0: sampled).
    pub flags: u8,
}

/// One event committed to a timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct CommittedEvent {
    /// Monotonic, unique logical step index. Never changes after commit.
    pub tick: Tick,
    /// Virtual time at commit.
    pub virt_time: VirtualTime,
    /// Informational wall-clock timestamp (unconstrained, spec.md §3).
    pub wall_ts_nanos: u64,
    /// Topic the event was published on.
    pub topic: String,
    /// Event payload; zeroed if tombstoned.
    pub payload: Value,
    /// Trace context, preserved even through tombstoning.
    pub trace: TraceContext,
    /// True once a `Mutable` timeline has tombstoned this event.
    pub tombstoned: bool,
}

/// Append-only committed event log for one process.
#[derive(Debug)]
pub struct Timeline {
    policy: Box<dyn RetentionPolicy>,
    events: Vec<CommittedEvent>,
    topic_index: HashMap<String, Vec<usize>>,
    next_tick: Tick,
    /// For `Prunable`: the inclusive low-watermark below which events are
    /// unreadable. Indices are never compacted (spec.md §4.5).
    watermark: Option<Tick>,
    /// Bumped on every successful prune so open cursors can detect that
    /// their segment has been invalidated.
    prune_epoch: u64,
}

impl Timeline {
    /// Creates an empty timeline under the given retention policy.
    #[must_use]
    pub fn new(policy: Box<dyn RetentionPolicy>) -> Self {
        Self {
            policy,
            events: Vec::new(),
            topic_index: HashMap::new(),
            next_tick: Tick::FIRST,
            watermark: None,
            prune_epoch: 0,
        }
    }

    /// This timeline's retention policy kind.
    #[must_use]
    pub fn policy_kind(&self) -> PolicyKind {
        self.policy.kind()
    }

    /// Appends a committed event, assigning the next monotonic tick.
    /// Called only from the Weave commit phase (spec.md §4.8).
    pub fn append(
        &mut self,
        topic: String,
        payload: Value,
        virt_time: VirtualTime,
        wall_ts_nanos: u64,
        trace: TraceContext,
    ) -> Tick {
        let tick = self.next_tick;
        self.next_tick = self.next_tick.next();
        let index = self.events.len();
        self.topic_index.entry(topic.clone()).or_default().push(index);
        self.events.push(CommittedEvent {
            tick,
            virt_time,
            wall_ts_nanos,
            topic,
            payload,
            trace,
            tombstoned: false,
        });
        tick
    }

    /// Total committed events, including pruned/tombstoned ones (indices
    /// are never compacted).
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True when no events have ever been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Advances the low-watermark for a `Prunable` timeline. Events with
    /// `tick < watermark` become unreadable by cursors. Rejected for
    /// other policies.
    pub fn prune(&mut self, watermark: Tick) -> Result<()> {
        if !self.policy.supports_prune() {
            return Err(Error::perm("timeline policy does not support pruning"));
        }
        let current = self.watermark.unwrap_or(Tick(0));
        if watermark < current {
            return Err(Error::invalid("watermark must advance monotonically"));
        }
        self.watermark = Some(watermark);
        self.prune_epoch += 1;
        Ok(())
    }

    /// Tombstones a single event by tick: payload bytes are zeroed while
    /// header/id/trace are preserved. Rejected for non-`Mutable` policies.
    pub fn tombstone(&mut self, tick: Tick) -> Result<()> {
        if !self.policy.supports_tombstone() {
            return Err(Error::perm("timeline policy does not support tombstoning"));
        }
        let event = self
            .events
            .iter_mut()
            .find(|e| e.tick == tick)
            .ok_or_else(|| Error::not_found("no event with that tick"))?;
        event.payload = Value::Bytes(Vec::new());
        event.tombstoned = true;
        Ok(())
    }

    fn is_visible(&self, index: usize) -> bool {
        let event = &self.events[index];
        self.watermark.is_none_or(|w| event.tick >= w)
    }

    fn topic_matches(&self, event_topic: &str, prefix: Option<&str>) -> bool {
        prefix.is_none_or(|p| event_topic.starts_with(p))
    }

    /// Opens a cursor over this timeline (spec.md §3, Cursor).
    #[must_use]
    pub fn open_cursor(
        &self,
        topic_prefix: Option<String>,
        start: Tick,
        end: Option<Tick>,
        descending: bool,
    ) -> Cursor {
        Cursor::new(topic_prefix, start, end, descending, self.prune_epoch, self.watermark)
    }
}
