//! Batch-streaming cursor over a [`Timeline`](super::Timeline).
//!
//! A cursor walks a tick range, optionally filtered by topic prefix,
//! returning events in fixed-size batches. End of stream is signalled
//! by an empty batch rather than a sentinel value. If the timeline is
//! pruned past the cursor's current position while the cursor is open,
//! every subsequent call returns `ERR_NOT_FOUND` — a prune of any kind
//! invalidates all outstanding cursors on that timeline, not just ones
//! reading the pruned range. This is the deterministic behavior chosen
//! where spec.md leaves the exact invalidation signal to the
//! implementer (see DESIGN.md).

use super::{CommittedEvent, Timeline};
use crate::error::{Error, Result};
use crate::types::Tick;

/// An open read position over a timeline.
#[derive(Debug)]
pub struct Cursor {
    topic_prefix: Option<String>,
    position: Tick,
    end: Option<Tick>,
    descending: bool,
    epoch_at_open: u64,
    invalidated: bool,
}

impl Cursor {
    pub(super) fn new(
        topic_prefix: Option<String>,
        start: Tick,
        end: Option<Tick>,
        descending: bool,
        epoch_at_open: u64,
        _watermark_at_open: Option<Tick>,
    ) -> Self {
        Self {
            topic_prefix,
            position: start,
            end,
            descending,
            epoch_at_open,
            invalidated: false,
        }
    }

    /// Returns the next batch of at most `max_batch` events, advancing
    /// the cursor's position past the last one returned. An empty
    /// result means end of stream, not invalidation.
    pub fn next(&mut self, timeline: &Timeline, max_batch: usize) -> Result<Vec<CommittedEvent>> {
        if self.invalidated || timeline.prune_epoch != self.epoch_at_open {
            self.invalidated = true;
            return Err(Error::not_found("cursor invalidated: timeline was pruned"));
        }
        if max_batch == 0 {
            return Ok(Vec::new());
        }

        let mut indices: Vec<usize> = (0..timeline.events.len())
            .filter(|&i| {
                let event = &timeline.events[i];
                let in_range = if self.descending {
                    event.tick <= self.position && self.end.is_none_or(|e| event.tick >= e)
                } else {
                    event.tick >= self.position && self.end.is_none_or(|e| event.tick <= e)
                };
                in_range
                    && timeline.is_visible(i)
                    && timeline.topic_matches(&event.topic, self.topic_prefix.as_deref())
            })
            .collect();

        if self.descending {
            indices.sort_by_key(|&i| std::cmp::Reverse(timeline.events[i].tick));
        } else {
            indices.sort_by_key(|&i| timeline.events[i].tick);
        }
        indices.truncate(max_batch);

        let batch: Vec<CommittedEvent> =
            indices.iter().map(|&i| timeline.events[i].clone()).collect();

        if let Some(last) = batch.last() {
            self.position = if self.descending {
                if last.tick.0 == 0 {
                    last.tick
                } else {
                    Tick(last.tick.0 - 1)
                }
            } else {
                last.tick.next()
            };
        }
        Ok(batch)
    }

    /// Closes the cursor. Idempotent; present for symmetry with `open`
    /// and to mirror resource-lifecycle patterns used elsewhere in the
    /// kernel (spec.md §3, Cursor).
    pub fn close(&mut self) {
        self.invalidated = true;
    }
}

#[cfg(test)]
mod tests {
    use super::super::{StrictPolicy, TraceContext};
    use super::*;
    use crate::types::VirtualTime;
    use crate::value::Value;

    fn tc() -> TraceContext {
        TraceContext::default()
    }

    #[test]
    fn streams_in_batches_and_signals_eof_with_empty_batch() {
        let mut tl = Timeline::new(Box::new(StrictPolicy));
        for i in 0..5u64 {
            tl.append(format!("t{i}"), Value::U64(i), VirtualTime::ZERO, 0, tc());
        }
        let mut cursor = tl.open_cursor(None, Tick::FIRST, None, false);
        let batch1 = cursor.next(&tl, 2).unwrap();
        assert_eq!(batch1.len(), 2);
        let batch2 = cursor.next(&tl, 2).unwrap();
        assert_eq!(batch2.len(), 2);
        let batch3 = cursor.next(&tl, 2).unwrap();
        assert_eq!(batch3.len(), 1);
        let batch4 = cursor.next(&tl, 2).unwrap();
        assert!(batch4.is_empty());
    }

    #[test]
    fn topic_prefix_filters_results() {
        let mut tl = Timeline::new(Box::new(StrictPolicy));
        tl.append("kv/a".into(), Value::Unit, VirtualTime::ZERO, 0, tc());
        tl.append("fs/b".into(), Value::Unit, VirtualTime::ZERO, 0, tc());
        let mut cursor = tl.open_cursor(Some("kv".into()), Tick::FIRST, None, false);
        let batch = cursor.next(&tl, 10).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].topic, "kv/a");
    }

    #[test]
    fn prune_invalidates_open_cursor() {
        use super::super::PrunablePolicy;
        let mut tl = Timeline::new(Box::new(PrunablePolicy));
        tl.append("a".into(), Value::Unit, VirtualTime::ZERO, 0, tc());
        tl.append("a".into(), Value::Unit, VirtualTime::ZERO, 0, tc());
        let mut cursor = tl.open_cursor(None, Tick::FIRST, None, false);
        tl.prune(Tick(2)).unwrap();
        let err = cursor.next(&tl, 10).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::NotFound);
        let err_again = cursor.next(&tl, 10).unwrap_err();
        assert_eq!(err_again.kind, crate::error::ErrorKind::NotFound);
    }

    #[test]
    fn descending_cursor_walks_backward() {
        let mut tl = Timeline::new(Box::new(StrictPolicy));
        for i in 0..3u64 {
            tl.append("a".into(), Value::U64(i), VirtualTime::ZERO, 0, tc());
        }
        let mut cursor = tl.open_cursor(None, Tick(3), None, true);
        let batch = cursor.next(&tl, 10).unwrap();
        let ticks: Vec<u64> = batch.iter().map(|e| e.tick.0).collect();
        assert_eq!(ticks, vec![3, 2, 1]);
    }
}
