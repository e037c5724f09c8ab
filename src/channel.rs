//! Dynamic typed ring-buffer channels (spec.md §4.4).
//!
//! A channel is a fixed-capacity MPMC ring of fixed-size slots, billed to
//! its owner's memory quota at creation. Writes are non-blocking — a
//! full channel returns `ERR_IO` immediately rather than waiting. Reads
//! are destructive, oldest first, and ignore the `start` cursor argument
//! that the staging area honors.

use crate::error::{Error, Result};
use crate::memory::BlobTable;
use crate::types::{ChannelId, ProcessId};
use crate::value::Value;
use crossbeam_queue::ArrayQueue;
use parking_lot::Mutex;
use std::sync::mpsc::Sender;

/// Direction a channel was declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Owner produces, others consume.
    Producer,
    /// Owner consumes, others produce.
    Consumer,
    /// Both directions permitted.
    Duplex,
}

/// A fixed-capacity, thread-safe ring buffer of [`Value`]s, keyed by an
/// auto-generated URI in the reserved `filament/channel/` namespace.
pub struct Channel {
    id: ChannelId,
    uri: String,
    schema_uri: String,
    root_tag: u32,
    direction: Direction,
    owner: ProcessId,
    msg_size: usize,
    queue: ArrayQueue<Value>,
    waiters: Mutex<Vec<Sender<Result<Value>>>>,
}

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("id", &self.id)
            .field("uri", &self.uri)
            .field("capacity", &self.queue.capacity())
            .finish_non_exhaustive()
    }
}

/// A rough estimate of a value's encoded size, used to enforce the
/// channel's declared `msg_size` without re-running the full codec on
/// every write.
fn estimated_size(value: &Value) -> usize {
    match value {
        Value::Unit => 8,
        Value::Bool(_) | Value::I64(_) | Value::U64(_) | Value::F64(_) | Value::BlobRef(_) => 32,
        Value::StringView(s) => 32 + s.len(),
        Value::Bytes(b) => 32 + b.len(),
        Value::List(items) => 32 + items.iter().map(estimated_size).sum::<usize>(),
        Value::Map(pairs) => {
            48 * pairs.len()
                + pairs
                    .iter()
                    .map(|(k, v)| estimated_size(k) + estimated_size(v))
                    .sum::<usize>()
        }
    }
}

impl Channel {
    /// Creates a channel, returning it plus the byte budget
    /// (`capacity * msg_size`) the caller should bill to the owner's
    /// memory quota (spec.md §4.4).
    #[must_use]
    pub fn create(
        id: ChannelId,
        uri: String,
        schema_uri: String,
        root_tag: u32,
        direction: Direction,
        owner: ProcessId,
        capacity: usize,
        msg_size: usize,
    ) -> (Self, u64) {
        let byte_budget = (capacity * msg_size) as u64;
        let channel = Self {
            id,
            uri,
            schema_uri,
            root_tag,
            direction,
            owner,
            msg_size,
            queue: ArrayQueue::new(capacity.max(1)),
            waiters: Mutex::new(Vec::new()),
        };
        (channel, byte_budget)
    }

    /// The channel's auto-generated URI.
    #[must_use]
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Stable identity.
    #[must_use]
    pub const fn id(&self) -> ChannelId {
        self.id
    }

    /// Declared schema URI, compared byte-wise at spawn time between
    /// producer and consumer (spec.md §4.9).
    #[must_use]
    pub fn schema_uri(&self) -> &str {
        &self.schema_uri
    }

    /// Declared root value type tag.
    #[must_use]
    pub const fn root_tag(&self) -> u32 {
        self.root_tag
    }

    /// Owning process.
    #[must_use]
    pub const fn owner(&self) -> ProcessId {
        self.owner
    }

    /// Declared direction.
    #[must_use]
    pub const fn direction(&self) -> Direction {
        self.direction
    }

    /// Non-blocking write. Returns `ERR_INVALID` for oversize payloads,
    /// `ERR_TYPE` for a root-tag mismatch, `ERR_IO` when full. Any
    /// `BlobRef` inside `value` has its refcount bumped atomically
    /// before the value is enqueued, per spec.md §4.4 ("blob payload is
    /// never copied").
    pub fn write(&self, value: Value, blobs: &mut BlobTable) -> Result<()> {
        if value.tag() != self.root_tag {
            return Err(Error::type_mismatch("value does not match channel root type"));
        }
        if estimated_size(&value) > self.msg_size {
            return Err(Error::invalid("value exceeds channel msg_size"));
        }
        if let Value::BlobRef(handle) = &value {
            blobs.bump_ref_for_transfer(*handle)?;
        }
        self.queue
            .push(value)
            .map_err(|_| Error::io("channel is full"))
    }

    /// Destructive read: pops the oldest pending value, ignoring any
    /// `start` argument (channels are not seekable, spec.md §4.4).
    pub fn read(&self) -> Option<Value> {
        self.queue.pop()
    }

    /// Registers a waiter to be notified if the channel is destroyed
    /// while it is empty (spec.md §3, Channel invariant).
    pub fn register_waiter(&self, sender: Sender<Result<Value>>) {
        self.waiters.lock().push(sender);
    }

    /// Tears the channel down: releases every pending event's blob
    /// refs and wakes every registered waiter with `ERR_NOT_FOUND`
    /// (spec.md §4.4, §4.9 Terminate).
    pub fn destroy(&self, blobs: &mut BlobTable, quota_remaining: &mut u64) {
        while let Some(value) = self.queue.pop() {
            if let Value::BlobRef(handle) = value {
                blobs.force_release(handle, quota_remaining);
            }
        }
        for waiter in self.waiters.lock().drain(..) {
            let _ = waiter.send(Err(Error::not_found("channel destroyed")));
        }
    }

    /// Current occupied slot count.
    #[must_use]
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// True when no events are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Declared capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_channel(capacity: usize, msg_size: usize) -> Channel {
        Channel::create(
            ChannelId::from_raw(1),
            "filament/channel/1".into(),
            "filament/schema/u64".into(),
            Value::U64(0).tag(),
            Direction::Duplex,
            ProcessId::from_raw(1),
            capacity,
            msg_size,
        )
        .0
    }

    #[test]
    fn backpressure_scenario_from_spec() {
        let channel = make_channel(2, 64);
        let mut blobs = BlobTable::default();
        assert!(channel.write(Value::U64(1), &mut blobs).is_ok());
        assert!(channel.write(Value::U64(2), &mut blobs).is_ok());
        let err = channel.write(Value::U64(3), &mut blobs).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Io);

        assert_eq!(channel.read(), Some(Value::U64(1)));
        assert!(channel.write(Value::U64(3), &mut blobs).is_ok());
    }

    #[test]
    fn reads_are_destructive_and_fifo() {
        let channel = make_channel(4, 64);
        let mut blobs = BlobTable::default();
        channel.write(Value::U64(1), &mut blobs).unwrap();
        channel.write(Value::U64(2), &mut blobs).unwrap();
        assert_eq!(channel.read(), Some(Value::U64(1)));
        assert_eq!(channel.read(), Some(Value::U64(2)));
        assert_eq!(channel.read(), None);
    }

    #[test]
    fn oversize_write_is_invalid() {
        let channel = make_channel(4, 4);
        let mut blobs = BlobTable::default();
        let err = channel.write(Value::U64(1), &mut blobs).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Invalid);
    }

    #[test]
    fn mismatched_root_type_is_type_error() {
        let channel = make_channel(4, 64);
        let mut blobs = BlobTable::default();
        let err = channel.write(Value::Bool(true), &mut blobs).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Type);
    }

    #[test]
    fn destroy_wakes_waiters_with_not_found() {
        let channel = make_channel(4, 64);
        let mut blobs = BlobTable::default();
        let mut quota = 0;
        let (tx, rx) = std::sync::mpsc::channel();
        channel.register_waiter(tx);
        channel.destroy(&mut blobs, &mut quota);
        let result = rx.recv().unwrap();
        assert_eq!(result.unwrap_err().kind, crate::error::ErrorKind::NotFound);
    }

    #[test]
    fn destroy_releases_pending_blob_refs() {
        let channel = Channel::create(
            ChannelId::from_raw(2),
            "filament/channel/2".into(),
            "filament/schema/blob".into(),
            Value::BlobRef(crate::types::BlobHandle::from_raw(0)).tag(),
            Direction::Duplex,
            ProcessId::from_raw(1),
            4,
            64,
        )
        .0;
        let mut blobs = BlobTable::default();
        let mut quota = 1000;
        let handle = blobs
            .alloc(ProcessId::from_raw(1), 32, crate::memory::DmaRequest::NONE, &mut quota)
            .unwrap();
        blobs.mark_committed(handle);
        channel.write(Value::BlobRef(handle), &mut blobs).unwrap();
        let mut release_quota = 0;
        channel.destroy(&mut blobs, &mut release_quota);
        assert_eq!(release_quota, 32);
    }
}
