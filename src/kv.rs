//! Per-process key/value store (spec.md §4.6, `filament/kv/set|get`).
//!
//! Reads are snapshot-isolated as of the start of the current Weave;
//! writes are buffered and applied atomically — last write wins per key
//! — only on commit. A discarded Weave leaves the store bit-for-bit
//! unchanged, mirroring the blob retention journal's commit/discard
//! shape (spec.md §4.2).

use crate::value::Value;
use std::collections::HashMap;

/// A process's key/value store plus its per-Weave write buffer.
#[derive(Debug, Default)]
pub struct KvStore {
    committed: HashMap<String, Value>,
    pending: HashMap<String, Value>,
}

impl KvStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears the pending write buffer. A no-op in the normal cycle —
    /// commit drains pending into committed and discard clears it
    /// explicitly, so pending is already empty by the next Ingress —
    /// kept for callers that mutate a store outside a Weave cycle.
    pub fn begin_weave(&mut self) {
        self.pending.clear();
    }

    /// Reads a key as of the last commit, ignoring this Weave's own
    /// pending writes (spec.md §4.6: "snapshot-isolated read as of Weave
    /// start").
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.committed.get(key)
    }

    /// Buffers a write, last-write-wins within the Weave.
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.pending.insert(key.into(), value);
    }

    /// Applies every pending write to the committed map. Called from the
    /// Weave commit phase.
    pub fn commit(&mut self) {
        for (key, value) in self.pending.drain() {
            self.committed.insert(key, value);
        }
    }

    /// Drops pending writes without touching the committed map. Called
    /// from the Weave discard phase.
    pub fn discard(&mut self) {
        self.pending.clear();
    }

    /// Number of committed keys, for diagnostics.
    #[must_use]
    pub fn len(&self) -> usize {
        self.committed.len()
    }

    /// True when no keys have ever been committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.committed.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_are_isolated_from_pending_writes_until_commit() {
        let mut kv = KvStore::new();
        kv.set("a", Value::U64(1));
        assert_eq!(kv.get("a"), None);
        kv.commit();
        assert_eq!(kv.get("a"), Some(&Value::U64(1)));
    }

    #[test]
    fn last_write_wins_within_a_weave() {
        let mut kv = KvStore::new();
        kv.set("a", Value::U64(1));
        kv.set("a", Value::U64(2));
        kv.commit();
        assert_eq!(kv.get("a"), Some(&Value::U64(2)));
    }

    #[test]
    fn discard_leaves_committed_state_untouched() {
        let mut kv = KvStore::new();
        kv.set("a", Value::U64(1));
        kv.commit();
        kv.begin_weave();
        kv.set("a", Value::U64(99));
        kv.discard();
        assert_eq!(kv.get("a"), Some(&Value::U64(1)));
    }
}
