//! Identifier and time types for kernel entities.
//!
//! Every entity that needs a stable identity — a process, a module
//! instance, a blob, a channel, a committed event — is identified by a
//! monotonic integer minted from a process-wide counter. IDs never get
//! reused within a kernel lifetime, which keeps timeline `tick`s and
//! blob handles safe to cache across Weaves.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing source of 64-bit identifiers.
#[derive(Debug, Default)]
pub struct IdSource(AtomicU64);

impl IdSource {
    /// Creates a new source starting at 1 (0 is reserved as "no id").
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    /// Mints the next id.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

macro_rules! id_type {
    ($name:ident, $prefix:literal) => {
        #[doc = concat!("Identifier for a ", $prefix, ".")]
        #[derive(
            Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Wraps a raw numeric id (for testing and deserialization).
            #[must_use]
            pub const fn from_raw(raw: u64) -> Self {
                Self(raw)
            }

            /// Returns the raw numeric value.
            #[must_use]
            pub const fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

id_type!(ProcessId, "P");
id_type!(BlobHandle, "B");
id_type!(ChannelId, "C");
id_type!(EventSeq, "E");

/// A monotonic, unique 64-bit logical step index on a timeline.
///
/// `Tick` is assigned at commit time and, per the timeline invariant,
/// never changes or shifts when events are later pruned.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tick(pub u64);

impl Tick {
    /// The first tick ever assigned.
    pub const FIRST: Self = Self(1);

    /// Returns the next tick in sequence.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Debug for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tick({})", self.0)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Injected logical clock. Deterministic, decoupled from wall time —
/// virtual time is the truth for everything the kernel schedules.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VirtualTime(pub u64);

impl VirtualTime {
    /// The epoch.
    pub const ZERO: Self = Self(0);

    /// Advances virtual time by `delta`, saturating on overflow.
    #[must_use]
    pub const fn advance(self, delta: u64) -> Self {
        Self(self.0.saturating_add(delta))
    }

    /// Signed skew between this (actual) time and a `target` time.
    #[must_use]
    pub fn skew_from(self, target: Self) -> i64 {
        i128::from(self.0) as i64 - (i128::from(target.0) as i64)
    }
}

impl fmt::Debug for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VirtualTime({})", self.0)
    }
}

impl fmt::Display for VirtualTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vt{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_source_is_monotonic_and_never_zero() {
        let src = IdSource::new();
        let a = src.next();
        let b = src.next();
        assert!(a >= 1);
        assert!(b > a);
    }

    #[test]
    fn tick_sequence_strictly_increases() {
        let t0 = Tick::FIRST;
        let t1 = t0.next();
        assert!(t1 > t0);
    }

    #[test]
    fn virtual_time_skew_positive_when_late() {
        let target = VirtualTime(100);
        let actual = VirtualTime(130);
        assert_eq!(actual.skew_from(target), 30);
    }

    #[test]
    fn virtual_time_skew_zero_on_time() {
        let t = VirtualTime(50);
        assert_eq!(t.skew_from(t), 0);
    }

    #[test]
    fn process_id_display_has_prefix() {
        let id = ProcessId::from_raw(7);
        assert_eq!(format!("{id}"), "P7");
    }
}
