//! Retention policy trait and the three concrete policies spec.md §4.5
//! names: `Strict`, `Prunable`, `Mutable`.

/// Which retention policy a timeline was created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    /// No modification of any kind, ever.
    Strict,
    /// Low-watermark pruning permitted; events below it become unreadable.
    Prunable,
    /// Individual events may be tombstoned (payload zeroed) in place.
    Mutable,
}

/// A timeline's modification policy. Kept as a trait object rather than
/// a bare enum so each policy's permitted-operations table lives next to
/// its own definition instead of in a match arm on [`Timeline`].
pub trait RetentionPolicy: std::fmt::Debug + Send + Sync {
    /// This policy's kind, for introspection and error messages.
    fn kind(&self) -> PolicyKind;

    /// Whether [`Timeline::prune`](super::Timeline::prune) is permitted.
    fn supports_prune(&self) -> bool {
        false
    }

    /// Whether [`Timeline::tombstone`](super::Timeline::tombstone) is
    /// permitted.
    fn supports_tombstone(&self) -> bool {
        false
    }
}

/// Append-only, immutable once committed. The default for most module
/// output timelines.
#[derive(Debug, Clone, Copy, Default)]
pub struct StrictPolicy;

impl RetentionPolicy for StrictPolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Strict
    }
}

/// Permits advancing a low-watermark to drop old events from cursor
/// visibility. Indices are retained so later ticks keep their identity.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrunablePolicy;

impl RetentionPolicy for PrunablePolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Prunable
    }

    fn supports_prune(&self) -> bool {
        true
    }
}

/// Permits tombstoning (zeroing) an individual event's payload in
/// place, for compliance-style redaction, while keeping its tick and
/// trace context intact.
#[derive(Debug, Clone, Copy, Default)]
pub struct MutablePolicy;

impl RetentionPolicy for MutablePolicy {
    fn kind(&self) -> PolicyKind {
        PolicyKind::Mutable
    }

    fn supports_tombstone(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_match_capabilities() {
        assert!(!StrictPolicy.supports_prune());
        assert!(!StrictPolicy.supports_tombstone());
        assert!(PrunablePolicy.supports_prune());
        assert!(MutablePolicy.supports_tombstone());
    }
}
