//! Outbound authorization and inbound special-topic classification.

use super::CapabilitySet;
use crate::error::{Error, Result};
use crate::value::Value;

/// Kernel-handled topics that receive special treatment at ingress
/// rather than being forwarded as opaque channel traffic (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialTopic {
    /// `filament/time/set` — one-shot virtual-time timer registration.
    TimeSet,
    /// `filament/core/log` — forwarded to the host telemetry sink.
    CoreLog,
    /// `filament/core/panic` — forces rollback, marks process faulted.
    CorePanic,
    /// `filament/kv/set` — snapshot-isolated, last-write-wins buffered write.
    KvSet,
    /// `filament/kv/get` — snapshot-isolated read as of Weave start.
    KvGet,
    /// `filament/fs/*` — asynchronous filesystem request.
    Fs,
    /// `filament/net/http/*` — asynchronous HTTP request.
    Http,
}

impl SpecialTopic {
    /// Classifies a topic string, or `None` if it is ordinary channel
    /// traffic with no kernel-side handling.
    #[must_use]
    pub fn classify(topic: &str) -> Option<Self> {
        match topic {
            "filament/time/set" => Some(Self::TimeSet),
            "filament/core/log" => Some(Self::CoreLog),
            "filament/core/panic" => Some(Self::CorePanic),
            "filament/kv/set" => Some(Self::KvSet),
            "filament/kv/get" => Some(Self::KvGet),
            t if t.starts_with("filament/fs/") => Some(Self::Fs),
            t if t.starts_with("filament/net/http/") => Some(Self::Http),
            _ => None,
        }
    }
}

/// Wake bits carried on an inbound event, matching the weave-argument
/// wake-flag bitmap (spec.md §4.7).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WakeFlags(u32);

impl WakeFlags {
    /// No wake reason set.
    pub const NONE: Self = Self(0);
    /// Asynchronous I/O (fs/http) reply arrived.
    pub const WAKE_IO: Self = Self(1 << 0);
    /// A registered timer fired.
    pub const WAKE_TIMER: Self = Self(1 << 1);
    /// The instance is being woken for the first time.
    pub const WAKE_INIT: Self = Self(1 << 2);

    /// Bitwise-ORs another flag set in.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Reconstructs a flag set from a raw bitmap, as carried on the
    /// weave argument block.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// True if `flag` is set.
    #[must_use]
    pub const fn has(self, flag: Self) -> bool {
        self.0 & flag.0 != 0
    }

    /// The raw bitmap value, as delivered in the weave argument block.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

/// A host-originated event deposited into a process's staging area at
/// ingress (spec.md §4.6).
#[derive(Debug, Clone)]
pub struct InboundEvent {
    /// Destination topic.
    pub topic: String,
    /// Event payload.
    pub payload: Value,
    /// Wake bits to OR into the weave argument block.
    pub wake: WakeFlags,
}

/// Validates outbound emission and classifies inbound special topics.
#[derive(Debug, Default)]
pub struct CapabilityRouter;

impl CapabilityRouter {
    /// Creates a router. Stateless by design — grant sets live per
    /// process and are passed in at call time (spec.md §9, "avoid
    /// ambient singletons").
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Checks an outbound event's topic against the process's grant
    /// set. Unauthorized emission aborts the Weave with `ERR_PERM`.
    pub fn authorize_outbound(&self, grants: &CapabilitySet, topic: &str) -> Result<()> {
        if grants.authorizes_topic(topic) {
            Ok(())
        } else {
            Err(Error::perm(format!("topic '{topic}' is not granted")))
        }
    }

    /// Load-time affinity check: a `Pinned` grant must not be handed to
    /// a module that will run pooled/stateless (spec.md §4.6).
    pub fn check_affinity(&self, grants: &CapabilitySet, pooled_stateless: bool) -> Result<()> {
        if pooled_stateless && grants.has_pinned_grant() {
            Err(Error::perm("pinned capability cannot be granted to a stateless module"))
        } else {
            Ok(())
        }
    }

    /// Builds the wake-flag bitmap appropriate for a classified inbound
    /// special topic.
    #[must_use]
    pub fn wake_flags_for(topic: &str) -> WakeFlags {
        match SpecialTopic::classify(topic) {
            Some(SpecialTopic::Fs | SpecialTopic::Http) => WakeFlags::WAKE_IO,
            Some(SpecialTopic::TimeSet) => WakeFlags::WAKE_TIMER,
            _ => WakeFlags::NONE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilityGrant;
    use crate::types::Affinity;

    #[test]
    fn classifies_known_special_topics() {
        assert_eq!(SpecialTopic::classify("filament/time/set"), Some(SpecialTopic::TimeSet));
        assert_eq!(SpecialTopic::classify("filament/fs/read"), Some(SpecialTopic::Fs));
        assert_eq!(
            SpecialTopic::classify("filament/net/http/get"),
            Some(SpecialTopic::Http)
        );
        assert_eq!(SpecialTopic::classify("filament/channel/1"), None);
    }

    #[test]
    fn unauthorized_outbound_emission_is_permission_error() {
        let router = CapabilityRouter::new();
        let grants = CapabilitySet::new();
        let err = router.authorize_outbound(&grants, "filament/kv/set").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Perm);
    }

    #[test]
    fn authorized_outbound_emission_passes() {
        let router = CapabilityRouter::new();
        let mut grants = CapabilitySet::new();
        grants.insert(CapabilityGrant::new(
            "urn:kv",
            Affinity::Agnostic,
            [],
            ["filament/kv/set".to_string()],
        ));
        assert!(router.authorize_outbound(&grants, "filament/kv/set").is_ok());
    }

    #[test]
    fn pinned_grant_rejected_for_pooled_stateless_module() {
        let router = CapabilityRouter::new();
        let mut grants = CapabilitySet::new();
        grants.insert(CapabilityGrant::new("urn:hw", Affinity::Pinned, [], []));
        assert!(router.check_affinity(&grants, true).is_err());
        assert!(router.check_affinity(&grants, false).is_ok());
    }

    #[test]
    fn wake_flags_match_topic_class() {
        assert_eq!(CapabilityRouter::wake_flags_for("filament/fs/read"), WakeFlags::WAKE_IO);
        assert_eq!(CapabilityRouter::wake_flags_for("filament/time/set"), WakeFlags::WAKE_TIMER);
        assert_eq!(CapabilityRouter::wake_flags_for("other"), WakeFlags::NONE);
    }
}
