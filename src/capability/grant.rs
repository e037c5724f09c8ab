//! A single capability grant and a process's full grant set.

use crate::types::Affinity;
use std::collections::HashSet;

/// A URN-identified permission a process was spawned with (spec.md §3,
/// "Capability grant").
#[derive(Debug, Clone)]
pub struct CapabilityGrant {
    urn: String,
    affinity: Affinity,
    authorized_symbols: HashSet<String>,
    allowed_topics: HashSet<String>,
}

impl CapabilityGrant {
    /// Builds a grant. `allowed_topics` covers both directions — the
    /// router checks the same set for outbound emission and inbound
    /// dispatch (spec.md §4.6).
    #[must_use]
    pub fn new(
        urn: impl Into<String>,
        affinity: Affinity,
        authorized_symbols: impl IntoIterator<Item = String>,
        allowed_topics: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            urn: urn.into(),
            affinity,
            authorized_symbols: authorized_symbols.into_iter().collect(),
            allowed_topics: allowed_topics.into_iter().collect(),
        }
    }

    /// The grant's URN.
    #[must_use]
    pub fn urn(&self) -> &str {
        &self.urn
    }

    /// Whether this grant requires a pinned (non-pooled) instance.
    #[must_use]
    pub const fn affinity(&self) -> Affinity {
        self.affinity
    }

    fn authorizes_topic(&self, topic: &str) -> bool {
        self.allowed_topics.contains(topic)
    }

    fn authorizes_symbol(&self, symbol: &str) -> bool {
        self.authorized_symbols.contains(symbol)
    }
}

/// The full set of grants a process was spawned with.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    grants: Vec<CapabilityGrant>,
}

impl CapabilitySet {
    /// An empty grant set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a grant.
    pub fn insert(&mut self, grant: CapabilityGrant) {
        self.grants.push(grant);
    }

    /// True if any grant in the set authorizes the given topic.
    #[must_use]
    pub fn authorizes_topic(&self, topic: &str) -> bool {
        self.grants.iter().any(|g| g.authorizes_topic(topic))
    }

    /// True if any grant in the set authorizes the given host-function
    /// symbol.
    #[must_use]
    pub fn authorizes_symbol(&self, symbol: &str) -> bool {
        self.grants.iter().any(|g| g.authorizes_symbol(symbol))
    }

    /// Spawn-time check (spec.md §4.9): every grant in `self` (the
    /// proposed child set) must also appear — by URN — in `parent`,
    /// unless the host explicitly grants escalation.
    #[must_use]
    pub fn is_subset_of(&self, parent: &Self) -> bool {
        self.grants
            .iter()
            .all(|child| parent.grants.iter().any(|p| p.urn == child.urn))
    }

    /// True if any `Pinned` grant in the set is present — used to reject
    /// granting it to a `Stateless` pooled module at load time
    /// (spec.md §4.6, Affinity).
    #[must_use]
    pub fn has_pinned_grant(&self) -> bool {
        self.grants.iter().any(|g| g.affinity == Affinity::Pinned)
    }

    /// Iterates the grants, for diagnostics and escalation review.
    pub fn iter(&self) -> impl Iterator<Item = &CapabilityGrant> {
        self.grants.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(urn: &str, affinity: Affinity, topic: &str) -> CapabilityGrant {
        CapabilityGrant::new(urn, affinity, [], [topic.to_string()])
    }

    #[test]
    fn authorizes_topic_checks_across_all_grants() {
        let mut set = CapabilitySet::new();
        set.insert(grant("urn:a", Affinity::Agnostic, "filament/kv/set"));
        assert!(set.authorizes_topic("filament/kv/set"));
        assert!(!set.authorizes_topic("filament/fs/read"));
    }

    #[test]
    fn child_subset_check_passes_when_every_urn_is_in_parent() {
        let mut parent = CapabilitySet::new();
        parent.insert(grant("urn:a", Affinity::Agnostic, "t"));
        parent.insert(grant("urn:b", Affinity::Agnostic, "t"));
        let mut child = CapabilitySet::new();
        child.insert(grant("urn:a", Affinity::Agnostic, "t"));
        assert!(child.is_subset_of(&parent));

        child.insert(grant("urn:c", Affinity::Agnostic, "t"));
        assert!(!child.is_subset_of(&parent));
    }

    #[test]
    fn pinned_grant_is_detected() {
        let mut set = CapabilitySet::new();
        set.insert(grant("urn:a", Affinity::Pinned, "t"));
        assert!(set.has_pinned_grant());
    }
}
