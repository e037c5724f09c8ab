//! Capability-gated event router (spec.md §4.6).
//!
//! Every outbound event a module emits is checked against the grant set
//! its process was spawned with; unauthorized emission aborts the
//! Weave with `ERR_PERM`. Inbound host-originated events are dispatched
//! through the same router so kernel-handled "special topics" (timers,
//! kv, fs, http, panic) get consistent treatment.

pub mod grant;
pub mod router;

pub use grant::{CapabilityGrant, CapabilitySet};
pub use router::{CapabilityRouter, InboundEvent, SpecialTopic, WakeFlags};
