//! Core scalar types shared across the kernel.
//!
//! - [`id`]: identifiers (`ProcessId`, `BlobHandle`, `ChannelId`, `Tick`, `VirtualTime`)
//! - This module: execution context, pooling/affinity flags, scheduling
//!   policy, and resource limits.

pub mod id;

pub use id::{BlobHandle, ChannelId, EventSeq, IdSource, ProcessId, Tick, VirtualTime};

use serde::{Deserialize, Serialize};

/// Execution context tag for a module instance (spec.md §3, Module instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionContext {
    /// Sandboxed, deterministic, instruction-metered. Linear memory and
    /// globals reset every Weave; all entropy derives from `rand_seed`.
    Logic,
    /// Trusted kernel-adjacent code. May not call the host heap on the
    /// hot path; allocations come from pre-reserved pools.
    System,
    /// Host-managed native code with relaxed determinism requirements.
    Managed,
}

/// Whether a module instance may be pooled across processes (Stateless)
/// or demands a persistent instance tied to one process (Stateful).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PoolingMode {
    /// Instance state (`user_data`, linear memory) persists across Weaves.
    Stateful,
    /// `user_data` is zeroed every Weave; may be drawn from a shared pool.
    Stateless,
}

/// Capability affinity: whether a capability may be used by pooled
/// Stateless instances (Agnostic) or demands a persistent instance (Pinned).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Affinity {
    /// Usable by Stateless or Stateful instances.
    Agnostic,
    /// Usable only by a Stateful (persistent) instance.
    Pinned,
}

/// Process scheduling policy (spec.md §4.9, §5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedulingPolicy {
    /// Participates in the scheduler's global Weave barrier.
    Shared,
    /// Runs on its own worker; never blocks the global cycle.
    Dedicated,
}

/// Outcome of a module's `weave` call (spec.md §4.7, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeaveOutcome {
    /// Module committed and wishes to sleep.
    Park,
    /// Module committed and wants immediate rescheduling.
    Yield,
    /// Module aborted the Weave; all tentative state rolls back.
    Abort,
}

impl WeaveOutcome {
    /// Decodes the ABI `i64` return value of `weave`.
    #[must_use]
    pub const fn from_abi(code: i64) -> Self {
        match code {
            0 => Self::Park,
            1 => Self::Yield,
            _ => Self::Abort,
        }
    }

    /// Encodes back to the ABI `i64` return value.
    #[must_use]
    pub const fn to_abi(self) -> i64 {
        match self {
            Self::Park => 0,
            Self::Yield => 1,
            Self::Abort => -1,
        }
    }
}

/// Per-process resource limits (`FilamentResourceLimits`, 24 bytes in the ABI).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Maximum resident memory in bytes, including blobs and channels.
    pub mem_max: u64,
    /// Maximum compute units spendable in a single Weave.
    pub compute_max: u64,
    /// Maximum wall-time budget for a single Weave, in nanoseconds.
    pub time_budget_nanos: u64,
}

impl ResourceLimits {
    /// Limits with no practical ceiling, used for root/test processes.
    #[must_use]
    pub const fn unbounded() -> Self {
        Self {
            mem_max: u64::MAX,
            compute_max: u64::MAX,
            time_budget_nanos: u64::MAX,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weave_outcome_abi_roundtrip() {
        assert_eq!(WeaveOutcome::from_abi(0), WeaveOutcome::Park);
        assert_eq!(WeaveOutcome::from_abi(1), WeaveOutcome::Yield);
        assert_eq!(WeaveOutcome::from_abi(-5), WeaveOutcome::Abort);
        assert_eq!(WeaveOutcome::Park.to_abi(), 0);
        assert_eq!(WeaveOutcome::Yield.to_abi(), 1);
        assert_eq!(WeaveOutcome::Abort.to_abi(), -1);
    }
}
