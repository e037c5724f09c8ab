//! Per-process resource accounting: compute units, memory, and
//! wall-time spent against a Weave's limits (spec.md §4.8 phase 3,
//! §5.3).
//!
//! A process's `weave` calls are serialized (spec.md §5, "Thread
//! safety"), so this ledger uses plain counters rather than the
//! atomic-per-kind counters a concurrently-shared accountant would
//! need — reserve/commit/release semantics are carried over, the
//! concurrency primitive is not.

use crate::error::{Error, Result};
use crate::types::ResourceLimits;
use std::time::Duration;

/// Tracks one Weave's resource consumption against its process's
/// limits. Reset at the start of every Weave.
#[derive(Debug, Clone, Copy)]
pub struct ResourceAccount {
    limits: ResourceLimits,
    compute_used: u64,
    mem_used: u64,
    time_used_nanos: u64,
}

impl ResourceAccount {
    /// Creates a fresh ledger bound to `limits`.
    #[must_use]
    pub const fn new(limits: ResourceLimits) -> Self {
        Self { limits, compute_used: 0, mem_used: 0, time_used_nanos: 0 }
    }

    /// Resets usage counters for a new Weave; limits are unchanged.
    pub fn begin_weave(&mut self) {
        self.compute_used = 0;
        self.mem_used = 0;
        self.time_used_nanos = 0;
    }

    /// Charges `units` of compute against `compute_max`. Returns
    /// `ERR_TIMEOUT` on overflow, matching the spec's "resource watch"
    /// phase treating compute overrun and time overrun identically.
    pub fn charge_compute(&mut self, units: u64) -> Result<()> {
        let next = self.compute_used.saturating_add(units);
        if next > self.limits.compute_max {
            return Err(Error::timeout("compute budget exceeded"));
        }
        self.compute_used = next;
        Ok(())
    }

    /// Charges `bytes` of memory against `mem_max`. Returns `ERR_OOM`
    /// on overflow.
    pub fn charge_memory(&mut self, bytes: u64) -> Result<()> {
        let next = self.mem_used.saturating_add(bytes);
        if next > self.limits.mem_max {
            return Err(Error::oom("memory budget exceeded"));
        }
        self.mem_used = next;
        Ok(())
    }

    /// Releases previously-charged memory, e.g. on blob release.
    pub fn release_memory(&mut self, bytes: u64) {
        self.mem_used = self.mem_used.saturating_sub(bytes);
    }

    /// Charges elapsed wall time against the per-Weave time budget.
    /// Returns `ERR_TIMEOUT` on overflow.
    pub fn charge_time(&mut self, elapsed: Duration) -> Result<()> {
        let elapsed_nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        let next = self.time_used_nanos.saturating_add(elapsed_nanos);
        if next > self.limits.time_budget_nanos {
            return Err(Error::timeout("time budget exceeded"));
        }
        self.time_used_nanos = next;
        Ok(())
    }

    /// Compute units consumed so far this Weave.
    #[must_use]
    pub const fn compute_used(&self) -> u64 {
        self.compute_used
    }

    /// Memory bytes currently charged.
    #[must_use]
    pub const fn mem_used(&self) -> u64 {
        self.mem_used
    }

    /// This ledger's configured limits.
    #[must_use]
    pub const fn limits(&self) -> ResourceLimits {
        self.limits
    }
}
