//! Kernel-wide configuration (ambient stack: spec.md's distillation
//! leaves this implicit, but every host needs a place to set default
//! resource limits, the DMA availability posture, and the kernel ABI
//! version new processes are checked against).

use crate::memory::DmaRequest;
use crate::types::ResourceLimits;
use serde::{Deserialize, Serialize};

/// Default compute unit ceiling for a process that doesn't request one.
pub const DEFAULT_COMPUTE_MAX: u64 = 1_000_000;
/// Default memory ceiling in bytes.
pub const DEFAULT_MEM_MAX: u64 = 64 * 1024 * 1024;
/// Default per-Weave wall-time budget in nanoseconds (10ms).
pub const DEFAULT_TIME_BUDGET_NANOS: u64 = 10_000_000;

/// Host-wide settings, loaded once at kernel construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KernelConfig {
    /// ABI version this kernel build implements; modules must match it
    /// exactly at `get_info` (spec.md §4.7).
    pub kernel_version: u32,
    /// Resource limits handed to a root process that doesn't request
    /// its own.
    pub default_limits: ResourceLimits,
    /// Whether this host exposes a DMA-capable memory pool.
    pub dma_available: bool,
    /// Maximum process tree depth, guarding against runaway `spawn`
    /// recursion.
    pub max_process_depth: u32,
    /// Seeds the kernel's root deterministic entropy source when set;
    /// every process's module-init entropy stream forks from it, so a
    /// fixed seed reproduces identical init-time randomness across runs
    /// (spec.md §4.7). `None` uses OS entropy, the right default for a
    /// live host that doesn't need bit-identical spawns.
    pub entropy_seed: Option<u64>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            kernel_version: 1,
            default_limits: ResourceLimits {
                mem_max: DEFAULT_MEM_MAX,
                compute_max: DEFAULT_COMPUTE_MAX,
                time_budget_nanos: DEFAULT_TIME_BUDGET_NANOS,
            },
            dma_available: true,
            max_process_depth: 64,
            entropy_seed: None,
        }
    }
}

impl KernelConfig {
    /// Builder-style override of the default resource limits.
    #[must_use]
    pub const fn with_default_limits(mut self, limits: ResourceLimits) -> Self {
        self.default_limits = limits;
        self
    }

    /// Builder-style override of DMA availability.
    #[must_use]
    pub const fn with_dma_available(mut self, available: bool) -> Self {
        self.dma_available = available;
        self
    }

    /// Builder-style override pinning the root entropy seed, for
    /// reproducible test runs.
    #[must_use]
    pub const fn with_entropy_seed(mut self, seed: u64) -> Self {
        self.entropy_seed = Some(seed);
        self
    }

    /// A blob allocation request this host can always satisfy: DMA
    /// never `required` when the host declares it unavailable.
    #[must_use]
    pub const fn dma_request(&self, required: bool, optional: bool) -> DmaRequest {
        DmaRequest { required, optional }
    }
}

/// Parses a [`KernelConfig`] from a TOML document. Gated behind
/// `config-file` so the bare-metal build doesn't pull in a TOML parser
/// it never uses.
#[cfg(feature = "config-file")]
pub fn from_toml_str(text: &str) -> Result<KernelConfig, crate::error::Error> {
    toml::from_str(text).map_err(|e| crate::error::Error::invalid(e.to_string()))
}
