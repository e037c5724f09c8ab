//! ABI argument blocks passed across the module boundary (spec.md §6).
//!
//! The spec's byte-exact sizes (`FilamentHostInfo`=48,
//! `FilamentModuleInfo`=56, `FilamentWeaveArgs`=128, …) bind a real
//! sandboxed memory marshaler — the job of a concrete `Engine`
//! (WASM/native), which is an external collaborator out of scope here
//! (spec.md §1). These structs carry the same fields as native Rust
//! types; a real engine's marshaling layer packs them to the wire
//! layout when crossing into guest memory.

use crate::capability::CapabilitySet;
use crate::security::Digest;
use crate::timeline::TraceContext;
use crate::types::{ExecutionContext, PoolingMode, ResourceLimits, SchedulingPolicy, VirtualTime};
use crate::value::Value;

/// Module ABI magic number (spec.md §6).
pub const MAGIC: u32 = 0x9D2F_8A41;

/// Kernel-to-module handshake info, returned by `get_info`.
#[derive(Debug, Clone)]
pub struct HostInfo {
    /// Kernel ABI version.
    pub kernel_version: u32,
    /// Capability URNs the host is offering for this instance.
    pub offered_capabilities: Vec<String>,
}

/// A loaded module's declared requirements, returned by `get_info`.
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    /// Must equal [`MAGIC`].
    pub magic: u32,
    /// Declared ABI version; checked for kernel compatibility.
    pub abi_version: u32,
    /// Declared linear-memory requirement, checked against the
    /// context's memory limit before `reserve` is called.
    pub declared_mem_bytes: u64,
}

impl ModuleInfo {
    /// Checks `magic`/`abi_version` and the declared memory requirement
    /// against the context's limit (spec.md §4.7, step 1).
    #[must_use]
    pub fn is_compatible(&self, kernel_version: u32, mem_limit: u64) -> bool {
        self.magic == MAGIC
            && self.abi_version == kernel_version
            && self.declared_mem_bytes <= mem_limit
    }
}

/// The argument block delivered to a module's `weave` entry point on
/// every invocation (spec.md §4.7).
#[derive(Debug, Clone)]
pub struct WeaveArgs {
    /// Thread-local context handle; never crosses threads.
    pub ctx: u64,
    /// Remaining wall-time budget for this Weave, in nanoseconds.
    pub time_budget_nanos: u64,
    /// Compute units consumed so far.
    pub compute_used: u64,
    /// Compute unit ceiling for this Weave.
    pub compute_max: u64,
    /// Memory cap in bytes.
    pub mem_cap: u64,
    /// Cryptographically-derived random seed (Logic context determinism).
    pub rand_seed: u64,
    /// Current virtual time.
    pub virt_time: VirtualTime,
    /// W3C-style trace context.
    pub trace: TraceContext,
    /// Virtual-time delta since this instance's previous Weave.
    pub delta_since_last_tick: u64,
    /// Monotonic tick counter for this process.
    pub tick: u64,
    /// Wake-reason bitmap (spec.md §4.6, `WakeFlags`).
    pub wake_flags: u32,
    /// Preserved scalar; zero for Stateless contexts or `WAKE_INIT`.
    pub user_data: u64,
}

/// A channel's declaration at spawn time (spec.md §6,
/// `FilamentChannelDefinition`).
#[derive(Debug, Clone)]
pub struct ChannelDefinition {
    /// Internal topic name bound to this channel.
    pub topic: String,
    /// Declared schema URI, compared byte-wise at spawn.
    pub schema_uri: String,
    /// Declared root value type tag.
    pub root_tag: u32,
    /// Ring capacity (slot count).
    pub capacity: usize,
    /// Fixed per-slot byte budget.
    pub msg_size: usize,
}

/// A module's declaration within a process's pipeline (spec.md §6,
/// `FilamentModuleDefinition`).
#[derive(Debug, Clone)]
pub struct ModuleDefinition {
    /// Human-readable module name, used as the alias within the process.
    pub name: String,
    /// Raw content bytes of the module image.
    pub bytes: Vec<u8>,
    /// Digest declared in the manifest; checked against a freshly
    /// computed digest of `bytes` at spawn (spec.md §4.9).
    pub declared_digest: Digest,
    /// Per-instance memory cap.
    pub mem_cap: u64,
    /// Stateful/Stateless pooling mode.
    pub pooling: PoolingMode,
    /// Logic/System/Managed execution context.
    pub context: ExecutionContext,
}

/// Arguments to `process_spawn` (spec.md §6, `FilamentProcessSpawnArgs`).
#[derive(Debug, Clone)]
pub struct ProcessSpawnArgs {
    /// Ordered module pipeline.
    pub pipeline: Vec<ModuleDefinition>,
    /// Channel bindings declared for this process.
    pub channels: Vec<ChannelDefinition>,
    /// Resource limits requested for the child.
    pub limits: ResourceLimits,
    /// Capability grants requested for the child; validated as a
    /// subset of the parent's at spawn time.
    pub capabilities: CapabilitySet,
    /// Shared-barrier vs. dedicated-worker scheduling.
    pub scheduling: SchedulingPolicy,
    /// Arguments passed to the module's `init` upcall.
    pub init_args: Value,
}
