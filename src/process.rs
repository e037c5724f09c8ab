//! Process identity, pipeline, and lifecycle bookkeeping (spec.md §3
//! "Process", §4.9).

use crate::capability::CapabilitySet;
use crate::kv::KvStore;
use crate::module_runtime::ModuleInstance;
use crate::resource::ResourceAccount;
use crate::staging::StagingArea;
use crate::timeline::Timeline;
use crate::types::{ChannelId, ProcessId, ResourceLimits, SchedulingPolicy};
use crate::util::EntropySource;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// A process's lifecycle stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// Spawned but `init` has not completed.
    Initializing,
    /// Runs Weaves normally.
    Running,
    /// A module faulted or a `core/panic` event was received; no
    /// further Weaves execute until terminated.
    Faulted,
    /// Torn down; resources released.
    Terminated,
}

/// A live process: identity, pipeline, bindings, and every piece of
/// per-process state a Weave touches (spec.md §3).
pub struct Process {
    id: ProcessId,
    parent: Option<ProcessId>,
    children: Vec<ProcessId>,
    pipeline: Vec<ModuleInstance>,
    /// Internal topic name → external channel URI.
    bindings: HashMap<String, String>,
    owned_channels: HashSet<ChannelId>,
    capabilities: CapabilitySet,
    resource_account: ResourceAccount,
    /// Remaining memory quota in bytes, distinct from the Weave-scoped
    /// `ResourceAccount`, which tracks usage *within* the current Weave.
    mem_quota_remaining: u64,
    timeline: Timeline,
    staging: StagingArea,
    kv: KvStore,
    scheduling: SchedulingPolicy,
    state: ProcessState,
    entropy: Arc<dyn EntropySource>,
    /// True until this process's first post-init Weave has run; that
    /// call is flagged `WAKE_INIT` (spec.md §4.7).
    awaiting_first_weave: bool,
}

impl Process {
    /// Constructs a freshly spawned process, quota already deducted
    /// from the parent by the caller (spec.md §4.9).
    #[must_use]
    pub fn new(
        id: ProcessId,
        parent: Option<ProcessId>,
        limits: ResourceLimits,
        capabilities: CapabilitySet,
        timeline: Timeline,
        scheduling: SchedulingPolicy,
        entropy: Arc<dyn EntropySource>,
    ) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            pipeline: Vec::new(),
            bindings: HashMap::new(),
            owned_channels: HashSet::new(),
            capabilities,
            mem_quota_remaining: limits.mem_max,
            resource_account: ResourceAccount::new(limits),
            timeline,
            staging: StagingArea::new(0),
            kv: KvStore::new(),
            scheduling,
            state: ProcessState::Initializing,
            entropy,
            awaiting_first_weave: true,
        }
    }

    /// Stable identity.
    #[must_use]
    pub const fn id(&self) -> ProcessId {
        self.id
    }

    /// Parent process, if any (root processes have none).
    #[must_use]
    pub const fn parent(&self) -> Option<ProcessId> {
        self.parent
    }

    /// Child process ids, in spawn order.
    #[must_use]
    pub fn children(&self) -> &[ProcessId] {
        &self.children
    }

    /// Records a newly spawned child.
    pub fn add_child(&mut self, child: ProcessId) {
        self.children.push(child);
    }

    /// Removes a terminated child from the tracked set.
    pub fn remove_child(&mut self, child: ProcessId) {
        self.children.retain(|c| *c != child);
    }

    /// Appends a module to the pipeline, in execution order
    /// (spec.md §4.8, "Execute").
    pub fn push_module(&mut self, instance: ModuleInstance) {
        self.pipeline.push(instance);
    }

    /// The pipeline, in execution order.
    pub fn pipeline(&mut self) -> &mut [ModuleInstance] {
        &mut self.pipeline
    }

    /// Binds an internal topic name to an external channel URI.
    pub fn bind_channel(&mut self, internal_topic: impl Into<String>, channel_uri: impl Into<String>) {
        self.bindings.insert(internal_topic.into(), channel_uri.into());
    }

    /// The external channel URI bound to an internal topic, if any.
    #[must_use]
    pub fn resolve_binding(&self, internal_topic: &str) -> Option<&str> {
        self.bindings.get(internal_topic).map(String::as_str)
    }

    /// Registers a channel this process owns, for cascading
    /// destruction on termination (spec.md §4.9).
    pub fn own_channel(&mut self, channel: ChannelId) {
        self.owned_channels.insert(channel);
    }

    /// Every channel id this process owns.
    #[must_use]
    pub fn owned_channels(&self) -> impl Iterator<Item = &ChannelId> {
        self.owned_channels.iter()
    }

    /// This process's capability grant set.
    #[must_use]
    pub const fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Mutable access to the per-Weave resource ledger.
    pub const fn resource_account(&mut self) -> &mut ResourceAccount {
        &mut self.resource_account
    }

    /// Remaining memory quota available for blob allocation.
    #[must_use]
    pub const fn mem_quota_remaining(&self) -> u64 {
        self.mem_quota_remaining
    }

    /// Mutable handle to the quota counter, passed to blob/channel
    /// allocation calls that deduct or credit it directly.
    pub const fn mem_quota_remaining_mut(&mut self) -> &mut u64 {
        &mut self.mem_quota_remaining
    }

    /// This process's committed event log.
    #[must_use]
    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Mutable access to the timeline, for the Weave commit phase.
    pub const fn timeline_mut(&mut self) -> &mut Timeline {
        &mut self.timeline
    }

    /// This process's per-Weave staging area.
    pub const fn staging_mut(&mut self) -> &mut StagingArea {
        &mut self.staging
    }

    /// This process's key/value store.
    pub const fn kv_mut(&mut self) -> &mut KvStore {
        &mut self.kv
    }

    /// This process's deterministic entropy stream, forked from its
    /// parent's (or the kernel's root, for a root process) at spawn
    /// time (spec.md §4.7).
    #[must_use]
    pub fn entropy(&self) -> &Arc<dyn EntropySource> {
        &self.entropy
    }

    /// Read-only access to the key/value store.
    #[must_use]
    pub const fn kv(&self) -> &KvStore {
        &self.kv
    }

    /// Shared-barrier vs. dedicated-worker scheduling.
    #[must_use]
    pub const fn scheduling(&self) -> SchedulingPolicy {
        self.scheduling
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> ProcessState {
        self.state
    }

    /// Transitions to `Running` once `init` has succeeded for every
    /// pipeline module.
    pub fn mark_running(&mut self) {
        if self.state == ProcessState::Initializing {
            self.state = ProcessState::Running;
        }
    }

    /// Marks the process faulted. A `core/panic` event or a fatal
    /// module return both route here (spec.md §4.6, §7).
    pub fn mark_faulted(&mut self) {
        self.state = ProcessState::Faulted;
        for instance in &mut self.pipeline {
            instance.mark_faulted();
        }
    }

    /// Transitions to `Terminated`. The supervisor is responsible for
    /// destroying owned channels and crediting quota back to the
    /// parent before or after calling this.
    pub fn mark_terminated(&mut self) {
        self.state = ProcessState::Terminated;
    }

    /// True if this process can run another Weave.
    #[must_use]
    pub const fn is_runnable(&self) -> bool {
        matches!(self.state, ProcessState::Running)
    }

    /// True iff this process has not yet run its first Weave since
    /// `init`. Consumes the flag: the next call always returns `false`.
    #[must_use]
    pub fn consume_awaiting_first_weave(&mut self) -> bool {
        std::mem::take(&mut self.awaiting_first_weave)
    }

    /// Snapshots the channels this process currently owns, to drain
    /// and destroy during termination without holding a borrow on the
    /// process.
    #[must_use]
    pub fn take_owned_channels(&mut self) -> HashSet<ChannelId> {
        std::mem::take(&mut self.owned_channels)
    }
}
