//! The kernel: a single owning container for every process, channel,
//! blob, and timer (spec.md §9, "Design Notes" — "avoid ambient
//! singletons").

use crate::capability::{CapabilityRouter, WakeFlags};
use crate::channel::{Channel, Direction};
use crate::config::KernelConfig;
use crate::error::{Error, Result};
use crate::memory::{BlobTable, DmaRequest};
use crate::module_runtime::{Engine, ModuleInfo, ModuleInstance, ProcessSpawnArgs};
use crate::observability::{LogRecord, NoopSink, TelemetrySink};
use crate::process::Process;
use crate::supervisor;
use crate::timeline::{PrunablePolicy, RetentionPolicy, StrictPolicy, Timeline};
use crate::timer::TimerWheel;
use crate::types::{ChannelId, IdSource, PoolingMode, ProcessId, VirtualTime};
use crate::util::{DetEntropy, EntropySource, OsEntropy};
use crate::weave::{self, WeaveClock, WeaveReport};
use std::collections::HashMap;
use std::sync::Arc;

/// Every piece of kernel-owned state, wired together in one place so
/// operations take it by reference rather than reaching for statics.
pub struct Kernel {
    config: KernelConfig,
    processes: HashMap<ProcessId, Process>,
    channels: HashMap<ChannelId, Channel>,
    blobs: BlobTable,
    timers: TimerWheel,
    engine: Box<dyn Engine>,
    router: CapabilityRouter,
    telemetry: Box<dyn TelemetrySink>,
    process_ids: IdSource,
    channel_ids: IdSource,
    entropy: Arc<dyn EntropySource>,
}

impl Kernel {
    /// Builds a kernel around a concrete execution engine. Uses a
    /// discarding telemetry sink until [`Kernel::set_telemetry`] is
    /// called.
    #[must_use]
    pub fn new(config: KernelConfig, engine: Box<dyn Engine>) -> Self {
        let dma = if config.dma_available {
            crate::memory::blob::DmaAvailability::Available
        } else {
            crate::memory::blob::DmaAvailability::Unavailable
        };
        let entropy: Arc<dyn EntropySource> = match config.entropy_seed {
            Some(seed) => Arc::new(DetEntropy::new(seed)),
            None => Arc::new(OsEntropy),
        };
        Self {
            config,
            processes: HashMap::new(),
            channels: HashMap::new(),
            blobs: BlobTable::new(dma),
            timers: TimerWheel::new(),
            engine,
            router: CapabilityRouter::new(),
            telemetry: Box::new(NoopSink),
            process_ids: IdSource::new(),
            channel_ids: IdSource::new(),
            entropy,
        }
    }

    /// Swaps in a telemetry sink for `filament/core/log` forwarding.
    pub fn set_telemetry(&mut self, sink: Box<dyn TelemetrySink>) {
        self.telemetry = sink;
    }

    /// Forwards a log record to the configured sink (spec.md §4.6).
    pub fn emit_log(&self, record: &LogRecord) {
        self.telemetry.emit(record);
    }

    /// Read-only access to a process, for introspection.
    #[must_use]
    pub fn process(&self, id: ProcessId) -> Option<&Process> {
        self.processes.get(&id)
    }

    /// Read-only access to a channel, for introspection.
    #[must_use]
    pub fn channel(&self, id: ChannelId) -> Option<&Channel> {
        self.channels.get(&id)
    }

    /// Mutable access to a process. Host-call dispatch (staging writes,
    /// kv access) ultimately lands here once a concrete `Engine` wires
    /// its callback ABI through to the kernel; exposed now so the test
    /// engine's callers can stage effects a real engine would produce
    /// via a host call during Execute.
    pub fn process_mut(&mut self, id: ProcessId) -> Option<&mut Process> {
        self.processes.get_mut(&id)
    }

    /// This kernel's configuration.
    #[must_use]
    pub const fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Registers a one-shot virtual-time timer (`filament/time/set`).
    pub fn set_timer(&mut self, owner: ProcessId, target: VirtualTime) {
        self.timers.set(owner, target);
    }

    /// Pops every timer due at or before `now`.
    pub fn fire_due_timers(&mut self, now: VirtualTime) -> Vec<crate::timer::FiredTimer> {
        self.timers.fire_due(now)
    }

    /// Spawns a root process with no parent, skipping the capability
    /// subset and quota-deduction checks a child spawn requires.
    pub fn spawn_root(&mut self, args: ProcessSpawnArgs, policy: Box<dyn RetentionPolicy>) -> Result<ProcessId> {
        self.spawn_inner(None, args, policy)
    }

    /// Spawns `args` as a child of `parent` (spec.md §4.9).
    pub fn spawn_child(
        &mut self,
        parent: ProcessId,
        args: ProcessSpawnArgs,
        policy: Box<dyn RetentionPolicy>,
    ) -> Result<ProcessId> {
        {
            let parent_process = self
                .processes
                .get(&parent)
                .ok_or_else(|| Error::not_found("unknown parent process"))?;
            supervisor::validate_capability_subset(&args.capabilities, parent_process.capabilities())?;
        }
        let id = self.spawn_inner(Some(parent), args, policy)?;
        let parent_process = self.processes.get_mut(&parent).expect("parent just validated");
        parent_process.add_child(id);
        Ok(id)
    }

    fn spawn_inner(
        &mut self,
        parent: Option<ProcessId>,
        args: ProcessSpawnArgs,
        policy: Box<dyn RetentionPolicy>,
    ) -> Result<ProcessId> {
        supervisor::validate_pipeline_digests(&args.pipeline)?;

        if let Some(parent_id) = parent {
            let mut parent_quota = {
                let parent_process = self
                    .processes
                    .get(&parent_id)
                    .ok_or_else(|| Error::not_found("unknown parent process"))?;
                parent_process.mem_quota_remaining()
            };
            supervisor::deduct_quota(&mut parent_quota, args.limits.mem_max)?;
            *self
                .processes
                .get_mut(&parent_id)
                .expect("checked above")
                .mem_quota_remaining_mut() = parent_quota;
        }

        let id = ProcessId::from_raw(self.process_ids.next());
        let timeline = Timeline::new(policy);
        let entropy = match parent {
            Some(parent_id) => self
                .processes
                .get(&parent_id)
                .expect("checked above")
                .entropy()
                .fork(id),
            None => self.entropy.fork(id),
        };
        let mut process = Process::new(id, parent, args.limits, args.capabilities, timeline, args.scheduling, entropy);

        for channel_def in &args.channels {
            let channel_id = ChannelId::from_raw(self.channel_ids.next());
            let uri = format!("filament/channel/{}", channel_id.as_u64());
            let (channel, byte_budget) = Channel::create(
                channel_id,
                uri.clone(),
                channel_def.schema_uri.clone(),
                channel_def.root_tag,
                Direction::Duplex,
                id,
                channel_def.capacity,
                channel_def.msg_size,
            );
            let mut quota = process.mem_quota_remaining();
            if byte_budget > quota {
                return Err(Error::oom("channel allocation exceeds process memory quota"));
            }
            quota -= byte_budget;
            *process.mem_quota_remaining_mut() = quota;
            process.bind_channel(channel_def.topic.clone(), uri);
            process.own_channel(channel_id);
            self.channels.insert(channel_id, channel);
        }

        for module_def in &args.pipeline {
            let digest = module_def.declared_digest;
            let image = self.engine.load(&module_def.bytes, digest)?;
            let engine_instance = self.engine.instantiate(&image, module_def.mem_cap)?;
            let mut instance =
                ModuleInstance::new(module_def.name.clone(), engine_instance, module_def.context, module_def.pooling);
            let info = ModuleInfo {
                magic: crate::module_runtime::MAGIC,
                abi_version: self.config.kernel_version,
                declared_mem_bytes: module_def.mem_cap,
            };
            instance.handshake(&info, self.config.kernel_version, process.mem_quota_remaining())?;
            let init_seed = process.entropy().next_u64();
            instance.init(self.engine.as_ref(), init_seed, 0)?;
            process.push_module(instance);
        }

        process.mark_running();
        self.processes.insert(id, process);
        Ok(id)
    }

    /// Terminates `id` and every descendant, in post-order (spec.md
    /// §4.9, §8 scenario 4).
    pub fn terminate(&mut self, id: ProcessId) -> Result<()> {
        let order = supervisor::termination_order(id, &self.processes);
        for victim in order {
            let Some(mut process) = self.processes.remove(&victim) else { continue };
            let mut credit = 0u64;
            for channel_id in process.take_owned_channels() {
                if let Some(channel) = self.channels.remove(&channel_id) {
                    channel.destroy(&mut self.blobs, &mut credit);
                }
            }
            self.blobs.drop_ephemerals(victim, &mut credit);
            self.timers.cancel_owner(victim);
            process.mark_terminated();

            if let Some(parent_id) = process.parent() {
                if let Some(parent) = self.processes.get_mut(&parent_id) {
                    parent.remove_child(victim);
                    let existing = parent.mem_quota_remaining();
                    *parent.mem_quota_remaining_mut() = existing.saturating_add(credit);
                }
            }
        }
        Ok(())
    }

    /// Runs one Weave cycle against a single process.
    pub fn tick(&mut self, id: ProcessId, mut clock: WeaveClock) -> Result<WeaveReport> {
        let process = self
            .processes
            .get_mut(&id)
            .ok_or_else(|| Error::not_found("unknown process"))?;
        if process.consume_awaiting_first_weave() {
            clock.wake = clock.wake.with(WakeFlags::WAKE_INIT);
        }
        weave::run_weave(process, self.engine.as_ref(), &mut self.blobs, &self.channels, &self.router, clock)
    }

    /// A retention policy constructor for `Strict` timelines — the
    /// default for processes that don't request pruning or tombstoning.
    #[must_use]
    pub fn strict_policy() -> Box<dyn RetentionPolicy> {
        Box::new(StrictPolicy)
    }

    /// A retention policy constructor for `Prunable` timelines.
    #[must_use]
    pub fn prunable_policy() -> Box<dyn RetentionPolicy> {
        Box::new(PrunablePolicy)
    }

    /// `blob_alloc` host call: allocates against `owner`'s quota.
    pub fn blob_alloc(&mut self, owner: ProcessId, size: usize, dma: DmaRequest) -> Result<crate::types::BlobHandle> {
        let process = self
            .processes
            .get_mut(&owner)
            .ok_or_else(|| Error::not_found("unknown process"))?;
        let mut quota = process.mem_quota_remaining();
        let handle = self.blobs.alloc(owner, size, dma, &mut quota)?;
        *process.mem_quota_remaining_mut() = quota;
        Ok(handle)
    }
}
