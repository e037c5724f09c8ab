//! The Weave transaction cycle (spec.md §4.8): Ingress, Execute,
//! Resource watch, Commit, Discard.

use crate::capability::{CapabilityRouter, WakeFlags};
use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::memory::{BlobRetentionJournal, BlobTable};
use crate::module_runtime::{Engine, WeaveArgs};
use crate::process::Process;
use crate::timeline::TraceContext;
use crate::types::{ChannelId, ExecutionContext, Tick, VirtualTime, WeaveOutcome};
use std::collections::HashMap;
use std::time::Instant;

/// Per-module result recorded for one Weave, in pipeline order.
#[derive(Debug, Clone)]
pub struct ModuleResult {
    /// The module's alias within the pipeline.
    pub alias: String,
    /// What it returned.
    pub outcome: WeaveOutcome,
}

/// The outcome of one full Weave cycle.
#[derive(Debug, Clone)]
pub struct WeaveReport {
    /// `Some` iff the cycle committed; the tick assigned to the first
    /// event appended (processes typically append at most one event per
    /// static topic per Weave, so downstream events share the cycle but
    /// not necessarily this exact tick).
    pub tick: Option<Tick>,
    /// True if the cycle committed; false if it was discarded.
    pub committed: bool,
    /// Every module's outcome, in pipeline order.
    pub results: Vec<ModuleResult>,
}

/// Parameters that vary per Weave but are not part of `Process` state.
pub struct WeaveClock {
    /// Current virtual time.
    pub virt_time: VirtualTime,
    /// Informational wall-clock timestamp.
    pub wall_ts_nanos: u64,
    /// Deterministic per-cycle random seed (spec.md §7).
    pub rand_seed: u64,
    /// Virtual-time delta since the process's previous Weave.
    pub delta_since_last_tick: u64,
    /// Why this process woke up.
    pub wake: WakeFlags,
    /// Trace context to stamp on every event this cycle commits.
    pub trace: TraceContext,
}

/// Runs one Weave cycle against `process`'s pipeline.
///
/// `channels` is the kernel-wide channel table; only channels this
/// process has a binding for are ever touched. Blob capability host
/// calls (`retain`/`release`) are expected to populate a
/// [`BlobRetentionJournal`] during Execute via the capability router;
/// this crate's in-process test engine has no such host calls wired up,
/// so the journal is empty unless a caller pre-populates one through
/// `run_weave_with_journal`.
pub fn run_weave(
    process: &mut Process,
    engine: &dyn Engine,
    blobs: &mut BlobTable,
    channels: &HashMap<ChannelId, Channel>,
    router: &CapabilityRouter,
    clock: WeaveClock,
) -> Result<WeaveReport> {
    run_weave_with_journal(process, engine, blobs, channels, router, clock, BlobRetentionJournal::new())
}

/// As [`run_weave`], but takes an already-populated blob retention
/// journal — used by callers (e.g. the KV or filesystem host handlers)
/// that perform `retain`/`release` calls before the commit phase runs.
pub fn run_weave_with_journal(
    process: &mut Process,
    engine: &dyn Engine,
    blobs: &mut BlobTable,
    channels: &HashMap<ChannelId, Channel>,
    router: &CapabilityRouter,
    clock: WeaveClock,
    journal: BlobRetentionJournal,
) -> Result<WeaveReport> {
    // --- Ingress ---
    // Pending kv/staging writes are not cleared here: by construction
    // they are already empty at this point (the previous Weave's
    // commit drained them or its discard cleared them explicitly).
    process.staging_mut().begin_weave();
    process.resource_account().begin_weave();

    // Logic modules get their linear memory and globals reset to the
    // post-`init` snapshot at the start of every Weave (spec.md §4.7);
    // System/Managed instances keep running state across cycles.
    for instance in process.pipeline().iter() {
        if instance.context() == ExecutionContext::Logic {
            engine.reset_memory(instance.engine_instance())?;
        }
    }

    // --- Execute ---
    let mut results = Vec::new();
    let mut aborted = false;
    let pipeline_len = process.pipeline().len();
    for idx in 0..pipeline_len {
        if aborted {
            break;
        }
        let started = Instant::now();
        let alias = process.pipeline()[idx].alias().to_owned();
        let mut args = WeaveArgs {
            ctx: 0,
            time_budget_nanos: process.resource_account().limits().time_budget_nanos,
            compute_used: process.resource_account().compute_used(),
            compute_max: process.resource_account().limits().compute_max,
            mem_cap: process.resource_account().limits().mem_max,
            rand_seed: clock.rand_seed,
            virt_time: clock.virt_time,
            trace: clock.trace,
            delta_since_last_tick: clock.delta_since_last_tick,
            tick: 0,
            wake_flags: clock.wake.bits(),
            user_data: 0,
        };

        let outcome = process.pipeline()[idx].weave(engine, &mut args)?;
        if matches!(outcome, WeaveOutcome::Abort) {
            aborted = true;
        }
        results.push(ModuleResult { alias, outcome });

        let overrun = process
            .resource_account()
            .charge_compute(1)
            .and_then(|()| process.resource_account().charge_time(started.elapsed()));
        if let Err(err) = overrun {
            // Resource watch overrun terminates the active module and
            // discards the cycle (spec.md §4.8 phase 3, §4.7): a buffered
            // kv/staging write from this or an earlier module in the
            // pipeline must not leak into a later, unrelated Weave.
            process.pipeline()[idx].mark_faulted();
            journal.discard();
            process.kv_mut().discard();
            process.staging_mut().discard();
            return Err(err);
        }
    }

    if aborted {
        // --- Discard ---
        journal.discard();
        process.kv_mut().discard();
        process.staging_mut().discard();
        return Ok(WeaveReport { tick: None, committed: false, results });
    }

    // --- Commit ---
    let mut first_tick = None;
    for topic in process.staging_mut().pending_topics() {
        let values = process.staging_mut().drain_topic(&topic);
        for value in values {
            let tick =
                process.timeline_mut().append(topic.clone(), value.clone(), clock.virt_time, clock.wall_ts_nanos, clock.trace);
            first_tick.get_or_insert(tick);

            if let Some(uri) = process.resolve_binding(&topic) {
                if router.authorize_outbound(process.capabilities(), &topic).is_ok() {
                    if let Some(channel) = channels.values().find(|c| c.uri() == uri) {
                        let _ = channel.write(value, blobs);
                    }
                }
            }
        }
    }
    let mut quota = process.mem_quota_remaining();
    journal.commit(blobs, &mut quota);
    *process.mem_quota_remaining_mut() = quota;
    process.kv_mut().commit();

    Ok(WeaveReport { tick: first_tick, committed: true, results })
}

/// Convenience for a host handler rejecting a call outright, e.g. an
/// unauthorized outbound publish (spec.md §4.6).
pub fn reject_unauthorized(topic: &str) -> Error {
    Error::perm(format!("no capability grant authorizes publishing to '{topic}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CapabilitySet;
    use crate::module_runtime::{EngineInstance, ModuleInstance, TestEngine};
    use crate::security::Digest;
    use crate::timeline::{StrictPolicy, Timeline};
    use crate::types::{ExecutionContext, PoolingMode, ProcessId, ResourceLimits, SchedulingPolicy};
    use crate::value::Value;

    fn engine_ready(engine: &TestEngine, code: i64) -> EngineInstance {
        let digest = Digest::compute(b"m");
        let image = engine.load(b"m", digest).unwrap();
        let instance = engine.instantiate(&image, 4096).unwrap();
        engine.register_entry(instance, "weave", move |_c, _a| code);
        instance
    }

    fn clock() -> WeaveClock {
        WeaveClock {
            virt_time: VirtualTime::ZERO,
            wall_ts_nanos: 0,
            rand_seed: 0,
            delta_since_last_tick: 0,
            wake: WakeFlags::NONE,
            trace: TraceContext::default(),
        }
    }

    fn process() -> Process {
        Process::new(
            ProcessId::from_raw(1),
            None,
            ResourceLimits::unbounded(),
            CapabilitySet::new(),
            Timeline::new(Box::new(StrictPolicy)),
            SchedulingPolicy::Shared,
            std::sync::Arc::new(crate::util::OsEntropy),
        )
    }

    #[test]
    fn successful_weave_commits_staged_writes() {
        let engine = TestEngine::new();
        let eng_instance = engine_ready(&engine, 0);
        let mut instance =
            ModuleInstance::new("m".into(), eng_instance, ExecutionContext::Logic, PoolingMode::Stateless);
        instance.handshake(
            &crate::module_runtime::ModuleInfo { magic: crate::module_runtime::MAGIC, abi_version: 1, declared_mem_bytes: 0 },
            1,
            u64::MAX,
        ).unwrap();
        instance.init(&engine, 0, 0).unwrap();

        let mut process = process();
        process.staging_mut().write("out", Value::U64(42));
        process.push_module(instance);

        let channels = HashMap::new();
        let router = CapabilityRouter;
        let report = run_weave(&mut process, &engine, &mut BlobTable::default(), &channels, &router, clock()).unwrap();

        assert!(report.committed);
        assert!(report.tick.is_some());
        assert_eq!(process.timeline().len(), 1);
    }

    #[test]
    fn abort_discards_and_reports_no_tick() {
        let engine = TestEngine::new();
        let eng_instance = engine_ready(&engine, -1);
        let mut instance =
            ModuleInstance::new("m".into(), eng_instance, ExecutionContext::Logic, PoolingMode::Stateless);
        instance.handshake(
            &crate::module_runtime::ModuleInfo { magic: crate::module_runtime::MAGIC, abi_version: 1, declared_mem_bytes: 0 },
            1,
            u64::MAX,
        ).unwrap();
        instance.init(&engine, 0, 0).unwrap();

        let mut process = process();
        process.staging_mut().write("out", Value::U64(1));
        process.push_module(instance);

        let channels = HashMap::new();
        let router = CapabilityRouter;
        let report = run_weave(&mut process, &engine, &mut BlobTable::default(), &channels, &router, clock()).unwrap();

        assert!(!report.committed);
        assert!(report.tick.is_none());
        assert!(process.timeline().is_empty());
    }

    #[test]
    fn resource_overrun_surfaces_as_error() {
        let engine = TestEngine::new();
        let eng_instance = engine_ready(&engine, 0);
        let mut instance =
            ModuleInstance::new("m".into(), eng_instance, ExecutionContext::Logic, PoolingMode::Stateless);
        instance.handshake(
            &crate::module_runtime::ModuleInfo { magic: crate::module_runtime::MAGIC, abi_version: 1, declared_mem_bytes: 0 },
            1,
            u64::MAX,
        ).unwrap();
        instance.init(&engine, 0, 0).unwrap();

        let limits = ResourceLimits { compute_max: 0, ..ResourceLimits::unbounded() };
        let mut process = Process::new(
            ProcessId::from_raw(1),
            None,
            limits,
            CapabilitySet::new(),
            Timeline::new(Box::new(StrictPolicy)),
            SchedulingPolicy::Shared,
            std::sync::Arc::new(crate::util::OsEntropy),
        );
        process.push_module(instance);
        process.kv_mut().set("x", Value::U64(1));
        process.staging_mut().write("out", Value::U64(1));

        let channels = HashMap::new();
        let router = CapabilityRouter;
        let err = run_weave(&mut process, &engine, &mut BlobTable::default(), &channels, &router, clock()).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Timeout);

        assert_eq!(
            process.kv().get("x"),
            None,
            "a kv write buffered before the overrun must not leak into a later Weave"
        );
        assert!(
            process.staging_mut().pending_topics().is_empty(),
            "a staging write buffered before the overrun must not leak into a later Weave"
        );
        assert_eq!(
            process.pipeline()[0].state(),
            crate::module_runtime::InstanceState::Faulted,
            "the overrunning module must be terminated"
        );
    }
}
