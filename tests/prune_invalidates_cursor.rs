//! Scenario: prune invalidates an open cursor (spec.md §8, scenario 5).
//!
//! A cursor opened against a Prunable timeline observes `ERR_NOT_FOUND`
//! on its next `next()` call once the watermark advances past the tick
//! it was positioned at.

use filament::capability::CapabilitySet;
use filament::config::KernelConfig;
use filament::kernel::Kernel;
use filament::module_runtime::{Engine, ModuleDefinition, ProcessSpawnArgs, TestEngine};
use filament::security::Digest;
use filament::types::{ExecutionContext, PoolingMode, ResourceLimits, SchedulingPolicy, Tick};
use filament::value::Value;

struct ArcEngine(std::sync::Arc<TestEngine>);

impl Engine for ArcEngine {
    fn load(&self, bytes: &[u8], digest: Digest) -> filament::Result<filament::module_runtime::ModuleImage> {
        self.0.load(bytes, digest)
    }
    fn instantiate(
        &self,
        image: &filament::module_runtime::ModuleImage,
        mem_cap: u64,
    ) -> filament::Result<filament::module_runtime::EngineInstance> {
        self.0.instantiate(image, mem_cap)
    }
    fn call(
        &self,
        instance: filament::module_runtime::EngineInstance,
        entry: &str,
        ctx: u64,
        args_ptr: u64,
    ) -> filament::Result<i64> {
        self.0.call(instance, entry, ctx, args_ptr)
    }
    fn reset_memory(&self, instance: filament::module_runtime::EngineInstance) -> filament::Result<()> {
        self.0.reset_memory(instance)
    }
    fn canonicalize_nan(&self, on: bool) {
        self.0.canonicalize_nan(on);
    }
}

#[test]
fn cursor_opened_before_a_prune_reports_not_found_after_it() {
    let engine = std::sync::Arc::new(TestEngine::new());
    let boxed: Box<dyn Engine> = Box::new(ArcEngine(engine));
    let mut kernel = Kernel::new(KernelConfig::default(), boxed);

    let bytes = b"m";
    let args = ProcessSpawnArgs {
        pipeline: vec![ModuleDefinition {
            name: "m".into(),
            bytes: bytes.to_vec(),
            declared_digest: Digest::compute(bytes),
            mem_cap: 64,
            pooling: PoolingMode::Stateless,
            context: ExecutionContext::Logic,
        }],
        channels: vec![],
        limits: ResourceLimits::unbounded(),
        capabilities: CapabilitySet::new(),
        scheduling: SchedulingPolicy::Shared,
        init_args: Value::Unit,
    };
    let pid = kernel.spawn_root(args, Kernel::prunable_policy()).unwrap();

    let process = kernel.process_mut(pid).unwrap();
    for _ in 0..15 {
        process.timeline_mut().append(
            "a".into(),
            Value::U64(0),
            filament::types::VirtualTime::ZERO,
            0,
            filament::timeline::TraceContext::default(),
        );
    }

    let mut cursor = process.timeline().open_cursor(None, Tick(10), None, false);
    assert!(cursor.next(process.timeline(), 10).is_ok());

    process.timeline_mut().prune(Tick(15)).unwrap();

    let err = cursor.next(process.timeline(), 10).unwrap_err();
    assert_eq!(err.kind, filament::error::ErrorKind::NotFound);
}
