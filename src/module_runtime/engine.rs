//! The execution engine contract (spec.md §6, "Engine contract").
//!
//! The kernel stays unaware of the concrete engine: WASM interpreter,
//! native shared-object loader, or — as shipped here for tests — a
//! trivial in-process engine driven by host closures. Modeled as a
//! capability trait object the way the teacher carries pluggable
//! capabilities on its execution context rather than through ambient
//! singletons.

use crate::error::{Error, Result};
use crate::security::Digest;
use std::collections::HashMap;
use std::sync::Arc;

/// An opaque loaded module image, handed back by [`Engine::load`] and
/// consumed by [`Engine::instantiate`].
#[derive(Debug, Clone)]
pub struct ModuleImage {
    digest: Digest,
    label: String,
}

impl ModuleImage {
    /// The image's verified content digest.
    #[must_use]
    pub const fn digest(&self) -> Digest {
        self.digest
    }
}

/// An opaque handle to an instantiated module, scoped to one `Engine`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineInstance(u64);

/// The pluggable execution engine contract an `Engine` implementation
/// must satisfy (spec.md §6).
pub trait Engine: Send + Sync {
    /// Verifies `digest` against `bytes` and produces a loadable image.
    fn load(&self, bytes: &[u8], digest: Digest) -> Result<ModuleImage>;

    /// Instantiates a loaded image with a private linear memory capped
    /// at `mem_cap` bytes.
    fn instantiate(&self, image: &ModuleImage, mem_cap: u64) -> Result<EngineInstance>;

    /// Invokes `entry` under instruction metering, returning the raw
    /// ABI `i64` code.
    fn call(&self, instance: EngineInstance, entry: &str, ctx: u64, args_ptr: u64) -> Result<i64>;

    /// Resets an instance's linear memory and globals to their
    /// post-`init` snapshot (spec.md §4.7, Logic context).
    fn reset_memory(&self, instance: EngineInstance) -> Result<()>;

    /// Toggles NaN canonicalization for floating-point determinism.
    fn canonicalize_nan(&self, on: bool);
}

type HostFn = dyn Fn(u64, u64) -> i64 + Send + Sync;

struct TestInstance {
    memory_snapshot: Vec<u8>,
    memory: Vec<u8>,
    entries: HashMap<String, Arc<HostFn>>,
}

/// A reference in-process `Engine`: entry points are ordinary host
/// closures rather than sandboxed code, for tests and for hosts that
/// embed trusted `System`/`Managed` modules directly. Not suitable for
/// untrusted `Logic` modules, which need a real sandbox.
#[derive(Default)]
pub struct TestEngine {
    instances: parking_lot::Mutex<HashMap<u64, TestInstance>>,
    /// Entries registered by digest rather than instance id, so a
    /// caller that only has a module's bytes (not yet instantiated
    /// through a `Kernel` spawn, which instantiates internally) can
    /// still pin its behavior before the instance exists.
    by_digest: parking_lot::Mutex<HashMap<Digest, HashMap<String, Arc<HostFn>>>>,
    next_id: std::sync::atomic::AtomicU64,
    canonicalize_nan: std::sync::atomic::AtomicBool,
}

impl TestEngine {
    /// Creates an empty engine.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an `entry` closure for the next-instantiated instance.
    /// Test-only convenience; real engines resolve entries from the
    /// loaded image itself.
    pub fn register_entry(
        &self,
        instance: EngineInstance,
        entry: impl Into<String>,
        f: impl Fn(u64, u64) -> i64 + Send + Sync + 'static,
    ) {
        if let Some(inst) = self.instances.lock().get_mut(&instance.0) {
            inst.entries.insert(entry.into(), Arc::new(f));
        }
    }

    /// Registers an `entry` closure for every future instance created
    /// from an image with `digest`. Unlike [`Self::register_entry`],
    /// this survives going through a `Kernel::spawn_*` call, which
    /// instantiates its own `EngineInstance` internally and never
    /// exposes the id a caller could target directly.
    pub fn register_entry_for_digest(
        &self,
        digest: Digest,
        entry: impl Into<String>,
        f: impl Fn(u64, u64) -> i64 + Send + Sync + 'static,
    ) {
        self.by_digest.lock().entry(digest).or_default().insert(entry.into(), Arc::new(f));
    }
}

impl Engine for TestEngine {
    fn load(&self, bytes: &[u8], digest: Digest) -> Result<ModuleImage> {
        digest.verify(bytes)?;
        Ok(ModuleImage { digest, label: format!("test-image-{}b", bytes.len()) })
    }

    fn instantiate(&self, image: &ModuleImage, mem_cap: u64) -> Result<EngineInstance> {
        let _ = &image.label;
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let cap = usize::try_from(mem_cap).unwrap_or(usize::MAX);
        let memory = vec![0u8; cap.min(1 << 20)];
        // A fresh instance defaults `init`/`weave` to an immediate PARK
        // (code 0) so a module that never calls `register_entry` still
        // bootstraps; tests override either via `register_entry`.
        let mut entries: HashMap<String, Arc<HostFn>> = HashMap::new();
        entries.insert("init".to_string(), Arc::new(|_c, _a| 0));
        entries.insert("weave".to_string(), Arc::new(|_c, _a| 0));
        if let Some(pinned) = self.by_digest.lock().get(&image.digest) {
            entries.extend(pinned.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        self.instances
            .lock()
            .insert(id, TestInstance { memory_snapshot: memory.clone(), memory, entries });
        Ok(EngineInstance(id))
    }

    fn call(&self, instance: EngineInstance, entry: &str, ctx: u64, args_ptr: u64) -> Result<i64> {
        let entries = self.instances.lock();
        let inst = entries
            .get(&instance.0)
            .ok_or_else(|| Error::not_found("unknown engine instance"))?;
        let f = inst
            .entries
            .get(entry)
            .ok_or_else(|| Error::not_found(format!("no entry point '{entry}'")))?;
        Ok(f(ctx, args_ptr))
    }

    fn reset_memory(&self, instance: EngineInstance) -> Result<()> {
        let mut instances = self.instances.lock();
        let inst = instances
            .get_mut(&instance.0)
            .ok_or_else(|| Error::not_found("unknown engine instance"))?;
        inst.memory.copy_from_slice(&inst.memory_snapshot);
        Ok(())
    }

    fn canonicalize_nan(&self, on: bool) {
        self.canonicalize_nan.store(on, std::sync::atomic::Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_rejects_digest_mismatch() {
        let engine = TestEngine::new();
        let wrong = Digest::compute(b"other");
        assert!(engine.load(b"payload", wrong).is_err());
    }

    #[test]
    fn instantiate_and_call_roundtrip() {
        let engine = TestEngine::new();
        let digest = Digest::compute(b"payload");
        let image = engine.load(b"payload", digest).unwrap();
        let instance = engine.instantiate(&image, 4096).unwrap();
        engine.register_entry(instance, "weave", |_ctx, _args| 0);
        assert_eq!(engine.call(instance, "weave", 1, 2).unwrap(), 0);
    }

    #[test]
    fn call_unknown_entry_is_not_found() {
        let engine = TestEngine::new();
        let digest = Digest::compute(b"payload");
        let image = engine.load(b"payload", digest).unwrap();
        let instance = engine.instantiate(&image, 4096).unwrap();
        assert!(engine.call(instance, "missing", 0, 0).is_err());
    }

    #[test]
    fn reset_memory_restores_snapshot() {
        let engine = TestEngine::new();
        let digest = Digest::compute(b"payload");
        let image = engine.load(b"payload", digest).unwrap();
        let instance = engine.instantiate(&image, 16).unwrap();
        assert!(engine.reset_memory(instance).is_ok());
    }

    #[test]
    fn digest_pinned_entries_apply_to_instances_created_later() {
        let engine = TestEngine::new();
        let digest = Digest::compute(b"payload");
        engine.register_entry_for_digest(digest, "weave", |_c, _a| -1);

        let image = engine.load(b"payload", digest).unwrap();
        let instance = engine.instantiate(&image, 16).unwrap();
        assert_eq!(engine.call(instance, "weave", 0, 0).unwrap(), -1);
    }
}
