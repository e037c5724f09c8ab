//! A module instance's lifecycle state (spec.md §3, §4.7).

use super::abi::{ModuleInfo, WeaveArgs};
use super::engine::{Engine, EngineInstance};
use crate::capability::WakeFlags;
use crate::error::{Error, Result};
use crate::types::{ExecutionContext, PoolingMode, WeaveOutcome};

/// Where an instance sits in its bootstrap sequence
/// (`get_info` → `reserve` → `init` → `weave`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceState {
    /// `get_info` has not yet been called.
    Loaded,
    /// Handshake complete; memory reserved; awaiting `init`.
    Reserved,
    /// `init` succeeded; ready to run `weave`.
    Ready,
    /// A module returned a negative code or the engine trapped.
    Faulted,
}

/// One loaded, instantiated module within a process's pipeline.
#[derive(Debug)]
pub struct ModuleInstance {
    alias: String,
    engine_instance: EngineInstance,
    context: ExecutionContext,
    pooling: PoolingMode,
    state: InstanceState,
    user_data: u64,
}

impl ModuleInstance {
    /// Constructs an instance at the `Loaded` bootstrap stage.
    #[must_use]
    pub const fn new(
        alias: String,
        engine_instance: EngineInstance,
        context: ExecutionContext,
        pooling: PoolingMode,
    ) -> Self {
        Self { alias, engine_instance, context, pooling, state: InstanceState::Loaded, user_data: 0 }
    }

    /// This instance's alias within its process's pipeline.
    #[must_use]
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Current bootstrap state.
    #[must_use]
    pub const fn state(&self) -> InstanceState {
        self.state
    }

    /// Step 1: verify the module's declared info against the kernel
    /// version and the context's memory limit.
    pub fn handshake(&mut self, info: &ModuleInfo, kernel_version: u32, mem_limit: u64) -> Result<()> {
        if self.state != InstanceState::Loaded {
            return Err(Error::invalid("handshake called out of order"));
        }
        if !info.is_compatible(kernel_version, mem_limit) {
            self.state = InstanceState::Faulted;
            return Err(Error::invalid("module info incompatible with kernel/context"));
        }
        self.state = InstanceState::Reserved;
        Ok(())
    }

    /// Steps 2–3: the engine reserves memory for the init payload and
    /// the module deep-copies what it needs to retain. On failure the
    /// spawn aborts (spec.md §4.7). `rand_seed` is this process's
    /// forked deterministic entropy draw, passed through the existing
    /// `ctx` slot the way `weave` passes its own per-cycle context.
    pub fn init(&mut self, engine: &dyn Engine, rand_seed: u64, args_ptr: u64) -> Result<()> {
        if self.state != InstanceState::Reserved {
            return Err(Error::invalid("init called out of order"));
        }
        let code = engine.call(self.engine_instance, "init", rand_seed, args_ptr)?;
        if code < 0 {
            self.state = InstanceState::Faulted;
            return Err(Error::invalid("module init returned a fatal code"));
        }
        self.state = InstanceState::Ready;
        Ok(())
    }

    /// Step 4: the hot path. Clears `user_data` for Stateless contexts
    /// or a `WAKE_INIT` call before the call (spec.md §4.7), restores it
    /// from the preserved scalar otherwise, and stores the returned
    /// value back for the next Weave.
    pub fn weave(&mut self, engine: &dyn Engine, args: &mut WeaveArgs) -> Result<WeaveOutcome> {
        if self.state != InstanceState::Ready {
            return Err(Error::invalid("weave called before init completed"));
        }
        let wake_init = WakeFlags::from_bits(args.wake_flags).has(WakeFlags::WAKE_INIT);
        args.user_data = if self.pooling == PoolingMode::Stateless || wake_init { 0 } else { self.user_data };

        let code = engine.call(self.engine_instance, "weave", args.ctx, 0)?;
        let outcome = WeaveOutcome::from_abi(code);
        if matches!(outcome, WeaveOutcome::Abort) {
            self.state = InstanceState::Faulted;
        } else if self.pooling == PoolingMode::Stateful {
            self.user_data = args.user_data;
        }
        Ok(outcome)
    }

    /// Marks the instance faulted; used by the supervisor on a
    /// `filament/core/panic` event regardless of the module's own
    /// return value (spec.md §4.6).
    pub fn mark_faulted(&mut self) {
        self.state = InstanceState::Faulted;
    }

    /// Preserved scalar across Weaves; always 0 for `Stateless`.
    #[must_use]
    pub const fn user_data(&self) -> u64 {
        self.user_data
    }

    /// This instance's declared execution context.
    #[must_use]
    pub const fn context(&self) -> ExecutionContext {
        self.context
    }

    /// The engine-scoped handle backing this instance, for engine calls
    /// made outside the `init`/`weave` entry points (e.g. `reset_memory`).
    #[must_use]
    pub const fn engine_instance(&self) -> EngineInstance {
        self.engine_instance
    }
}
