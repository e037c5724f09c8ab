//! Module loader, ABI argument blocks, and the pluggable execution
//! engine contract (spec.md §4.7, §6).

pub mod abi;
pub mod engine;
pub mod instance;

pub use abi::{
    ChannelDefinition, HostInfo, ModuleDefinition, ModuleInfo, ProcessSpawnArgs, WeaveArgs, MAGIC,
};
pub use engine::{Engine, EngineInstance, ModuleImage, TestEngine};
pub use instance::{InstanceState, ModuleInstance};
