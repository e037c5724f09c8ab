//! Internal utilities kept deliberately small and dependency-free so the
//! Logic execution context stays deterministic.

pub mod arena;
pub mod det_rng;
pub mod entropy;

pub use arena::Arena;
pub use det_rng::DetRng;
pub use entropy::{DetEntropy, EntropySource, OsEntropy};
