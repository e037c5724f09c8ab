//! Module artifact digest verification (spec.md §4.9).

pub mod digest;

pub use digest::{Digest, ModuleArtifact, DIGEST_LEN};
