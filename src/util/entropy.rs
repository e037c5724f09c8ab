//! Entropy source abstraction.
//!
//! Logic-context modules must derive all entropy from the Weave's
//! `rand_seed` (spec.md §4.7); [`DetEntropy`] provides that deterministic
//! stream. [`OsEntropy`] backs host-side operations that have no
//! determinism requirement (e.g. minting a fresh process id's entropy
//! fork point).

use crate::types::ProcessId;
use crate::util::DetRng;
use std::sync::{Arc, Mutex};

/// A source of randomness a module or the kernel can draw from.
pub trait EntropySource: Send + Sync {
    /// Fills `dest` with entropy bytes.
    fn fill_bytes(&self, dest: &mut [u8]);

    /// Returns the next 64-bit value.
    fn next_u64(&self) -> u64 {
        let mut buf = [0u8; 8];
        self.fill_bytes(&mut buf);
        u64::from_le_bytes(buf)
    }

    /// Forks a fresh, independent source for a child process.
    fn fork(&self, child: ProcessId) -> Arc<dyn EntropySource>;
}

/// OS-backed entropy, used only outside the deterministic Logic path.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill_bytes(&self, dest: &mut [u8]) {
        getrandom::fill(dest).expect("OS entropy source failed");
    }

    fn fork(&self, _child: ProcessId) -> Arc<dyn EntropySource> {
        Arc::new(Self)
    }
}

/// Deterministic entropy source seeded per-process, so two processes
/// spawned with the same `rand_seed` see the same module-visible stream.
#[derive(Debug)]
pub struct DetEntropy {
    rng: Mutex<DetRng>,
}

impl DetEntropy {
    /// Creates a deterministic source from a 64-bit seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(DetRng::new(seed)),
        }
    }
}

impl EntropySource for DetEntropy {
    fn fill_bytes(&self, dest: &mut [u8]) {
        self.rng.lock().expect("entropy lock poisoned").fill_bytes(dest);
    }

    fn fork(&self, _child: ProcessId) -> Arc<dyn EntropySource> {
        let seed = self.rng.lock().expect("entropy lock poisoned").fork().next_u64();
        Arc::new(Self::new(seed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn det_entropy_is_reproducible_for_same_seed() {
        let a = DetEntropy::new(123);
        let b = DetEntropy::new(123);
        assert_eq!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn det_entropy_forks_deterministically() {
        let a = DetEntropy::new(123);
        let b = DetEntropy::new(123);
        let fork_a = a.fork(ProcessId::from_raw(1));
        let fork_b = b.fork(ProcessId::from_raw(1));
        assert_eq!(fork_a.next_u64(), fork_b.next_u64());
    }
}
