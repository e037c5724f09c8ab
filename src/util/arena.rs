//! A flat byte arena used as the backing store for staging buffers and
//! value payloads that need stable offsets for pointer relocation
//! (spec.md §4.1, "Pointer Relocation").

use crate::error::{Error, Result};

/// A growable, zero-initialized byte arena with offset-based allocation.
///
/// Unlike a general allocator, an [`Arena`] never frees individual
/// allocations — it is reset wholesale (e.g. at Weave start for staging,
/// or per value-encode call). This matches the value codec's need to
/// emit self-relative offsets that stay valid for the arena's lifetime.
#[derive(Debug, Default, Clone)]
pub struct Arena {
    buf: Vec<u8>,
}

impl Arena {
    /// Creates an arena pre-sized to `capacity` bytes, zero-filled.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0u8; capacity],
        }
    }

    /// Total capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Borrows the whole arena as a byte slice.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.buf
    }

    /// Borrows the whole arena as a mutable byte slice.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Writes `data` at `offset`, extending the arena if it's too small.
    /// Used by pointer relocation, which computes destination offsets
    /// before the bytes backing them are necessarily allocated.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(data.len())
            .ok_or_else(|| Error::invalid("arena offset overflow"))?;
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Appends `data`, returning the offset it was written at.
    pub fn append(&mut self, data: &[u8]) -> usize {
        let offset = self.buf.len();
        self.buf.extend_from_slice(data);
        offset
    }

    /// Reads `len` bytes starting at `offset`, bounds-checked against the
    /// arena's own size — used when validating that a guest-provided
    /// pointer targets the source buffer (spec.md §4.1).
    pub fn read_at(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset
            .checked_add(len)
            .ok_or_else(|| Error::invalid("arena read overflow"))?;
        self.buf
            .get(offset..end)
            .ok_or_else(|| Error::invalid("arena read out of bounds"))
    }

    /// Resets the arena to zero length without releasing its capacity,
    /// matching the staging area's "zero-initialized at Weave start" rule.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.buf.resize(self.buf.capacity(), 0);
    }

    /// Current length in bytes (distinct from `capacity` once the arena
    /// has been reset-and-refilled below its preallocated size).
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True when the arena holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
