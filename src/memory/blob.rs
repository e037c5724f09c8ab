//! Kernel-managed reference-counted buffers (spec.md §3 "Blob", §4.2).
//!
//! A [`BlobTable`] owns every blob in a kernel instance. `retain` is
//! provisional within the Weave that calls it — the refcount increment
//! is journaled in a [`BlobRetentionJournal`] and only becomes permanent
//! on commit; on discard it's reverted, which is what lets a rolled-back
//! Weave leave the blob table bit-for-bit unchanged (spec.md §8).

use crate::error::{Error, Result};
use crate::types::{BlobHandle, IdSource, ProcessId};
use std::collections::HashMap;

/// Minimum size the ABI guarantees a single blob allocation may request
/// without being rejected purely on size grounds.
pub const MIN_BLOB_BYTES: usize = 128;

/// DMA allocation request flags (spec.md §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DmaRequest {
    /// Allocation must be backed by DMA-capable memory or fail.
    pub required: bool,
    /// Caller accepts standard memory if DMA is unavailable.
    pub optional: bool,
}

impl DmaRequest {
    /// No DMA requirement at all.
    pub const NONE: Self = Self {
        required: false,
        optional: false,
    };

    /// Per spec.md §4.2: "If both bits are set, treat as DMA-optional."
    #[must_use]
    pub const fn effective_required(self) -> bool {
        self.required && !self.optional
    }
}

/// Read/write/execute permission bits tracked per blob reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlobPermissions {
    /// Read permission.
    pub read: bool,
    /// Write permission.
    pub write: bool,
    /// Execute permission.
    pub exec: bool,
}

impl BlobPermissions {
    /// Whether `self` requests no permission `grant` does not also hold.
    #[must_use]
    pub const fn is_subset_of(self, grant: Self) -> bool {
        (!self.read || grant.read) && (!self.write || grant.write) && (!self.exec || grant.exec)
    }
}

#[derive(Debug)]
struct BlobState {
    owner: ProcessId,
    data: Vec<u8>,
    refcount: u64,
    ephemeral: bool,
    dma: bool,
    /// True once the blob has survived at least one committed Weave, or
    /// was retained in the Weave that created it. Accessing a handle
    /// that is neither retained nor committed is a trap (spec.md §4.2).
    durable: bool,
    grant: BlobPermissions,
}

/// Whether the host environment can satisfy DMA-capable allocations.
/// Exposed so tests can exercise the fallback/OOM paths deterministically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DmaAvailability {
    /// DMA pool has room.
    Available,
    /// Host has no DMA pool (spec.md §8 scenario 6).
    Unavailable,
}

/// The blob table: every blob handle the kernel knows about.
#[derive(Debug)]
pub struct BlobTable {
    ids: IdSource,
    blobs: HashMap<BlobHandle, BlobState>,
    dma_availability: DmaAvailability,
}

impl Default for BlobTable {
    fn default() -> Self {
        Self::new(DmaAvailability::Available)
    }
}

impl BlobTable {
    /// Creates an empty table with the given DMA availability.
    #[must_use]
    pub fn new(dma_availability: DmaAvailability) -> Self {
        Self {
            ids: IdSource::new(),
            blobs: HashMap::new(),
            dma_availability,
        }
    }

    /// `alloc(size, dma_flags)` (spec.md §4.2). Deducts `size` from the
    /// caller-supplied `quota_remaining` counter; the caller (the
    /// process's resource account) is charged atomically with the
    /// allocation so a failed alloc never leaves a partial charge.
    pub fn alloc(
        &mut self,
        owner: ProcessId,
        size: usize,
        dma: DmaRequest,
        quota_remaining: &mut u64,
    ) -> Result<BlobHandle> {
        let needs_dma = dma.effective_required();
        if needs_dma && self.dma_availability == DmaAvailability::Unavailable {
            return Err(Error::oom("DMA required but unavailable on this host"));
        }
        let size_u64 = size as u64;
        if size_u64 > *quota_remaining {
            return Err(Error::oom("blob allocation exceeds process memory quota"));
        }
        *quota_remaining -= size_u64;
        let handle = BlobHandle::from_raw(self.ids.next());
        self.blobs.insert(
            handle,
            BlobState {
                owner,
                data: vec![0u8; size],
                refcount: 1,
                ephemeral: true,
                dma: needs_dma,
                durable: false,
                grant: BlobPermissions {
                    read: true,
                    write: true,
                    exec: false,
                },
            },
        );
        Ok(handle)
    }

    /// `map(id, perm_flags)`: returns the blob's bytes if `owner` holds a
    /// reference and `perm` is a subset of the grant (spec.md §4.2). The
    /// handle must be durable (retained or committed previously, or
    /// retained earlier in the current Weave) or this traps.
    pub fn map(
        &self,
        handle: BlobHandle,
        owner: ProcessId,
        perm: BlobPermissions,
    ) -> Result<&[u8]> {
        let blob = self.lookup_durable(handle)?;
        if blob.owner != owner {
            return Err(Error::perm("caller does not own this blob"));
        }
        if !perm.is_subset_of(blob.grant) {
            return Err(Error::perm("requested permissions exceed blob grant"));
        }
        Ok(&blob.data)
    }

    /// Mutable variant of [`BlobTable::map`] for write-permitted references.
    pub fn map_mut(
        &mut self,
        handle: BlobHandle,
        owner: ProcessId,
        perm: BlobPermissions,
    ) -> Result<&mut [u8]> {
        let blob = self
            .blobs
            .get(&handle)
            .ok_or_else(|| Error::not_found("unknown blob handle"))?;
        if !blob.durable {
            return Err(Error::timeout("trap: blob handle not retained or committed"));
        }
        if blob.owner != owner {
            return Err(Error::perm("caller does not own this blob"));
        }
        if !perm.is_subset_of(blob.grant) {
            return Err(Error::perm("requested permissions exceed blob grant"));
        }
        Ok(&mut self.blobs.get_mut(&handle).unwrap().data)
    }

    fn lookup_durable(&self, handle: BlobHandle) -> Result<&BlobState> {
        let blob = self
            .blobs
            .get(&handle)
            .ok_or_else(|| Error::not_found("unknown blob handle"))?;
        if !blob.durable {
            return Err(Error::timeout("trap: blob handle not retained or committed"));
        }
        Ok(blob)
    }

    /// Size of a blob in bytes, regardless of durability (used by
    /// callers computing quota credits on release).
    #[must_use]
    pub fn size_of(&self, handle: BlobHandle) -> Option<usize> {
        self.blobs.get(&handle).map(|b| b.data.len())
    }

    /// True if the handle exists at all (durable or still provisional).
    #[must_use]
    pub fn contains(&self, handle: BlobHandle) -> bool {
        self.blobs.contains_key(&handle)
    }

    /// Directly releases one reference, dropping the blob if it reaches
    /// zero and is ephemeral. Used outside the Weave journal for
    /// unconditional teardown paths (e.g. process termination).
    pub fn force_release(&mut self, handle: BlobHandle, quota_remaining: &mut u64) {
        if let Some(blob) = self.blobs.get_mut(&handle) {
            blob.refcount = blob.refcount.saturating_sub(1);
            if blob.refcount == 0 && blob.ephemeral {
                *quota_remaining += blob.data.len() as u64;
                self.blobs.remove(&handle);
            }
        }
    }

    /// Sweeps every ephemeral blob owned by `process` that is not
    /// currently retained by any durable reference (`drop_ephemerals`,
    /// spec.md §4.2), crediting memory back to `quota_remaining`.
    pub fn drop_ephemerals(&mut self, process: ProcessId, quota_remaining: &mut u64) {
        let doomed: Vec<BlobHandle> = self
            .blobs
            .iter()
            .filter(|(_, b)| b.owner == process && b.ephemeral && !b.durable)
            .map(|(h, _)| *h)
            .collect();
        for handle in doomed {
            if let Some(blob) = self.blobs.remove(&handle) {
                *quota_remaining += blob.data.len() as u64;
            }
        }
    }

    /// Marks a blob retained (no longer ephemeral) immediately, bypassing
    /// the Weave journal — used when committing a journal's increments.
    fn apply_retain(&mut self, handle: BlobHandle) {
        if let Some(blob) = self.blobs.get_mut(&handle) {
            blob.refcount += 1;
            blob.ephemeral = false;
            blob.durable = true;
        }
    }

    fn apply_release(&mut self, handle: BlobHandle, quota_remaining: &mut u64) {
        self.force_release(handle, quota_remaining);
    }

    /// Called once at commit time so every blob newly referenced by a
    /// committed event becomes durable for the next Weave.
    pub fn mark_committed(&mut self, handle: BlobHandle) {
        if let Some(blob) = self.blobs.get_mut(&handle) {
            blob.durable = true;
        }
    }

    /// Atomically bumps a blob's refcount when a reference transfers
    /// through a channel enqueue (spec.md §4.4: "blob payload is never
    /// copied"). The transferred reference is durable immediately since
    /// channel writes are not subject to Weave rollback once enqueued.
    pub fn bump_ref_for_transfer(&mut self, handle: BlobHandle) -> Result<()> {
        let blob = self
            .blobs
            .get_mut(&handle)
            .ok_or_else(|| Error::not_found("unknown blob handle"))?;
        blob.refcount += 1;
        blob.durable = true;
        Ok(())
    }
}

/// A per-Weave journal of provisional `retain`/`release` calls.
///
/// `retain` only takes effect on [`BlobRetentionJournal::commit`]; on
/// [`BlobRetentionJournal::discard`] the journal is simply dropped and
/// the blob table reverts to its pre-Weave state, per spec.md §4.2 and
/// the discard invariant in spec.md §8.
#[derive(Debug, Default)]
pub struct BlobRetentionJournal {
    retains: Vec<BlobHandle>,
    releases: Vec<BlobHandle>,
}

impl BlobRetentionJournal {
    /// Creates an empty journal for a new Weave.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Journals a provisional `retain(id)`.
    pub fn retain(&mut self, handle: BlobHandle) {
        self.retains.push(handle);
    }

    /// Journals a provisional `release(id)`.
    pub fn release(&mut self, handle: BlobHandle) {
        self.releases.push(handle);
    }

    /// Applies every journaled retain then release to `table`, in the
    /// order they were recorded, and credits `quota_remaining` for any
    /// memory released. Consumes the journal.
    pub fn commit(self, table: &mut BlobTable, quota_remaining: &mut u64) {
        for handle in self.retains {
            table.apply_retain(handle);
        }
        for handle in self.releases {
            table.apply_release(handle, quota_remaining);
        }
    }

    /// Drops every journaled entry without touching the blob table —
    /// the discard path. Nothing to do beyond dropping `self`, but the
    /// explicit method documents the Weave phase it corresponds to.
    pub fn discard(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owner() -> ProcessId {
        ProcessId::from_raw(1)
    }

    #[test]
    fn alloc_deducts_quota_and_rejects_over_budget() {
        let mut table = BlobTable::default();
        let mut quota = 256u64;
        let handle = table.alloc(owner(), 200, DmaRequest::NONE, &mut quota).unwrap();
        assert_eq!(quota, 56);
        assert!(table.contains(handle));
        let err = table.alloc(owner(), 100, DmaRequest::NONE, &mut quota).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Oom);
    }

    #[test]
    fn dma_required_without_availability_is_oom() {
        let mut table = BlobTable::new(DmaAvailability::Unavailable);
        let mut quota = 1024;
        let req = DmaRequest {
            required: true,
            optional: false,
        };
        assert!(table.alloc(owner(), 64, req, &mut quota).is_err());
    }

    #[test]
    fn dma_required_and_optional_falls_back() {
        let mut table = BlobTable::new(DmaAvailability::Unavailable);
        let mut quota = 1024;
        let req = DmaRequest {
            required: true,
            optional: true,
        };
        assert!(table.alloc(owner(), 64, req, &mut quota).is_ok());
    }

    #[test]
    fn map_before_retain_or_commit_traps() {
        let mut table = BlobTable::default();
        let mut quota = 1024;
        let handle = table.alloc(owner(), 32, DmaRequest::NONE, &mut quota).unwrap();
        let perm = BlobPermissions {
            read: true,
            write: false,
            exec: false,
        };
        let err = table.map(handle, owner(), perm).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Timeout);
    }

    #[test]
    fn map_after_commit_succeeds_with_subset_permissions() {
        let mut table = BlobTable::default();
        let mut quota = 1024;
        let handle = table.alloc(owner(), 32, DmaRequest::NONE, &mut quota).unwrap();
        table.mark_committed(handle);
        let perm = BlobPermissions {
            read: true,
            write: false,
            exec: false,
        };
        assert!(table.map(handle, owner(), perm).is_ok());
    }

    #[test]
    fn map_with_excess_permissions_is_denied() {
        let mut table = BlobTable::default();
        let mut quota = 1024;
        let handle = table.alloc(owner(), 32, DmaRequest::NONE, &mut quota).unwrap();
        table.mark_committed(handle);
        let perm = BlobPermissions {
            read: true,
            write: true,
            exec: true,
        };
        let err = table.map(handle, owner(), perm).unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::Perm);
    }

    #[test]
    fn retain_journal_discard_leaves_table_unchanged() {
        let mut table = BlobTable::default();
        let mut quota = 1024;
        let handle = table.alloc(owner(), 32, DmaRequest::NONE, &mut quota).unwrap();
        let mut journal = BlobRetentionJournal::new();
        journal.retain(handle);
        journal.discard();
        // Blob should still be ephemeral, not durable.
        let perm = BlobPermissions::default();
        assert!(table.map(handle, owner(), perm).is_err());
    }

    #[test]
    fn retain_journal_commit_makes_blob_durable() {
        let mut table = BlobTable::default();
        let mut quota = 1024;
        let handle = table.alloc(owner(), 32, DmaRequest::NONE, &mut quota).unwrap();
        let mut journal = BlobRetentionJournal::new();
        journal.retain(handle);
        journal.commit(&mut table, &mut quota);
        let perm = BlobPermissions::default();
        assert!(table.map(handle, owner(), perm).is_ok());
    }

    #[test]
    fn drop_ephemerals_credits_quota_back() {
        let mut table = BlobTable::default();
        let mut quota = 1024;
        table.alloc(owner(), 100, DmaRequest::NONE, &mut quota).unwrap();
        assert_eq!(quota, 924);
        table.drop_ephemerals(owner(), &mut quota);
        assert_eq!(quota, 1024);
    }

    #[test]
    fn retained_blob_survives_drop_ephemerals() {
        let mut table = BlobTable::default();
        let mut quota = 1024;
        let handle = table.alloc(owner(), 100, DmaRequest::NONE, &mut quota).unwrap();
        table.mark_committed(handle);
        table.drop_ephemerals(owner(), &mut quota);
        assert!(table.contains(handle));
    }
}
