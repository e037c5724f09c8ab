//! Memory plane: the blob allocator, reference counter, and retention
//! garbage collector (spec.md §4.2).

pub mod blob;

pub use blob::{BlobPermissions, BlobRetentionJournal, BlobTable, DmaRequest};
