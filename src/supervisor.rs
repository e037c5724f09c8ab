//! Spawn validation and cascading termination ordering (spec.md §4.9).
//!
//! These are pure functions over the data [`crate::kernel::Kernel`]
//! owns, kept free of the kernel's own locking/dispatch so the spawn
//! and terminate invariants can be tested in isolation.

use crate::capability::CapabilitySet;
use crate::error::{Error, Result};
use crate::module_runtime::{ChannelDefinition, ModuleDefinition};
use crate::process::Process;
use crate::security::Digest;
use crate::types::ProcessId;
use std::collections::HashMap;

/// Verifies a module's declared digest against its actual bytes
/// (spec.md §4.9: "Spawn validates every module digest").
pub fn validate_module_digest(def: &ModuleDefinition) -> Result<()> {
    def.declared_digest.verify(&def.bytes)
}

/// Verifies every grant requested for a child is present in the
/// parent's set, by URN (spec.md §4.9).
pub fn validate_capability_subset(child: &CapabilitySet, parent: &CapabilitySet) -> Result<()> {
    if child.is_subset_of(parent) {
        Ok(())
    } else {
        Err(Error::perm("requested capabilities are not a subset of the parent's grants"))
    }
}

/// Verifies two channel declarations agree byte-wise on schema URI and
/// root value tag (spec.md §4.9).
pub fn validate_channel_schema(a: &ChannelDefinition, b: &ChannelDefinition) -> Result<()> {
    if a.schema_uri != b.schema_uri {
        return Err(Error::type_mismatch("channel schema URIs do not match exactly"));
    }
    if a.root_tag != b.root_tag {
        return Err(Error::type_mismatch("channel root value types do not match"));
    }
    Ok(())
}

/// Deducts `mem_max` from the parent's remaining quota, atomically:
/// either the whole deduction applies or none of it does.
pub fn deduct_quota(parent_quota: &mut u64, mem_max: u64) -> Result<()> {
    if mem_max > *parent_quota {
        return Err(Error::oom("child resource request exceeds parent's remaining quota"));
    }
    *parent_quota -= mem_max;
    Ok(())
}

/// Credits `mem_max` back to the parent on termination.
pub fn credit_quota(parent_quota: &mut u64, mem_max: u64) {
    *parent_quota = parent_quota.saturating_add(mem_max);
}

/// Computes the post-order cascading termination sequence rooted at
/// `root`: every descendant terminates before its ancestor, and among
/// siblings children are visited depth-first (spec.md §4.9, §8 scenario 4
/// — "C2 terminates before C1").
#[must_use]
pub fn termination_order(root: ProcessId, processes: &HashMap<ProcessId, Process>) -> Vec<ProcessId> {
    let mut order = Vec::new();
    visit_post_order(root, processes, &mut order);
    order
}

fn visit_post_order(id: ProcessId, processes: &HashMap<ProcessId, Process>, order: &mut Vec<ProcessId>) {
    if let Some(process) = processes.get(&id) {
        for &child in process.children() {
            visit_post_order(child, processes, order);
        }
    }
    order.push(id);
}

/// Confirms the digest declared for every module in a pipeline matches
/// its content, short-circuiting on the first mismatch.
pub fn validate_pipeline_digests(defs: &[ModuleDefinition]) -> Result<Vec<Digest>> {
    defs.iter().map(|def| validate_module_digest(def).map(|()| def.declared_digest)).collect()
}
