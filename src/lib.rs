//! Filament: a deterministic, event-sourced partitioning kernel that
//! hosts sandboxed computational modules via atomic transactional
//! cycles ("Weaves") mediated by a capability system.
//!
//! The kernel itself never executes untrusted code directly — it owns
//! process identity, timelines, channels, blobs, and capability grants,
//! and drives a pluggable [`module_runtime::Engine`] through the Weave
//! transaction cycle documented in [`weave`].
//!
//! # Module structure
//!
//! - [`types`]: core scalars, identifiers, resource limits
//! - [`error`](mod@error): the crate-wide error type
//! - [`value`]: the tagged-union value and its wire codec
//! - [`memory`]: the blob table and retention journal
//! - [`staging`]: per-process staging area
//! - [`channel`]: dynamic typed ring-buffer channels
//! - [`timeline`]: append-only committed event log and cursors
//! - [`capability`]: capability grants and the outbound router
//! - [`security`]: module digest verification
//! - [`timer`]: the virtual-time timer wheel
//! - [`resource`]: per-Weave resource accounting
//! - [`kv`]: per-process snapshot-isolated key/value store
//! - [`module_runtime`]: module ABI, engine contract, instance lifecycle
//! - [`process`]: process identity and pipeline state
//! - [`weave`]: the Weave transaction cycle
//! - [`supervisor`]: spawn validation and cascading termination
//! - [`kernel`]: the top-level owning container
//! - [`config`]: host-wide kernel configuration
//! - [`observability`]: structured logging
//! - [`util`]: deterministic RNG, entropy, and arena helpers

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod capability;
pub mod channel;
pub mod config;
pub mod error;
pub mod kernel;
pub mod kv;
pub mod memory;
pub mod module_runtime;
pub mod observability;
pub mod process;
pub mod resource;
pub mod security;
pub mod staging;
pub mod supervisor;
pub mod timeline;
pub mod timer;
pub mod types;
pub mod util;
pub mod value;
pub mod weave;

pub use error::{Error, ErrorKind, Result};
pub use kernel::Kernel;
