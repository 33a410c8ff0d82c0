//! # mmap-edit: memory-mapped binary files for in-place editors
//!
//! This crate owns the lifecycle of "a file's bytes, addressable as a
//! contiguous byte region, safely resizable". Front ends (a command-driven
//! editor, a grid viewer) read and write the region directly; the crate opens
//! the file, keeps one mapping over it, and resizes file and mapping together.
//!
//! ## Resizing
//!
//! A resize is three fallible OS calls: truncate, remap, sync. They are
//! reconciled into one outcome:
//!
//! - truncate fails: nothing changed (`TruncateFailed`);
//! - remap fails: the file on disk is already resized, the mapping is not
//!   (`MapFailed`, treat as fatal for the session);
//! - sync fails: the mapping is rolled back to the old size (`SyncFailed`);
//! - sync and rollback fail: the handle turns read-only for good (`IoFatal`).
//!
//! ## Quick Start
//!
//! ```no_run
//! use mmap_edit::MappedFile;
//!
//! // Read-write, created with 0644 if absent
//! let mut file = MappedFile::open("blob.bin", 0o644)?;
//! file.resize(1024)?;
//! file.write_at(100, b"patched")?;
//! file.sync()?;
//! # Ok::<(), mmap_edit::MapError>(())
//! ```
//!
//! ## Modules
//!
//! - [`errors`]: error taxonomy and diagnostic messages
//! - [`backend`]: the OS seam (`Backend`, `OsBackend`)
//! - [`mapped`]: the `MappedFile` handle
//! - [`open`]: open configuration and fallback ladder
//! - [`shared`]: lock-protected handle for several front ends
//! - [`utils`]: bounds helpers

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![deny(missing_docs)]

pub mod backend;
pub mod errors;
pub mod mapped;
pub mod open;
pub mod shared;
pub mod utils;

pub use backend::{Backend, Mapping, Mode, OpenHow, OsBackend, Stat};
pub use errors::{ErrorKind, MapError, Result};
pub use mapped::{AccessMode, MappedFile};
pub use open::MapOptions;
pub use shared::SharedMappedFile;
