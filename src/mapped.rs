//! The mapped-file handle: one descriptor, at most one mapping, a resize that
//! either commits, rolls back, or degrades the handle to read-only.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, error, warn};

use crate::backend::{Backend, Mapping, Mode, OsBackend, Stat};
use crate::errors::{MapError, Result};
use crate::open::MapOptions;
use crate::utils::slice_range;

/// Access mode of a [`MappedFile`].
///
/// Fixed at open. The only transition is `ReadWrite` to `ReadOnly`, taken when
/// a failed resize could not be rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Reads only; resize and mutable access are refused.
    ReadOnly,
    /// Reads and writes.
    ReadWrite,
}

/// A file's bytes, addressable as one contiguous region, safely resizable.
///
/// The region is absent while the file is empty: zero bytes are never mapped,
/// so [`MappedFile::region`] returns an empty slice instead. Every slice handed
/// out borrows the handle, which makes a [`MappedFile::resize`] (taking
/// `&mut self`) invalidate them at compile time.
///
/// # Examples
///
/// ```no_run
/// use mmap_edit::MappedFile;
///
/// let mut file = MappedFile::open("blob.bin", 0o644)?;
/// file.resize(16)?;
/// file.region_mut()?[..4].copy_from_slice(b"\x7fELF");
/// file.sync()?;
/// assert_eq!(&file.region()[..4], b"\x7fELF");
/// file.close();
/// # Ok::<(), mmap_edit::MapError>(())
/// ```
pub struct MappedFile<B: Backend = OsBackend> {
    backend: B,
    path: PathBuf,
    file: Option<File>,
    access: AccessMode,
    permissions: Mode,
    map: Option<Mapping>,
    size: u64,
    stat: Option<Stat>,
}

impl<B: Backend> std::fmt::Debug for MappedFile<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MappedFile")
            .field("path", &self.path)
            .field("open", &self.is_open())
            .field("access", &self.access)
            .field("size", &self.size)
            .finish()
    }
}

impl MappedFile {
    /// Open `path` on the real filesystem.
    ///
    /// `permissions == 0` opens read-only without creating. Otherwise the file
    /// is opened read-write (created with `permissions` if absent), falling back
    /// to read-only and then to an exclusive create.
    ///
    /// # Errors
    ///
    /// See [`MapOptions::open_with`].
    pub fn open<P: AsRef<Path>>(path: P, permissions: Mode) -> Result<Self> {
        MapOptions::new().permissions(permissions).open(path)
    }
}

impl<B: Backend> MappedFile<B> {
    pub(crate) fn from_parts(
        backend: B,
        path: PathBuf,
        file: File,
        access: AccessMode,
        permissions: Mode,
        map: Option<Mapping>,
        stat: Stat,
    ) -> Self {
        let size = map.as_ref().map_or(0, |m| m.len() as u64);
        Self {
            backend,
            path,
            file: Some(file),
            access,
            permissions,
            map,
            size,
            stat: Some(stat),
        }
    }

    /// A handle in the unopened state, ready for [`MappedFile::reopen`].
    #[must_use]
    pub fn unopened(backend: B) -> Self {
        Self {
            backend,
            path: PathBuf::new(),
            file: None,
            access: AccessMode::ReadOnly,
            permissions: 0,
            map: None,
            size: 0,
            stat: None,
        }
    }

    /// Current size in bytes. Re-read it after every resize.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Whether the file is zero-length (or closed).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Whether writes and resizes are allowed.
    #[must_use]
    pub fn is_read_write(&self) -> bool {
        self.file.is_some() && self.access == AccessMode::ReadWrite
    }

    /// Whether the handle holds an open descriptor.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// Current access mode.
    #[must_use]
    pub fn access(&self) -> AccessMode {
        self.access
    }

    /// Permission bits the file was opened with.
    #[must_use]
    pub fn permissions(&self) -> Mode {
        self.permissions
    }

    /// Path used to open, for diagnostics. Empty when unopened.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Metadata cached after the last open or resize.
    #[must_use]
    pub fn stat(&self) -> Option<&Stat> {
        self.stat.as_ref()
    }

    /// Backend this handle talks to the OS through.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The mapped bytes; empty when nothing is mapped.
    #[must_use]
    pub fn region(&self) -> &[u8] {
        self.map.as_ref().map_or(&[][..], Mapping::as_slice)
    }

    /// The mapped bytes, writable.
    ///
    /// # Errors
    ///
    /// Returns `MapError::Closed` if the handle is closed.
    /// Returns `MapError::ReadOnlyViolation` if the handle is read-only.
    pub fn region_mut(&mut self) -> Result<&mut [u8]> {
        self.ensure_writable()?;
        match self.map.as_mut() {
            Some(map) => map.as_mut_slice().ok_or(MapError::ReadOnlyViolation),
            None => Ok(&mut []),
        }
    }

    /// Bounds-checked view of `len` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `MapError::OutOfBounds` if the range exceeds the current size.
    pub fn read_at(&self, offset: u64, len: u64) -> Result<&[u8]> {
        let range = slice_range(offset, len, self.size)?;
        Ok(&self.region()[range])
    }

    /// Bounds-checked copy of `data` into the region at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `MapError::Closed` or `MapError::ReadOnlyViolation` as
    /// [`MappedFile::region_mut`] does.
    /// Returns `MapError::OutOfBounds` if the range exceeds the current size.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let range = slice_range(offset, data.len() as u64, self.size)?;
        self.region_mut()?[range].copy_from_slice(data);
        Ok(())
    }

    /// Synchronously flush the mapping to storage.
    ///
    /// Read-only mappings and empty files have nothing to flush. A handle
    /// degraded by `IoFatal` still holds its writable mapping and is flushed
    /// like any other, so dirty pages are never reported durable unflushed.
    ///
    /// # Errors
    ///
    /// Returns `MapError::Closed` if the handle is closed.
    /// Returns `MapError::SyncFailed` if the flush fails.
    pub fn sync(&self) -> Result<()> {
        if self.file.is_none() {
            return Err(MapError::Closed);
        }
        self.sync_mapping()
            .map_err(|source| MapError::SyncFailed { source })
    }

    /// Resize the file and its mapping to `new_size` bytes.
    ///
    /// Truncates the file, remaps (in place with relocation allowed), then
    /// syncs. A failed sync rolls the mapping back to the old size; if that
    /// fails too the handle becomes read-only for the rest of its life.
    ///
    /// # Errors
    ///
    /// Returns `MapError::Closed` if the handle is closed.
    /// Returns `MapError::ReadOnlyViolation` if the handle is read-only.
    /// Returns `MapError::TruncateFailed` if the file could not be resized; nothing changed.
    /// Returns `MapError::MapFailed` if remapping failed; the file on disk is
    /// already at `new_size` while the mapping keeps the old size.
    /// Returns `MapError::SyncFailed` if the sync failed and the rollback
    /// succeeded; size, mapping extent and access mode are restored. After a
    /// rolled-back shrink the bytes past `new_size` read back as zeros, since
    /// the file had already been truncated.
    /// Returns `MapError::IoFatal` if the sync and the rollback failed; the
    /// handle is now read-only and keeps the `new_size` mapping.
    /// Returns `MapError::AccessFailed` if refreshing metadata failed; the
    /// resize itself is committed.
    pub fn resize(&mut self, new_size: u64) -> Result<()> {
        self.ensure_writable()?;
        if new_size == self.size {
            return Ok(());
        }
        let old_size = self.size;
        let Some(file) = self.file.as_ref() else {
            return Err(MapError::Closed);
        };

        self.backend
            .set_len(file, new_size)
            .map_err(|source| MapError::TruncateFailed { source })?;

        map_to(&self.backend, file, &mut self.map, new_size).map_err(|source| {
            error!(
                "remap of {} to {new_size} bytes failed, file on disk is already resized: {source}",
                self.path.display()
            );
            MapError::MapFailed { source }
        })?;

        if new_size > 0 {
            if let Err(cause) = self.sync_mapping() {
                warn!(
                    "sync of {} at {new_size} bytes failed, rolling back to {old_size}: {cause}",
                    self.path.display()
                );
                return Err(self.roll_back(old_size, cause));
            }
        }

        self.size = new_size;
        debug!("resized {} from {old_size} to {new_size} bytes", self.path.display());
        self.refresh_stat()
    }

    /// Release the mapping and the descriptor. Idempotent, never fails.
    pub fn close(&mut self) {
        if self.file.is_some() {
            debug!("closing {}", self.path.display());
        }
        self.map = None;
        self.file = None;
        self.stat = None;
        self.size = 0;
        self.access = AccessMode::ReadOnly;
        self.permissions = 0;
        self.path = PathBuf::new();
    }

    /// Close, then open `path` again through the same backend.
    ///
    /// The handle stays closed if the open fails.
    ///
    /// # Errors
    ///
    /// See [`MapOptions::open_with`].
    pub fn reopen<P: AsRef<Path>>(&mut self, path: P, options: &MapOptions) -> Result<()>
    where
        B: Clone,
    {
        self.close();
        *self = options.open_with(path, self.backend.clone())?;
        Ok(())
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.file.is_none() {
            return Err(MapError::Closed);
        }
        if self.access == AccessMode::ReadOnly {
            return Err(MapError::ReadOnlyViolation);
        }
        Ok(())
    }

    fn sync_mapping(&self) -> io::Result<()> {
        match &self.map {
            Some(map) => self.backend.sync(map),
            None => Ok(()),
        }
    }

    /// Undo a resize whose sync failed. Returns the error to report.
    fn roll_back(&mut self, old_size: u64, cause: io::Error) -> MapError {
        let Some(file) = self.file.as_ref() else {
            return MapError::Closed;
        };
        match map_to(&self.backend, file, &mut self.map, old_size) {
            Ok(()) => {
                self.size = old_size;
                if let Err(e) = self.backend.set_len(file, old_size) {
                    warn!(
                        "mapping of {} restored but the file stays at its new length: {e}",
                        self.path.display()
                    );
                }
                MapError::SyncFailed { source: cause }
            }
            Err(source) => {
                self.access = AccessMode::ReadOnly;
                self.size = self.map.as_ref().map_or(0, |m| m.len() as u64);
                error!(
                    "rollback of {} failed, going read-only at {} bytes: {source}",
                    self.path.display(),
                    self.size
                );
                MapError::IoFatal { source }
            }
        }
    }

    fn refresh_stat(&mut self) -> Result<()> {
        let Some(file) = self.file.as_ref() else {
            return Err(MapError::Closed);
        };
        let stat = self
            .backend
            .stat(file)
            .map_err(|source| MapError::AccessFailed { source })?;
        self.stat = Some(stat);
        Ok(())
    }
}

/// Point `slot` at the first `len` bytes of `file`: drop it for zero,
/// remap an existing mapping, or map afresh.
fn map_to<B: Backend>(
    backend: &B,
    file: &File,
    slot: &mut Option<Mapping>,
    len: u64,
) -> io::Result<()> {
    if len == 0 {
        *slot = None;
        return Ok(());
    }
    if let Some(map) = slot.as_mut() {
        return backend.remap(file, map, len);
    }
    *slot = Some(backend.map(file, len, true)?);
    Ok(())
}
