//! Open configuration and the open fallback ladder.
//!
//! Opening is a short sequence of named attempts ([`OpenHow`]). The first one
//! the OS accepts decides whether the instance is read-only or read-write;
//! later steps (stat, optional truncate, map) release everything on failure,
//! including a file this attempt created.

use std::fs::File;
use std::path::Path;

use log::{debug, warn};

use crate::backend::{Backend, Mapping, Mode, OpenHow, OsBackend, Stat};
use crate::errors::{MapError, Result};
use crate::mapped::{AccessMode, MappedFile};

/// Builder for opening a [`MappedFile`].
///
/// # Examples
///
/// ```no_run
/// use mmap_edit::MapOptions;
///
/// // Create a 4KB file, refusing to clobber an existing non-empty one.
/// let file = MapOptions::new()
///     .permissions(0o644)
///     .initial_size(4096)
///     .open("blob.bin")?;
/// assert_eq!(file.size(), 4096);
/// # Ok::<(), mmap_edit::MapError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapOptions {
    permissions: Mode,
    initial_size: u64,
    require_non_empty: bool,
}

impl Default for MapOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl MapOptions {
    /// Read-write with `0o644` creation permissions, no initial size,
    /// zero-length files accepted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            permissions: 0o644,
            initial_size: 0,
            require_non_empty: false,
        }
    }

    /// Permission bits for a created file. `0` opens read-only and never creates.
    #[must_use]
    pub fn permissions(mut self, permissions: Mode) -> Self {
        self.permissions = permissions;
        self
    }

    /// Shorthand for `permissions(0)`.
    #[must_use]
    pub fn read_only(self) -> Self {
        self.permissions(0)
    }

    /// Size a freshly created (or existing but empty) file to `size` bytes.
    ///
    /// An existing non-empty file is refused with `MapError::ResizeRefused`.
    /// Ignored when opening read-only.
    #[must_use]
    pub fn initial_size(mut self, size: u64) -> Self {
        self.initial_size = size;
        self
    }

    /// Refuse zero-length files with `MapError::EmptyFile` instead of opening
    /// them unmapped.
    #[must_use]
    pub fn require_non_empty(mut self, yes: bool) -> Self {
        self.require_non_empty = yes;
        self
    }

    /// Configured creation permissions.
    #[must_use]
    pub fn mode(&self) -> Mode {
        self.permissions
    }

    /// Open `path` on the real filesystem.
    ///
    /// # Errors
    ///
    /// See [`MapOptions::open_with`].
    pub fn open<P: AsRef<Path>>(&self, path: P) -> Result<MappedFile> {
        self.open_with(path, OsBackend)
    }

    /// Open `path` through the given backend.
    ///
    /// # Errors
    ///
    /// Returns `MapError::OpenFailed` if every attempt of the ladder failed.
    /// Returns `MapError::ResizeRefused` if a sized open found a non-empty file.
    /// Returns `MapError::TruncateFailed` if sizing the file failed.
    /// Returns `MapError::AccessFailed` if the metadata query failed.
    /// Returns `MapError::EmptyFile` for zero-length files when required non-empty.
    /// Returns `MapError::MapFailed` if mapping failed.
    pub fn open_with<P: AsRef<Path>, B: Backend>(&self, path: P, backend: B) -> Result<MappedFile<B>> {
        let path = path.as_ref();
        let (file, how) = self.open_handle(&backend, path)?;
        let created = how == OpenHow::CreateExclusive;
        let access = if how.is_writable() {
            AccessMode::ReadWrite
        } else {
            AccessMode::ReadOnly
        };

        match self.establish(&backend, file, access) {
            Ok((file, map, stat)) => {
                debug!(
                    "opened {} via {:?}: {} bytes, {:?}",
                    path.display(),
                    how,
                    stat.len,
                    access
                );
                Ok(MappedFile::from_parts(
                    backend,
                    path.to_path_buf(),
                    file,
                    access,
                    self.permissions,
                    map,
                    stat,
                ))
            }
            Err(err) => {
                if created {
                    if let Err(e) = backend.remove(path) {
                        warn!("could not remove {} after failed open: {e}", path.display());
                    }
                }
                Err(err)
            }
        }
    }

    /// Attempts tried in order until the OS hands out a descriptor.
    fn ladder(&self) -> &'static [OpenHow] {
        if self.permissions == 0 {
            &[OpenHow::ReadOnly]
        } else if self.initial_size > 0 {
            &[OpenHow::CreateExclusive, OpenHow::ReadWrite]
        } else {
            &[OpenHow::ReadWriteCreate, OpenHow::ReadOnly, OpenHow::CreateExclusive]
        }
    }

    fn open_handle<B: Backend>(&self, backend: &B, path: &Path) -> Result<(File, OpenHow)> {
        let mut last = None;
        for &how in self.ladder() {
            match backend.open(path, how, self.permissions) {
                Ok(file) => return Ok((file, how)),
                Err(e) => {
                    warn!("open {} via {how:?} failed: {e}", path.display());
                    last = Some(e);
                }
            }
        }
        let source = last.unwrap_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound));
        Err(MapError::OpenFailed { source })
    }

    /// Everything after the descriptor exists: stat, optional sizing, map.
    fn establish<B: Backend>(
        &self,
        backend: &B,
        file: File,
        access: AccessMode,
    ) -> Result<(File, Option<Mapping>, Stat)> {
        let stat_file = |file: &File| {
            backend
                .stat(file)
                .map_err(|source| MapError::AccessFailed { source })
        };
        let mut stat = stat_file(&file)?;

        if self.initial_size > 0 && access == AccessMode::ReadWrite {
            if stat.len != 0 {
                return Err(MapError::ResizeRefused);
            }
            backend
                .set_len(&file, self.initial_size)
                .map_err(|source| MapError::TruncateFailed { source })?;
            stat = stat_file(&file)?;
        }

        let map = if stat.len == 0 {
            if self.require_non_empty {
                return Err(MapError::EmptyFile);
            }
            None
        } else {
            let writable = access == AccessMode::ReadWrite;
            Some(
                backend
                    .map(&file, stat.len, writable)
                    .map_err(|source| MapError::MapFailed { source })?,
            )
        };

        Ok((file, map, stat))
    }
}
