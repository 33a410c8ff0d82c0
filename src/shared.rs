//! Serialized handle for several front ends on one file.
//!
//! [`MappedFile`] has no internal locking. When an editor and a viewer share
//! one file they go through a [`SharedMappedFile`] instead: region access holds
//! the read lock, resize holds the write lock, so no access can observe a
//! mapping that is being replaced.

use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::{Backend, OsBackend};
use crate::errors::Result;
use crate::mapped::MappedFile;

/// Cheaply clonable, lock-protected [`MappedFile`].
///
/// # Examples
///
/// ```no_run
/// use mmap_edit::{MappedFile, SharedMappedFile};
///
/// let shared = SharedMappedFile::new(MappedFile::open("blob.bin", 0o644)?);
/// let viewer = shared.clone();
///
/// shared.resize(4096)?;
/// let first = viewer.with_region(|bytes| bytes.first().copied());
/// # let _ = first;
/// # Ok::<(), mmap_edit::MapError>(())
/// ```
pub struct SharedMappedFile<B: Backend = OsBackend> {
    inner: Arc<RwLock<MappedFile<B>>>,
}

impl<B: Backend> Clone for SharedMappedFile<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: Backend> std::fmt::Debug for SharedMappedFile<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedMappedFile").field(&*self.inner.read()).finish()
    }
}

impl<B: Backend> SharedMappedFile<B> {
    /// Wrap an opened handle.
    pub fn new(file: MappedFile<B>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(file)),
        }
    }

    /// Current size in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.inner.read().size()
    }

    /// Whether writes and resizes are allowed.
    #[must_use]
    pub fn is_read_write(&self) -> bool {
        self.inner.read().is_read_write()
    }

    /// Run `f` over the mapped bytes under the read lock.
    pub fn with_region<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        f(self.inner.read().region())
    }

    /// Run `f` over the writable bytes under the write lock.
    ///
    /// # Errors
    ///
    /// Returns errors from [`MappedFile::region_mut`].
    pub fn with_region_mut<R>(&self, f: impl FnOnce(&mut [u8]) -> R) -> Result<R> {
        let mut guard = self.inner.write();
        Ok(f(guard.region_mut()?))
    }

    /// Resize under the write lock.
    ///
    /// # Errors
    ///
    /// Returns errors from [`MappedFile::resize`].
    pub fn resize(&self, new_size: u64) -> Result<()> {
        self.inner.write().resize(new_size)
    }

    /// Close under the write lock. Other clones observe a closed handle.
    pub fn close(&self) {
        self.inner.write().close();
    }

    /// Shared access to the handle.
    pub fn read(&self) -> RwLockReadGuard<'_, MappedFile<B>> {
        self.inner.read()
    }

    /// Exclusive access to the handle.
    pub fn write(&self) -> RwLockWriteGuard<'_, MappedFile<B>> {
        self.inner.write()
    }
}
