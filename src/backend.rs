//! The OS seam: opening, truncating, mapping and syncing a file.
//!
//! [`MappedFile`] never calls the OS directly. Every fallible step of its open
//! and resize sequences goes through a [`Backend`], so each step can fail in
//! isolation under test. [`OsBackend`] is the real implementation.
//!
//! [`MappedFile`]: crate::MappedFile

use std::fs::{self, File, Metadata, OpenOptions};
use std::io;
use std::path::Path;
use std::time::SystemTime;

use memmap2::{Mmap, MmapMut, MmapOptions};

/// Permission bits used when a file is created. `0` means read-only intent.
pub type Mode = libc::mode_t;

/// How a single attempt of the open ladder asks the OS for a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenHow {
    /// Existing file, read access only.
    ReadOnly,
    /// Existing file, read and write access.
    ReadWrite,
    /// Read and write access, creating the file when absent.
    ReadWriteCreate,
    /// Read and write access, the file must not exist yet.
    CreateExclusive,
}

impl OpenHow {
    /// Whether a handle opened this way can write.
    #[must_use]
    pub fn is_writable(self) -> bool {
        !matches!(self, OpenHow::ReadOnly)
    }
}

/// Metadata cached by a [`MappedFile`](crate::MappedFile) after each mutating operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stat {
    /// File length in bytes.
    pub len: u64,
    /// Inode number (0 where the platform has none).
    pub inode: u64,
    /// Device the file lives on (0 where the platform has none).
    pub device: u64,
    /// Permission bits as reported by the filesystem.
    pub permissions: u32,
    /// Last modification time, when the filesystem records one.
    pub modified: Option<SystemTime>,
}

impl Stat {
    /// Build from `std` metadata.
    #[must_use]
    pub fn from_metadata(meta: &Metadata) -> Self {
        let (inode, device, permissions) = platform_ids(meta);
        Self {
            len: meta.len(),
            inode,
            device,
            permissions,
            modified: meta.modified().ok(),
        }
    }
}

#[cfg(unix)]
fn platform_ids(meta: &Metadata) -> (u64, u64, u32) {
    use std::os::unix::fs::MetadataExt;
    (meta.ino(), meta.dev(), meta.mode())
}

#[cfg(not(unix))]
fn platform_ids(meta: &Metadata) -> (u64, u64, u32) {
    (0, 0, if meta.permissions().readonly() { 0o444 } else { 0o644 })
}

/// A live mapping of a file, read-only or writable.
#[derive(Debug)]
pub enum Mapping {
    /// Shared read-only mapping.
    ReadOnly(Mmap),
    /// Shared writable mapping.
    ReadWrite(MmapMut),
}

impl Mapping {
    /// Mapped length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// Whether the mapping is zero bytes long.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Mapped bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Mapping::ReadOnly(m) => &m[..],
            Mapping::ReadWrite(m) => &m[..],
        }
    }

    /// Mapped bytes, writable. `None` for read-only mappings.
    pub fn as_mut_slice(&mut self) -> Option<&mut [u8]> {
        match self {
            Mapping::ReadOnly(_) => None,
            Mapping::ReadWrite(m) => Some(&mut m[..]),
        }
    }
}

/// Operations [`MappedFile`](crate::MappedFile) needs from the operating system.
///
/// Implementations must leave `map` untouched when [`Backend::remap`] fails.
pub trait Backend {
    /// Open `path` as requested; `mode` applies only when the file is created.
    fn open(&self, path: &Path, how: OpenHow, mode: Mode) -> io::Result<File>;

    /// Query metadata of an open file.
    fn stat(&self, file: &File) -> io::Result<Stat>;

    /// Truncate or extend the file to `len` bytes.
    fn set_len(&self, file: &File, len: u64) -> io::Result<()>;

    /// Map the first `len` bytes of `file`. `len` is never zero.
    fn map(&self, file: &File, len: u64, writable: bool) -> io::Result<Mapping>;

    /// Resize `map` to `new_len` bytes, moving it if needed. `new_len` is never zero.
    fn remap(&self, file: &File, map: &mut Mapping, new_len: u64) -> io::Result<()>;

    /// Synchronously flush the mapping to storage.
    fn sync(&self, map: &Mapping) -> io::Result<()>;

    /// Unlink a file this crate created.
    fn remove(&self, path: &Path) -> io::Result<()>;
}

/// [`Backend`] that talks to the real filesystem through `std` and memmap2.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsBackend;

fn map_len(len: u64) -> io::Result<usize> {
    usize::try_from(len).map_err(|_| {
        io::Error::new(io::ErrorKind::InvalidInput, "length does not fit in the address space")
    })
}

impl Backend for OsBackend {
    fn open(&self, path: &Path, how: OpenHow, mode: Mode) -> io::Result<File> {
        let mut opts = OpenOptions::new();
        opts.read(true);
        match how {
            OpenHow::ReadOnly => {}
            OpenHow::ReadWrite => {
                opts.write(true);
            }
            OpenHow::ReadWriteCreate => {
                opts.write(true).create(true);
            }
            OpenHow::CreateExclusive => {
                opts.write(true).create_new(true);
            }
        }
        apply_mode(&mut opts, mode);
        opts.open(path)
    }

    fn stat(&self, file: &File) -> io::Result<Stat> {
        file.metadata().map(|meta| Stat::from_metadata(&meta))
    }

    fn set_len(&self, file: &File, len: u64) -> io::Result<()> {
        file.set_len(len)
    }

    fn map(&self, file: &File, len: u64, writable: bool) -> io::Result<Mapping> {
        let mut opts = MmapOptions::new();
        opts.len(map_len(len)?);
        // SAFETY: the mapping is shared with the file; concurrent modification
        // by other processes is the caller's concern, as for any mmap editor.
        unsafe {
            if writable {
                opts.map_mut(file).map(Mapping::ReadWrite)
            } else {
                opts.map(file).map(Mapping::ReadOnly)
            }
        }
    }

    fn remap(&self, file: &File, map: &mut Mapping, new_len: u64) -> io::Result<()> {
        cfg_if::cfg_if! {
            if #[cfg(target_os = "linux")] {
                let _ = file;
                remap_in_place(map, map_len(new_len)?)
            } else {
                let writable = matches!(map, Mapping::ReadWrite(_));
                *map = self.map(file, new_len, writable)?;
                Ok(())
            }
        }
    }

    fn sync(&self, map: &Mapping) -> io::Result<()> {
        match map {
            Mapping::ReadOnly(_) => Ok(()),
            Mapping::ReadWrite(m) => m.flush(),
        }
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

#[cfg(unix)]
#[allow(clippy::useless_conversion)]
fn apply_mode(opts: &mut OpenOptions, mode: Mode) {
    use std::os::unix::fs::OpenOptionsExt;
    opts.mode(u32::from(mode));
}

#[cfg(not(unix))]
fn apply_mode(_opts: &mut OpenOptions, _mode: Mode) {}

/// `mremap(2)` with `MREMAP_MAYMOVE`; the contents survive a relocation.
#[cfg(target_os = "linux")]
fn remap_in_place(map: &mut Mapping, new_len: usize) -> io::Result<()> {
    use memmap2::RemapOptions;

    let opts = RemapOptions::new().may_move(true);
    // SAFETY: the file already covers new_len and no borrow of the old
    // mapping can outlive the exclusive borrow held here.
    unsafe {
        match map {
            Mapping::ReadOnly(m) => m.remap(new_len, opts),
            Mapping::ReadWrite(m) => m.remap(new_len, opts),
        }
    }
}
