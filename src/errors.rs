//! Crate-specific error types for mmap-edit.

use std::io;
use std::path::Path;

use thiserror::Error;

/// Result alias for mmap-edit operations.
pub type Result<T> = std::result::Result<T, MapError>;

/// Error type covering the open, map and resize lifecycle of a [`MappedFile`].
///
/// `Display` renders the short single-line message. Use
/// [`MapError::describe_long`] for the multi-line report that names the file.
///
/// [`MappedFile`]: crate::MappedFile
#[derive(Debug, Error)]
pub enum MapError {
    /// No handle could be obtained under any step of the open ladder.
    #[error("Can't open: {source}")]
    OpenFailed {
        /// Error of the last attempt.
        #[source]
        source: io::Error,
    },

    /// Querying file metadata failed.
    #[error("Can't access: {source}")]
    AccessFailed {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Establishing or resizing the mapping failed.
    #[error("Can't map: {source}")]
    MapFailed {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// The file is zero-length and the caller asked for a non-empty file.
    #[error("File empty")]
    EmptyFile,

    /// A mutating operation was attempted on a read-only instance.
    #[error("Operation not permitted: readonly file")]
    ReadOnlyViolation,

    /// Resizing the file itself failed. Nothing changed.
    #[error("Can't truncate: {source}")]
    TruncateFailed {
        /// Underlying OS error.
        #[source]
        source: io::Error,
    },

    /// Flushing failed but the mapping was rolled back to its previous size.
    #[error("Sync error: {source}")]
    SyncFailed {
        /// Error returned by the flush.
        #[source]
        source: io::Error,
    },

    /// Flushing failed and so did the rollback. The instance is now read-only.
    #[error("I/O broken: {source}")]
    IoFatal {
        /// Error returned by the failed rollback.
        #[source]
        source: io::Error,
    },

    /// A sized open found an existing file that is not empty.
    #[error("Truncating not permitted: file non-empty")]
    ResizeRefused,

    /// The instance has been closed.
    #[error("Operation not permitted: file closed")]
    Closed,

    /// A requested offset/length pair lies beyond the mapped size.
    #[error("range out of bounds: offset={offset}, len={len}, total={total}")]
    OutOfBounds {
        /// Requested offset.
        offset: u64,
        /// Requested length.
        len: u64,
        /// Current size of the mapped file.
        total: u64,
    },
}

/// Fieldless mirror of [`MapError`] for matching and kind-only messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`MapError::OpenFailed`].
    OpenFailed,
    /// See [`MapError::AccessFailed`].
    AccessFailed,
    /// See [`MapError::MapFailed`].
    MapFailed,
    /// See [`MapError::EmptyFile`].
    EmptyFile,
    /// See [`MapError::ReadOnlyViolation`].
    ReadOnlyViolation,
    /// See [`MapError::TruncateFailed`].
    TruncateFailed,
    /// See [`MapError::SyncFailed`].
    SyncFailed,
    /// See [`MapError::IoFatal`].
    IoFatal,
    /// See [`MapError::ResizeRefused`].
    ResizeRefused,
    /// See [`MapError::Closed`].
    Closed,
    /// See [`MapError::OutOfBounds`].
    OutOfBounds,
}

impl ErrorKind {
    /// Short message for the kind alone, without OS detail.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            ErrorKind::OpenFailed => "Can't open",
            ErrorKind::AccessFailed => "Can't access",
            ErrorKind::MapFailed => "Can't map",
            ErrorKind::EmptyFile => "File empty",
            ErrorKind::ReadOnlyViolation => "Operation not permitted: readonly file",
            ErrorKind::TruncateFailed => "Can't truncate",
            ErrorKind::SyncFailed => "Sync error",
            ErrorKind::IoFatal => "I/O broken",
            ErrorKind::ResizeRefused => "Truncating not permitted: file non-empty",
            ErrorKind::Closed => "Operation not permitted: file closed",
            ErrorKind::OutOfBounds => "Range out of bounds",
        }
    }

    /// Whether the instance that produced this kind is still fully consistent
    /// and may be used for further writes.
    #[must_use]
    pub fn is_recoverable(self) -> bool {
        matches!(
            self,
            ErrorKind::TruncateFailed
                | ErrorKind::SyncFailed
                | ErrorKind::EmptyFile
                | ErrorKind::ResizeRefused
                | ErrorKind::OutOfBounds
        )
    }
}

impl MapError {
    /// The kind of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            MapError::OpenFailed { .. } => ErrorKind::OpenFailed,
            MapError::AccessFailed { .. } => ErrorKind::AccessFailed,
            MapError::MapFailed { .. } => ErrorKind::MapFailed,
            MapError::EmptyFile => ErrorKind::EmptyFile,
            MapError::ReadOnlyViolation => ErrorKind::ReadOnlyViolation,
            MapError::TruncateFailed { .. } => ErrorKind::TruncateFailed,
            MapError::SyncFailed { .. } => ErrorKind::SyncFailed,
            MapError::IoFatal { .. } => ErrorKind::IoFatal,
            MapError::ResizeRefused => ErrorKind::ResizeRefused,
            MapError::Closed => ErrorKind::Closed,
            MapError::OutOfBounds { .. } => ErrorKind::OutOfBounds,
        }
    }

    /// Multi-line report naming the file, for terminals and logs.
    ///
    /// Sync failures carry the journaling caveat; the read-only degradation is
    /// announced explicitly. Every line ends with a newline.
    #[must_use]
    pub fn describe_long(&self, name: &Path) -> String {
        let name = name.display();
        match self {
            MapError::OpenFailed { source } => format!("Can't open {name}: {source}\n"),
            MapError::AccessFailed { source } => format!("Can't access {name}: {source}\n"),
            MapError::MapFailed { source } => format!("Can't map {name}: {source}\n"),
            MapError::EmptyFile => format!("File empty: {name}\n"),
            MapError::IoFatal { source } => {
                format!("I/O broken: {source}\nGoing into readonly mode!\n")
            }
            MapError::SyncFailed { source } => format!(
                "Can't sync with: {name}\n\
                 Journaling may be unsupported.\n\
                 Filesystems that do not support journaling are e.g.: fat, ext, ntfs\n\
                 Sync error: {source}\n"
            ),
            other => format!("{other}\n"),
        }
    }
}
