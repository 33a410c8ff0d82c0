//! Bounds helpers for callers that address the mapped region by offset.
//!
//! The mapped region is not bounds-checked per access by [`MappedFile`];
//! front ends validate every offset against the current size with these
//! before touching the bytes, since a resize may have shrunk the file.
//!
//! [`MappedFile`]: crate::MappedFile

use std::ops::Range;

use crate::errors::{MapError, Result};

/// Check that `len` bytes starting at `offset` fit in a region of `total` bytes.
/// An empty access at exactly `total` is allowed.
///
/// # Errors
///
/// Returns `MapError::OutOfBounds` past the end, including on `u64` overflow.
pub fn ensure_in_bounds(offset: u64, len: u64, total: u64) -> Result<()> {
    if offset > total {
        return Err(MapError::OutOfBounds { offset, len, total });
    }
    match offset.checked_add(len) {
        Some(end) if end <= total => Ok(()),
        _ => Err(MapError::OutOfBounds { offset, len, total }),
    }
}

/// Index range of `len` bytes at `offset` inside a region of `total` bytes,
/// ready to slice the mapping with.
///
/// # Errors
///
/// Returns `MapError::OutOfBounds` when the bytes do not all lie inside the region.
#[allow(clippy::cast_possible_truncation)]
pub fn slice_range(offset: u64, len: u64, total: u64) -> Result<Range<usize>> {
    ensure_in_bounds(offset, len, total)?;
    // checked against a mapped length, which is itself a usize
    let start = offset as usize;
    Ok(start..start + len as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_ranges_ending_at_total() {
        assert!(ensure_in_bounds(0, 16, 16).is_ok());
        assert!(ensure_in_bounds(16, 0, 16).is_ok());
        assert_eq!(slice_range(4, 4, 16).unwrap(), 4..8);
    }

    #[test]
    fn rejects_overflowing_ranges() {
        assert!(ensure_in_bounds(17, 0, 16).is_err());
        assert!(ensure_in_bounds(8, 9, 16).is_err());
        assert!(matches!(
            ensure_in_bounds(1, u64::MAX, 16),
            Err(MapError::OutOfBounds { offset: 1, total: 16, .. })
        ));
    }
}
