//! Error types for buffer operations.

use thiserror::Error;

/// Result type alias using [`BufferError`] as the error type.
pub type Result<T> = std::result::Result<T, BufferError>;

/// Errors that can occur while constructing or indexing a pixel buffer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// Pixel index is outside `[0, width * height)`.
    #[error("pixel index {index} out of range for buffer of {len} pixels")]
    IndexOutOfRange {
        /// Requested pixel index.
        index: usize,
        /// Number of pixels in the buffer.
        len: usize,
    },

    /// Row index is outside `[0, height)`.
    #[error("row {row} out of range for image height {height}")]
    RowOutOfRange {
        /// Requested row.
        row: u32,
        /// Buffer height in rows.
        height: u32,
    },

    /// Supplied element data does not match the buffer geometry.
    #[error("expected {expected} channel elements, got {actual}")]
    LengthMismatch {
        /// Element count implied by the geometry.
        expected: usize,
        /// Element count actually supplied.
        actual: usize,
    },
}

impl BufferError {
    /// Creates a [`BufferError::IndexOutOfRange`] error.
    #[inline]
    pub fn index_out_of_range(index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { index, len }
    }

    /// Creates a [`BufferError::LengthMismatch`] error.
    #[inline]
    pub fn length_mismatch(expected: usize, actual: usize) -> Self {
        Self::LengthMismatch { expected, actual }
    }
}
