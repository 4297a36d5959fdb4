//! Error types for container coordination.
//!
//! Every failure is returned to the caller as a typed result; nothing is
//! retried and nothing aborts the process. Failures carry the tag or row
//! they occurred on so callers can report precisely what went wrong.

use crate::tag::Tag;
use thiserror::Error;

/// Result type alias using [`TiffError`] as the error type.
pub type TiffResult<T> = std::result::Result<T, TiffError>;

/// Errors surfaced by the coordination layer.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TiffError {
    /// The container backend could not open the path.
    #[error("container could not be opened")]
    Open,

    /// A tag read against a bound handle failed.
    #[error("failed to read tag {tag}")]
    TagRead {
        /// Tag that could not be read.
        tag: Tag,
    },

    /// A tag write against a bound handle failed.
    #[error("failed to write tag {tag}")]
    TagWrite {
        /// Tag that could not be written.
        tag: Tag,
    },

    /// The container backend failed to decode a scanline.
    #[error("failed to read scanline {row}")]
    ScanlineRead {
        /// Row the transfer stopped on.
        row: u32,
    },

    /// The container backend failed to encode a scanline.
    #[error("failed to write scanline {row}")]
    ScanlineWrite {
        /// Row the transfer stopped on.
        row: u32,
    },

    /// The container backend failed to flush buffered state.
    #[error("container flush failed")]
    Flush,

    /// The operation needs a bound container handle but none exists, or
    /// the binding state otherwise disagrees with the requested operation.
    #[error("operation requires a bound container handle")]
    InvalidReference,

    /// The channel type's width disagrees with the declared bits per
    /// sample.
    #[error("channel type does not match declared {declared_bits} bits per sample")]
    ChannelSizeMismatch {
        /// Bits per sample the attribute set declares.
        declared_bits: u32,
    },

    /// Scanline geometry reported by the container disagrees with the
    /// buffer, or a requested row lies outside the buffer.
    #[error("scanline geometry disagrees with buffer at row {row}")]
    InternalInconsistency {
        /// First row the mismatch was detected on.
        row: u32,
    },
}

impl TiffError {
    /// Returns `true` for faults in tag traffic (read or write).
    #[inline]
    pub fn is_tag_error(&self) -> bool {
        matches!(self, Self::TagRead { .. } | Self::TagWrite { .. })
    }

    /// Returns `true` for faults raised during scanline transfers.
    #[inline]
    pub fn is_scanline_error(&self) -> bool {
        matches!(
            self,
            Self::ScanlineRead { .. } | Self::ScanlineWrite { .. } | Self::InternalInconsistency { .. }
        )
    }
}
