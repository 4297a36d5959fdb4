//! # tiffbuf
//!
//! Coordination between in-memory pixel buffers and tag-indexed,
//! scanline-oriented container files.
//!
//! The container codec itself (file opening, scanline encoding, tag
//! marshaling) is an external collaborator consumed through the
//! [`container::Container`] / [`container::ContainerHandle`] traits. This
//! crate owns everything around it:
//!
//! - [`Attributes`] - attribute store kept consistent with the container's
//!   tag table, buffering writes while no handle is bound
//! - [`scanline`] - row-range transfers with per-row stride validation
//! - [`TiffImage`] - the image handle tying buffer, attributes, and file
//!   lifecycle together across read-existing, write-new, and in-memory
//!   modes
//! - [`RawContainer`] - a file-backed reference backend for tests and
//!   small tools
//!
//! ## Life cycle
//!
//! ```text
//! from_file ──► Bound(Read)  ──read()──► buffer
//! create    ──► Bound(Write) ◄─write()── buffer
//! new       ──► Unbound ──open(path, mode)──► Bound (pending drained)
//!                                 close() releases the handle
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use tiffbuf::{RawContainer, TiffImage};
//! use tiffbuf_core::Size;
//!
//! # fn main() -> tiffbuf::TiffResult<()> {
//! // Write a 3-channel, 8-bit image.
//! let mut out: TiffImage<u8, _> =
//!     TiffImage::create(RawContainer, "gradient.tbc", Size::new(256, 256), false)?;
//! for mut pixel in out.pixels_mut() {
//!     let x = pixel.index() % 256;
//!     pixel.set(0, x as u8);
//! }
//! out.write()?;
//! out.close()?;
//!
//! // Read it back.
//! let mut image: TiffImage<u8, _> = TiffImage::from_file(RawContainer, "gradient.tbc")?;
//! image.read()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod attrs;
pub mod container;
pub mod error;
pub mod image;
pub mod scanline;
pub mod tag;

// Re-exports for convenience
pub use attrs::{Attributes, CoreAttributes};
pub use container::{Container, ContainerHandle, OpenMode, RawContainer, RawHandle};
pub use error::{TiffError, TiffResult};
pub use image::TiffImage;
pub use scanline::Direction;
pub use tag::{Tag, TagValue};

// Core types, re-exported so most callers need only this crate.
pub use tiffbuf_core::{Pixel, PixelBuffer, PixelMut, Pixels, PixelsMut, Sample, Size};
