//! # tiffbuf-core
//!
//! Foundational types for the tiffbuf workspace.
//!
//! This crate provides the value types the coordination layer is built on:
//!
//! - [`Size`] - image dimensions in pixels
//! - [`Sample`] - fixed-width channel element trait (u8, u16, u32, f16, f32)
//! - [`PixelBuffer`] - owned, fixed-capacity channel storage
//! - [`Pixel`], [`PixelMut`] - non-owning views of one pixel's channel group
//!
//! ## Crate Structure
//!
//! `tiffbuf-core` has no internal dependencies; the `tiffbuf` crate layers
//! the attribute store, scanline engine, and image handle on top of it:
//!
//! ```text
//! tiffbuf-core (this crate)
//!    ^
//!    |
//!    +-- tiffbuf (container traits, attribute store, image handle)
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod buffer;
pub mod error;
pub mod geometry;
pub mod sample;

// Re-exports for convenience
pub use buffer::{Pixel, PixelBuffer, PixelMut, Pixels, PixelsMut};
pub use error::{BufferError, Result};
pub use geometry::Size;
pub use sample::Sample;
