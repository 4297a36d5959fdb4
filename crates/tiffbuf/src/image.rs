//! The image handle: buffer, attributes, and file lifecycle in one place.
//!
//! [`TiffImage`] composes a [`PixelBuffer`], an [`Attributes`] store, and
//! an optional container binding. Construction selects one of three modes:
//!
//! - [`from_file`](TiffImage::from_file) - read an existing container;
//!   the store starts bound and the buffer is sized from the file's
//!   attributes.
//! - [`create`](TiffImage::create) - write a new container; attributes are
//!   forwarded immediately and the buffer is sized from the caller's
//!   geometry.
//! - [`new`](TiffImage::new) - build the image purely in memory; attribute
//!   writes are buffered until [`open`](TiffImage::open) binds a file and
//!   drains them.
//!
//! Scanline transfers run only while a handle is bound.
//! [`close`](TiffImage::close) flushes and releases the handle and is
//! idempotent; dropping the image performs the same teardown. The buffer
//! is released exactly once by ordinary ownership, however the image goes
//! away.
//!
//! # Example
//!
//! ```rust,no_run
//! use tiffbuf::{OpenMode, RawContainer, TiffImage};
//! use tiffbuf_core::Size;
//!
//! # fn main() -> tiffbuf::TiffResult<()> {
//! let mut image: TiffImage<u8, _> = TiffImage::new(RawContainer, Size::new(100, 100), false);
//! for mut pixel in image.pixels_mut() {
//!     pixel.set(0, 255);
//! }
//! image.open("out.tbc", OpenMode::Write)?;
//! image.write()?;
//! image.close()?;
//! # Ok(())
//! # }
//! ```

use crate::attrs::{Attributes, CoreAttributes};
use crate::container::{Container, ContainerHandle, OpenMode};
use crate::error::{TiffError, TiffResult};
use crate::scanline::{self, Direction};
use crate::tag::EXTRASAMPLE_ASSOCIATED_ALPHA;
use std::fmt;
use std::ops::Range;
use std::path::{Path, PathBuf};
use tiffbuf_core::{Pixel, PixelBuffer, PixelMut, Pixels, PixelsMut, Sample, Size};

/// A scanline image coordinated with a tag-indexed container file.
pub struct TiffImage<T: Sample, C: Container> {
    container: C,
    path: Option<PathBuf>,
    mode: Option<OpenMode>,
    attrs: Attributes<C::Handle>,
    buffer: PixelBuffer<T>,
}

impl<T: Sample, C: Container> TiffImage<T, C> {
    /// Opens an existing container for reading.
    ///
    /// Attributes are read from the file and the buffer is sized from
    /// them. Pixel data is not transferred; call [`read`](Self::read).
    ///
    /// # Errors
    ///
    /// - [`TiffError::Open`] when the container cannot open the path.
    /// - [`TiffError::TagRead`] when a core attribute is absent.
    /// - [`TiffError::ChannelSizeMismatch`] when the file's declared bits
    ///   per sample does not match `T`; checked before any allocation or
    ///   scanline I/O.
    pub fn from_file(container: C, path: impl AsRef<Path>) -> TiffResult<Self> {
        let path = path.as_ref().to_path_buf();
        let handle = container
            .open(&path, OpenMode::Read)
            .ok_or(TiffError::Open)?;
        let attrs = Attributes::from_existing(handle)?;

        let declared = attrs.bits_per_sample();
        if declared != Self::channel_bits() {
            return Err(TiffError::ChannelSizeMismatch {
                declared_bits: declared,
            });
        }
        let samples = attrs.samples_per_pixel();
        if samples == 0 {
            return Err(TiffError::TagRead {
                tag: crate::tag::Tag::SAMPLES_PER_PIXEL,
            });
        }

        let buffer = PixelBuffer::new(attrs.size(), samples as usize);
        Ok(Self {
            container,
            path: Some(path),
            mode: Some(OpenMode::Read),
            attrs,
            buffer,
        })
    }

    /// Creates a new container for writing.
    ///
    /// The standard RGB attribute set for `size` (plus an associated-alpha
    /// channel when `has_alpha` is set) is forwarded to the container
    /// immediately, in canonical order.
    ///
    /// # Errors
    ///
    /// - [`TiffError::Open`] when the path cannot be created.
    /// - [`TiffError::TagWrite`] when the container rejects an attribute;
    ///   the handle is released before returning.
    pub fn create(
        container: C,
        path: impl AsRef<Path>,
        size: Size,
        has_alpha: bool,
    ) -> TiffResult<Self> {
        let path = path.as_ref().to_path_buf();
        let handle = container
            .open(&path, OpenMode::Write)
            .ok_or(TiffError::Open)?;
        let values = CoreAttributes::rgb(size, Self::channel_bits(), has_alpha);
        let samples = values.samples_per_pixel as usize;
        let attrs = Attributes::from_values(values, handle)?;

        Ok(Self {
            container,
            path: Some(path),
            mode: Some(OpenMode::Write),
            attrs,
            buffer: PixelBuffer::new(size, samples),
        })
    }

    /// Builds an image purely in memory, to be bound later via
    /// [`open`](Self::open).
    ///
    /// No external API is touched; attribute values are buffered in the
    /// unbound store.
    pub fn new(container: C, size: Size, has_alpha: bool) -> Self {
        let values = CoreAttributes::rgb(size, Self::channel_bits(), has_alpha);
        let samples = values.samples_per_pixel as usize;
        Self {
            container,
            path: None,
            mode: None,
            attrs: Attributes::new_unbound(values),
            buffer: PixelBuffer::new(size, samples),
        }
    }

    /// Binds an unbound image to a container file, draining every buffered
    /// attribute to it in canonical order.
    ///
    /// # Errors
    ///
    /// - [`TiffError::InvalidReference`] when a handle is already bound.
    /// - [`TiffError::Open`] when the container cannot open the path.
    /// - [`TiffError::TagWrite`] when forwarding an attribute fails; the
    ///   image stays unbound.
    /// - [`TiffError::ChannelSizeMismatch`] when the buffered bits per
    ///   sample no longer matches `T`; the just-bound handle is released.
    pub fn open(&mut self, path: impl AsRef<Path>, mode: OpenMode) -> TiffResult<()> {
        if self.attrs.is_bound() {
            return Err(TiffError::InvalidReference);
        }
        let path = path.as_ref().to_path_buf();
        let handle = self.container.open(&path, mode).ok_or(TiffError::Open)?;
        self.attrs.bind(handle)?;

        let declared = self.attrs.bits_per_sample();
        if declared != Self::channel_bits() {
            drop(self.attrs.detach());
            return Err(TiffError::ChannelSizeMismatch {
                declared_bits: declared,
            });
        }

        self.path = Some(path);
        self.mode = Some(mode);
        Ok(())
    }

    /// Reads every scanline in `[0, height)` into the buffer.
    pub fn read(&mut self) -> TiffResult<()> {
        let height = self.buffer.size().height;
        self.read_rows(0..height)
    }

    /// Reads the scanlines in `rows` into the buffer, in ascending order.
    ///
    /// # Errors
    ///
    /// [`TiffError::InvalidReference`] when no handle is bound; otherwise
    /// the scanline-engine faults. Rows already read stay read.
    pub fn read_rows(&mut self, rows: Range<u32>) -> TiffResult<()> {
        let Some(handle) = self.attrs.handle_mut() else {
            return Err(TiffError::InvalidReference);
        };
        scanline::transfer(Direction::Read, handle, &mut self.buffer, rows)
    }

    /// Writes every scanline in `[0, height)` and flushes the container.
    pub fn write(&mut self) -> TiffResult<()> {
        let height = self.buffer.size().height;
        self.write_rows(0..height)?;
        self.flush()
    }

    /// Writes the scanlines in `rows`, in ascending order.
    ///
    /// # Errors
    ///
    /// [`TiffError::InvalidReference`] when no handle is bound; otherwise
    /// the scanline-engine faults. Rows already written stay written.
    pub fn write_rows(&mut self, rows: Range<u32>) -> TiffResult<()> {
        let Some(handle) = self.attrs.handle_mut() else {
            return Err(TiffError::InvalidReference);
        };
        scanline::transfer(Direction::Write, handle, &mut self.buffer, rows)
    }

    /// Flushes the bound container handle.
    ///
    /// # Errors
    ///
    /// [`TiffError::InvalidReference`] when no handle is bound;
    /// [`TiffError::Flush`] when the codec reports failure.
    pub fn flush(&mut self) -> TiffResult<()> {
        scanline::flush(self.attrs.handle_mut())
    }

    /// Flushes and releases the container handle.
    ///
    /// Idempotent: with no handle bound this is a no-op, not an error. The
    /// handle is released even when the final flush fails.
    pub fn close(&mut self) -> TiffResult<()> {
        let Some(mut handle) = self.attrs.detach() else {
            return Ok(());
        };
        let flushed = handle.flush();
        drop(handle);
        self.mode = None;
        if flushed { Ok(()) } else { Err(TiffError::Flush) }
    }

    /// Image dimensions.
    #[inline]
    pub fn size(&self) -> Size {
        self.buffer.size()
    }

    /// Channel elements per pixel.
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.buffer.samples_per_pixel()
    }

    /// Returns `true` when the extra channels carry associated alpha.
    pub fn has_alpha(&self) -> bool {
        self.attrs
            .extra_samples()
            .contains(&EXTRASAMPLE_ASSOCIATED_ALPHA)
    }

    /// Path of the bound or previously bound container file.
    #[inline]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Mode of the current binding, or `None` while unbound.
    #[inline]
    pub fn mode(&self) -> Option<OpenMode> {
        self.mode
    }

    /// Returns `true` while a container handle is bound.
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.attrs.is_bound()
    }

    /// The attribute store.
    #[inline]
    pub fn attributes(&self) -> &Attributes<C::Handle> {
        &self.attrs
    }

    /// Mutable access to the attribute store.
    #[inline]
    pub fn attributes_mut(&mut self) -> &mut Attributes<C::Handle> {
        &mut self.attrs
    }

    /// The pixel buffer.
    #[inline]
    pub fn buffer(&self) -> &PixelBuffer<T> {
        &self.buffer
    }

    /// Mutable access to the pixel buffer.
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut PixelBuffer<T> {
        &mut self.buffer
    }

    /// The channel group of one pixel.
    ///
    /// # Panics
    ///
    /// Panics if `index >= width * height`.
    #[inline]
    pub fn pixel(&self, index: usize) -> Pixel<'_, T> {
        self.buffer.pixel(index)
    }

    /// Mutable channel group of one pixel.
    ///
    /// # Panics
    ///
    /// Panics if `index >= width * height`.
    #[inline]
    pub fn pixel_mut(&mut self, index: usize) -> PixelMut<'_, T> {
        self.buffer.pixel_mut(index)
    }

    /// Iterates all pixels in index order.
    #[inline]
    pub fn pixels(&self) -> Pixels<'_, T> {
        self.buffer.pixels()
    }

    /// Iterates all pixels mutably in index order.
    #[inline]
    pub fn pixels_mut(&mut self) -> PixelsMut<'_, T> {
        self.buffer.pixels_mut()
    }

    const fn channel_bits() -> u32 {
        8 * T::BYTES as u32
    }
}

impl<T: Sample, C: Container> Drop for TiffImage<T, C> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(%err, "image close during drop failed");
        }
    }
}

impl<T: Sample, C: Container> fmt::Debug for TiffImage<T, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TiffImage")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("size", &self.size())
            .field("channels", &self.channel_count())
            .field("bound", &self.is_bound())
            .finish()
    }
}
