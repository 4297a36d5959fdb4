//! Attribute store synchronized with a container's tag table.
//!
//! [`Attributes`] owns the format attributes of one image and keeps them
//! consistent with the external tag API whether or not a container handle
//! currently exists. It is an explicit two-state machine:
//!
//! - **Unbound** - no handle; writes land in a pending map and always
//!   succeed locally.
//! - **Bound** - every write forwards immediately to the container and its
//!   result is surfaced.
//!
//! [`bind`](Attributes::bind) transitions unbound to bound, draining the
//! pending map in the canonical tag order (bitsPerSample, samplesPerPixel,
//! rowsPerStrip, photometric, planarconfig, orientation, width, height,
//! extraSamples), then any remaining buffered tags in ascending id order.
//!
//! Error discipline is uniformly strict: no write against a bound handle
//! is ever discarded. The core attribute values are additionally cached
//! locally so geometry queries work without a bound handle.

use crate::container::ContainerHandle;
use crate::error::{TiffError, TiffResult};
use crate::tag::{
    EXTRASAMPLE_ASSOCIATED_ALPHA, ORIENTATION_TOPLEFT, PHOTOMETRIC_RGB, PLANARCONFIG_CONTIG,
    Tag, TagValue,
};
use std::collections::BTreeMap;
use std::fmt;
use tiffbuf_core::Size;

/// Canonical forwarding order of the core scalar attributes. The
/// extra-samples list always follows these eight.
const CANONICAL_ORDER: [Tag; 8] = [
    Tag::BITS_PER_SAMPLE,
    Tag::SAMPLES_PER_PIXEL,
    Tag::ROWS_PER_STRIP,
    Tag::PHOTOMETRIC,
    Tag::PLANAR_CONFIG,
    Tag::ORIENTATION,
    Tag::IMAGE_WIDTH,
    Tag::IMAGE_LENGTH,
];

/// The core attribute values of one image, in one place.
///
/// Used to seed an [`Attributes`] store for write-new and in-memory
/// images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreAttributes {
    /// Bits per channel element.
    pub bits_per_sample: u32,
    /// Channel elements per pixel, extra samples included.
    pub samples_per_pixel: u32,
    /// Scanlines per storage strip.
    pub rows_per_strip: u32,
    /// Photometric interpretation of the base channels.
    pub photometric: u32,
    /// Channel interleaving of the stored data.
    pub planarconfig: u32,
    /// Visual orientation of row 0 / column 0.
    pub orientation: u32,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in scanlines.
    pub height: u32,
    /// Roles of the channels beyond the base color channels.
    pub extra_samples: Vec<u16>,
}

impl CoreAttributes {
    /// Standard interleaved RGB layout for the given geometry, with one
    /// associated-alpha extra channel when `has_alpha` is set.
    pub fn rgb(size: Size, bits_per_sample: u32, has_alpha: bool) -> Self {
        let extra_samples = if has_alpha {
            vec![EXTRASAMPLE_ASSOCIATED_ALPHA]
        } else {
            Vec::new()
        };
        Self {
            bits_per_sample,
            samples_per_pixel: 3 + extra_samples.len() as u32,
            rows_per_strip: 1,
            photometric: PHOTOMETRIC_RGB,
            planarconfig: PLANARCONFIG_CONTIG,
            orientation: ORIENTATION_TOPLEFT,
            width: size.width,
            height: size.height,
            extra_samples,
        }
    }

    /// The eight core scalars as a pending map.
    fn pending_map(&self) -> BTreeMap<Tag, TagValue> {
        BTreeMap::from([
            (Tag::BITS_PER_SAMPLE, TagValue::U32(self.bits_per_sample)),
            (Tag::SAMPLES_PER_PIXEL, TagValue::U32(self.samples_per_pixel)),
            (Tag::ROWS_PER_STRIP, TagValue::U32(self.rows_per_strip)),
            (Tag::PHOTOMETRIC, TagValue::U32(self.photometric)),
            (Tag::PLANAR_CONFIG, TagValue::U32(self.planarconfig)),
            (Tag::ORIENTATION, TagValue::U32(self.orientation)),
            (Tag::IMAGE_WIDTH, TagValue::U32(self.width)),
            (Tag::IMAGE_LENGTH, TagValue::U32(self.height)),
        ])
    }
}

/// Binding state of an attribute store.
enum Binding<H> {
    /// No container handle; writes are buffered until [`Attributes::bind`].
    Unbound { pending: BTreeMap<Tag, TagValue> },
    /// Every tag operation goes straight to the handle.
    Bound { handle: H },
}

/// Format attributes of one image, synchronized with the container's tag
/// table when a handle is bound.
pub struct Attributes<H: ContainerHandle> {
    binding: Binding<H>,
    bits_per_sample: u32,
    samples_per_pixel: u32,
    rows_per_strip: u32,
    photometric: u32,
    planarconfig: u32,
    orientation: u32,
    width: u32,
    height: u32,
    extra_samples: Vec<u16>,
}

fn write_tag<H: ContainerHandle>(handle: &mut H, tag: Tag, value: TagValue) -> TiffResult<()> {
    let ok = match value {
        TagValue::U16(v) => handle.set_tag_u16(tag, v),
        TagValue::U32(v) => handle.set_tag_u32(tag, v),
    };
    if ok { Ok(()) } else { Err(TiffError::TagWrite { tag }) }
}

/// Forwards `pending` to `handle`: canonical scalars first, then the
/// extra-samples list, then everything else in ascending id order.
fn drain_pending<H: ContainerHandle>(
    handle: &mut H,
    pending: &mut BTreeMap<Tag, TagValue>,
    extra_samples: &[u16],
) -> TiffResult<()> {
    for tag in CANONICAL_ORDER {
        if let Some(value) = pending.remove(&tag) {
            write_tag(handle, tag, value)?;
        }
    }
    if !handle.set_extra_samples(extra_samples) {
        return Err(TiffError::TagWrite {
            tag: Tag::EXTRA_SAMPLES,
        });
    }
    for (&tag, &value) in pending.iter() {
        write_tag(handle, tag, value)?;
    }
    pending.clear();
    Ok(())
}

impl<H: ContainerHandle> Attributes<H> {
    /// Reads the full attribute set from an open container.
    ///
    /// The resulting store is bound to `handle`. A file without the
    /// extra-samples tag simply has no extra channels.
    ///
    /// # Errors
    ///
    /// Returns [`TiffError::TagRead`] naming the first core tag that could
    /// not be read; the handle is released.
    pub fn from_existing(handle: H) -> TiffResult<Self> {
        let read = |tag: Tag| handle.tag_u32(tag).ok_or(TiffError::TagRead { tag });
        let bits_per_sample = read(Tag::BITS_PER_SAMPLE)?;
        let samples_per_pixel = read(Tag::SAMPLES_PER_PIXEL)?;
        let rows_per_strip = read(Tag::ROWS_PER_STRIP)?;
        let photometric = read(Tag::PHOTOMETRIC)?;
        let planarconfig = read(Tag::PLANAR_CONFIG)?;
        let orientation = read(Tag::ORIENTATION)?;
        let width = read(Tag::IMAGE_WIDTH)?;
        let height = read(Tag::IMAGE_LENGTH)?;
        let extra_samples = handle.extra_samples().unwrap_or_default();
        Ok(Self {
            binding: Binding::Bound { handle },
            bits_per_sample,
            samples_per_pixel,
            rows_per_strip,
            photometric,
            planarconfig,
            orientation,
            width,
            height,
            extra_samples,
        })
    }

    /// Seeds a bound store, writing every value to `handle` immediately in
    /// canonical order.
    ///
    /// # Errors
    ///
    /// Returns [`TiffError::TagWrite`] naming the first attribute the
    /// container rejected; the handle is released and nothing is
    /// constructed.
    pub fn from_values(values: CoreAttributes, mut handle: H) -> TiffResult<Self> {
        let mut pending = values.pending_map();
        drain_pending(&mut handle, &mut pending, &values.extra_samples)?;
        Ok(Self::assemble(values, Binding::Bound { handle }))
    }

    /// Seeds an unbound store; the values populate the pending map and no
    /// external API is touched.
    pub fn new_unbound(values: CoreAttributes) -> Self {
        let pending = values.pending_map();
        Self::assemble(values, Binding::Unbound { pending })
    }

    fn assemble(values: CoreAttributes, binding: Binding<H>) -> Self {
        Self {
            binding,
            bits_per_sample: values.bits_per_sample,
            samples_per_pixel: values.samples_per_pixel,
            rows_per_strip: values.rows_per_strip,
            photometric: values.photometric,
            planarconfig: values.planarconfig,
            orientation: values.orientation,
            width: values.width,
            height: values.height,
            extra_samples: values.extra_samples,
        }
    }

    /// Transitions unbound to bound, draining the pending map to `handle`.
    ///
    /// # Errors
    ///
    /// [`TiffError::InvalidReference`] if the store is already bound.
    /// [`TiffError::TagWrite`] if the container rejects an attribute; the
    /// transition is aborted, the handle released, and the pending map
    /// left untouched.
    pub fn bind(&mut self, mut handle: H) -> TiffResult<()> {
        let Binding::Unbound { pending } = &self.binding else {
            return Err(TiffError::InvalidReference);
        };
        let mut staged = pending.clone();
        drain_pending(&mut handle, &mut staged, &self.extra_samples)?;
        tracing::debug!("attribute store bound, pending tags drained");
        self.binding = Binding::Bound { handle };
        Ok(())
    }

    /// Sets a 16-bit tag: forwarded when bound, buffered when unbound.
    pub fn set_u16(&mut self, tag: Tag, value: u16) -> TiffResult<()> {
        match &mut self.binding {
            Binding::Bound { handle } => {
                if !handle.set_tag_u16(tag, value) {
                    return Err(TiffError::TagWrite { tag });
                }
            }
            Binding::Unbound { pending } => {
                pending.insert(tag, TagValue::U16(value));
            }
        }
        Ok(())
    }

    /// Sets a 32-bit tag: forwarded when bound, buffered when unbound.
    ///
    /// Core attributes keep their local cache in step with the write.
    pub fn set_u32(&mut self, tag: Tag, value: u32) -> TiffResult<()> {
        match &mut self.binding {
            Binding::Bound { handle } => {
                if !handle.set_tag_u32(tag, value) {
                    return Err(TiffError::TagWrite { tag });
                }
            }
            Binding::Unbound { pending } => {
                pending.insert(tag, TagValue::U32(value));
            }
        }
        self.sync_core(tag, value);
        Ok(())
    }

    /// Reads a 16-bit tag from the container or the pending map.
    ///
    /// # Errors
    ///
    /// Unbound reads of a tag that was never buffered are a logic fault
    /// and return [`TiffError::InvalidReference`].
    pub fn get_u16(&self, tag: Tag) -> TiffResult<u16> {
        match &self.binding {
            Binding::Bound { handle } => handle.tag_u16(tag).ok_or(TiffError::TagRead { tag }),
            Binding::Unbound { pending } => match pending.get(&tag) {
                Some(TagValue::U16(v)) => Ok(*v),
                Some(TagValue::U32(_)) => Err(TiffError::TagRead { tag }),
                None => Err(TiffError::InvalidReference),
            },
        }
    }

    /// Reads a 32-bit tag from the container or the pending map.
    ///
    /// # Errors
    ///
    /// Unbound reads of a tag that was never buffered are a logic fault
    /// and return [`TiffError::InvalidReference`].
    pub fn get_u32(&self, tag: Tag) -> TiffResult<u32> {
        match &self.binding {
            Binding::Bound { handle } => handle.tag_u32(tag).ok_or(TiffError::TagRead { tag }),
            Binding::Unbound { pending } => match pending.get(&tag) {
                Some(TagValue::U32(v)) => Ok(*v),
                Some(TagValue::U16(_)) => Err(TiffError::TagRead { tag }),
                None => Err(TiffError::InvalidReference),
            },
        }
    }

    /// Replaces the extra-samples list. Forwarded immediately when bound;
    /// unbound stores carry the list to the next bind.
    pub fn set_extra_samples(&mut self, samples: Vec<u16>) -> TiffResult<()> {
        if let Binding::Bound { handle } = &mut self.binding {
            if !handle.set_extra_samples(&samples) {
                return Err(TiffError::TagWrite {
                    tag: Tag::EXTRA_SAMPLES,
                });
            }
        }
        self.extra_samples = samples;
        Ok(())
    }

    fn sync_core(&mut self, tag: Tag, value: u32) {
        match tag {
            Tag::BITS_PER_SAMPLE => self.bits_per_sample = value,
            Tag::SAMPLES_PER_PIXEL => self.samples_per_pixel = value,
            Tag::ROWS_PER_STRIP => self.rows_per_strip = value,
            Tag::PHOTOMETRIC => self.photometric = value,
            Tag::PLANAR_CONFIG => self.planarconfig = value,
            Tag::ORIENTATION => self.orientation = value,
            Tag::IMAGE_WIDTH => self.width = value,
            Tag::IMAGE_LENGTH => self.height = value,
            _ => {}
        }
    }

    /// Returns `true` while a container handle is bound.
    #[inline]
    pub fn is_bound(&self) -> bool {
        matches!(self.binding, Binding::Bound { .. })
    }

    /// Bits per channel element.
    #[inline]
    pub fn bits_per_sample(&self) -> u32 {
        self.bits_per_sample
    }

    /// Channel elements per pixel, extra samples included.
    #[inline]
    pub fn samples_per_pixel(&self) -> u32 {
        self.samples_per_pixel
    }

    /// Scanlines per storage strip.
    #[inline]
    pub fn rows_per_strip(&self) -> u32 {
        self.rows_per_strip
    }

    /// Photometric interpretation of the base channels.
    #[inline]
    pub fn photometric(&self) -> u32 {
        self.photometric
    }

    /// Channel interleaving of the stored data.
    #[inline]
    pub fn planar_config(&self) -> u32 {
        self.planarconfig
    }

    /// Visual orientation of row 0 / column 0.
    #[inline]
    pub fn orientation(&self) -> u32 {
        self.orientation
    }

    /// Image width in pixels.
    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in scanlines.
    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Image dimensions.
    #[inline]
    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    /// Roles of the channels beyond the base color channels.
    #[inline]
    pub fn extra_samples(&self) -> &[u16] {
        &self.extra_samples
    }

    /// The bound handle, if any.
    pub(crate) fn handle_mut(&mut self) -> Option<&mut H> {
        match &mut self.binding {
            Binding::Bound { handle } => Some(handle),
            Binding::Unbound { .. } => None,
        }
    }

    /// Takes the bound handle out, returning the store to the unbound
    /// state with its pending map repopulated from the cached values, so a
    /// later bind re-forwards them.
    pub(crate) fn detach(&mut self) -> Option<H> {
        if !self.is_bound() {
            return None;
        }
        let repopulated = self.core_values().pending_map();
        match std::mem::replace(&mut self.binding, Binding::Unbound { pending: repopulated }) {
            Binding::Bound { handle } => Some(handle),
            Binding::Unbound { .. } => None,
        }
    }

    fn core_values(&self) -> CoreAttributes {
        CoreAttributes {
            bits_per_sample: self.bits_per_sample,
            samples_per_pixel: self.samples_per_pixel,
            rows_per_strip: self.rows_per_strip,
            photometric: self.photometric,
            planarconfig: self.planarconfig,
            orientation: self.orientation,
            width: self.width,
            height: self.height,
            extra_samples: self.extra_samples.clone(),
        }
    }
}

impl<H: ContainerHandle> fmt::Debug for Attributes<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attributes")
            .field("bound", &self.is_bound())
            .field("bits_per_sample", &self.bits_per_sample)
            .field("samples_per_pixel", &self.samples_per_pixel)
            .field("width", &self.width)
            .field("height", &self.height)
            .field("extra_samples", &self.extra_samples)
            .finish()
    }
}
