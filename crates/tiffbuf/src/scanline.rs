//! Row-range transfers between a pixel buffer and a container handle.
//!
//! The engine validates geometry before every row: the byte size the codec
//! reports for one scanline must equal
//! `size_of::<T>() * samples_per_pixel * width` for the buffer, and the row
//! must lie inside the buffer. Rows transfer in ascending order with no
//! reordering; on any failure the call stops immediately and rows already
//! transferred stay transferred - there is no rollback.

use crate::container::ContainerHandle;
use crate::error::{TiffError, TiffResult};
use std::ops::Range;
use tiffbuf_core::{PixelBuffer, Sample};

/// Which way a transfer moves pixel data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Container scanlines into the buffer.
    Read,
    /// Buffer rows out to the container.
    Write,
}

/// Transfers the scanlines in `rows` between `buffer` and `handle`.
///
/// # Errors
///
/// - [`TiffError::InternalInconsistency`] when the codec's reported
///   scanline size disagrees with the buffer stride, or a row lies outside
///   the buffer. Checked per row, before the codec is called.
/// - [`TiffError::ScanlineRead`] / [`TiffError::ScanlineWrite`] when the
///   codec rejects a row.
pub fn transfer<T, H>(
    direction: Direction,
    handle: &mut H,
    buffer: &mut PixelBuffer<T>,
    rows: Range<u32>,
) -> TiffResult<()>
where
    T: Sample,
    H: ContainerHandle,
{
    let expected = T::BYTES * buffer.row_len();
    let mut stage = vec![0u8; expected];

    for y in rows {
        if handle.scanline_size() != expected {
            tracing::warn!(
                row = y,
                expected,
                reported = handle.scanline_size(),
                "scanline size disagrees with buffer stride"
            );
            return Err(TiffError::InternalInconsistency { row: y });
        }
        match direction {
            Direction::Write => {
                let Some(src) = buffer.row(y) else {
                    return Err(TiffError::InternalInconsistency { row: y });
                };
                for (element, bytes) in src.iter().zip(stage.chunks_exact_mut(T::BYTES)) {
                    element.write_ne(bytes);
                }
                if !handle.write_scanline(&stage, y) {
                    return Err(TiffError::ScanlineWrite { row: y });
                }
            }
            Direction::Read => {
                // Reject the row before asking the codec for it.
                if buffer.row(y).is_none() {
                    return Err(TiffError::InternalInconsistency { row: y });
                }
                if !handle.read_scanline(&mut stage, y) {
                    return Err(TiffError::ScanlineRead { row: y });
                }
                let Some(dst) = buffer.row_mut(y) else {
                    return Err(TiffError::InternalInconsistency { row: y });
                };
                for (element, bytes) in dst.iter_mut().zip(stage.chunks_exact(T::BYTES)) {
                    *element = T::read_ne(bytes);
                }
            }
        }
    }
    Ok(())
}

/// Flushes the container handle.
///
/// # Errors
///
/// [`TiffError::InvalidReference`] when no handle is bound;
/// [`TiffError::Flush`] when the codec reports failure.
pub fn flush<H: ContainerHandle>(handle: Option<&mut H>) -> TiffResult<()> {
    let Some(handle) = handle else {
        return Err(TiffError::InvalidReference);
    };
    if handle.flush() { Ok(()) } else { Err(TiffError::Flush) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::Tag;
    use std::collections::BTreeMap;
    use tiffbuf_core::Size;

    /// Scanline-only container double with a fixed reported size.
    struct MockHandle {
        scanline_size: usize,
        rows: BTreeMap<u32, Vec<u8>>,
        fail_row: Option<u32>,
    }

    impl MockHandle {
        fn sized(scanline_size: usize) -> Self {
            Self {
                scanline_size,
                rows: BTreeMap::new(),
                fail_row: None,
            }
        }
    }

    impl ContainerHandle for MockHandle {
        fn flush(&mut self) -> bool {
            true
        }

        fn tag_u16(&self, _tag: Tag) -> Option<u16> {
            None
        }

        fn tag_u32(&self, _tag: Tag) -> Option<u32> {
            None
        }

        fn set_tag_u16(&mut self, _tag: Tag, _value: u16) -> bool {
            false
        }

        fn set_tag_u32(&mut self, _tag: Tag, _value: u32) -> bool {
            false
        }

        fn extra_samples(&self) -> Option<Vec<u16>> {
            None
        }

        fn set_extra_samples(&mut self, _samples: &[u16]) -> bool {
            false
        }

        fn scanline_size(&self) -> usize {
            self.scanline_size
        }

        fn read_scanline(&mut self, row: &mut [u8], index: u32) -> bool {
            if self.fail_row == Some(index) {
                return false;
            }
            match self.rows.get(&index) {
                Some(data) => {
                    row.copy_from_slice(data);
                    true
                }
                None => false,
            }
        }

        fn write_scanline(&mut self, row: &[u8], index: u32) -> bool {
            if self.fail_row == Some(index) {
                return false;
            }
            self.rows.insert(index, row.to_vec());
            true
        }
    }

    fn striped_buffer() -> PixelBuffer<u8> {
        let mut buffer = PixelBuffer::new(Size::new(4, 4), 3);
        for y in 0..4 {
            buffer.row_mut(y).unwrap().fill(y as u8 + 1);
        }
        buffer
    }

    #[test]
    fn test_write_then_read_round_trips() {
        let mut handle = MockHandle::sized(12);
        let mut buffer = striped_buffer();
        transfer(Direction::Write, &mut handle, &mut buffer, 0..4).unwrap();

        let mut restored: PixelBuffer<u8> = PixelBuffer::new(Size::new(4, 4), 3);
        transfer(Direction::Read, &mut handle, &mut restored, 0..4).unwrap();
        assert_eq!(restored, buffer);
    }

    #[test]
    fn test_stride_mismatch_stops_immediately() {
        let mut handle = MockHandle::sized(11);
        let mut buffer = striped_buffer();
        let err = transfer(Direction::Write, &mut handle, &mut buffer, 0..4).unwrap_err();
        assert_eq!(err, TiffError::InternalInconsistency { row: 0 });
        assert!(handle.rows.is_empty());
    }

    #[test]
    fn test_rows_before_failure_stay_transferred() {
        let mut handle = MockHandle::sized(12);
        handle.fail_row = Some(2);
        let mut buffer = striped_buffer();

        let err = transfer(Direction::Write, &mut handle, &mut buffer, 0..4).unwrap_err();
        assert_eq!(err, TiffError::ScanlineWrite { row: 2 });
        assert_eq!(handle.rows.len(), 2);
        assert_eq!(handle.rows[&1], vec![2u8; 12]);
    }

    #[test]
    fn test_row_beyond_buffer_is_geometry_fault() {
        let mut handle = MockHandle::sized(12);
        let mut buffer = striped_buffer();

        let err = transfer(Direction::Write, &mut handle, &mut buffer, 2..6).unwrap_err();
        assert_eq!(err, TiffError::InternalInconsistency { row: 4 });
        // Rows 2 and 3 landed before the fault.
        assert_eq!(handle.rows.len(), 2);
    }

    #[test]
    fn test_read_failure_names_row() {
        let mut handle = MockHandle::sized(12);
        handle.rows.insert(0, vec![9u8; 12]);
        let mut buffer: PixelBuffer<u8> = PixelBuffer::new(Size::new(4, 4), 3);

        let err = transfer(Direction::Read, &mut handle, &mut buffer, 0..2).unwrap_err();
        assert_eq!(err, TiffError::ScanlineRead { row: 1 });
        assert!(buffer.row(0).unwrap().iter().all(|&v| v == 9));
    }

    #[test]
    fn test_flush_requires_handle() {
        assert_eq!(flush::<MockHandle>(None), Err(TiffError::InvalidReference));
        let mut handle = MockHandle::sized(12);
        assert_eq!(flush(Some(&mut handle)), Ok(()));
    }
}
