//! File-backed reference container.
//!
//! `RawContainer` stores a tag table plus raw native-endian scanlines in a
//! trivial private layout. It is not a TIFF codec - there is no
//! compression, no multi-directory support, and no compatibility with any
//! external format. It exists so the coordination layer has one runnable
//! backend: small tools and the test suite exercise the full file
//! lifecycle (open modes, tag traffic, scanline transfer, flush) against
//! real paths through it.
//!
//! State is kept in memory and serialized on [`flush`]; scanlines may
//! therefore be written in any row order before the file is realized.
//!
//! [`flush`]: ContainerHandle::flush

use super::{Container, ContainerHandle, OpenMode};
use crate::tag::Tag;
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

const MAGIC: [u8; 4] = *b"TBC1";

/// Tag widths the container stores.
const WIDTH_U16: u8 = 2;
const WIDTH_U32: u8 = 4;

/// The file-backed reference container codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawContainer;

impl Container for RawContainer {
    type Handle = RawHandle;

    fn open(&self, path: &Path, mode: OpenMode) -> Option<RawHandle> {
        match RawHandle::open(path, mode) {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::debug!(path = %path.display(), %err, "raw container open failed");
                None
            }
        }
    }
}

/// One open raw container file.
#[derive(Debug)]
pub struct RawHandle {
    path: PathBuf,
    mode: OpenMode,
    /// Tag id -> (stored width, value). 16-bit values are widened.
    tags: BTreeMap<u32, (u8, u32)>,
    extra_samples: Option<Vec<u16>>,
    rows: BTreeMap<u32, Vec<u8>>,
    /// Byte length shared by all stored rows, fixed at the first write.
    row_len: Option<usize>,
    dirty: bool,
}

impl RawHandle {
    fn open(path: &Path, mode: OpenMode) -> io::Result<Self> {
        let mut handle = Self {
            path: path.to_path_buf(),
            mode,
            tags: BTreeMap::new(),
            extra_samples: None,
            rows: BTreeMap::new(),
            row_len: None,
            dirty: false,
        };
        match mode {
            OpenMode::Read => handle.parse()?,
            OpenMode::Write => {
                // Probe writability up front so open reports the failure,
                // not a later flush.
                File::create(path)?;
            }
        }
        Ok(handle)
    }

    fn parse(&mut self) -> io::Result<()> {
        let mut reader = BufReader::new(File::open(&self.path)?);

        let mut magic = [0u8; 4];
        reader.read_exact(&mut magic)?;
        if magic != MAGIC {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "bad magic"));
        }

        let tag_count = reader.read_u32::<LittleEndian>()?;
        for _ in 0..tag_count {
            let id = reader.read_u32::<LittleEndian>()?;
            let width = reader.read_u8()?;
            let value = reader.read_u32::<LittleEndian>()?;
            if width != WIDTH_U16 && width != WIDTH_U32 {
                return Err(io::Error::new(io::ErrorKind::InvalidData, "bad tag width"));
            }
            self.tags.insert(id, (width, value));
        }

        if reader.read_u8()? != 0 {
            let count = reader.read_u16::<LittleEndian>()?;
            let mut samples = Vec::with_capacity(count as usize);
            for _ in 0..count {
                samples.push(reader.read_u16::<LittleEndian>()?);
            }
            self.extra_samples = Some(samples);
        }

        let row_len = reader.read_u32::<LittleEndian>()? as usize;
        let row_count = reader.read_u32::<LittleEndian>()?;
        for _ in 0..row_count {
            let index = reader.read_u32::<LittleEndian>()?;
            let mut data = vec![0u8; row_len];
            reader.read_exact(&mut data)?;
            self.rows.insert(index, data);
        }
        if row_count > 0 {
            self.row_len = Some(row_len);
        }
        Ok(())
    }

    fn serialize(&self) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(&self.path)?);

        writer.write_all(&MAGIC)?;
        writer.write_u32::<LittleEndian>(self.tags.len() as u32)?;
        for (&id, &(width, value)) in &self.tags {
            writer.write_u32::<LittleEndian>(id)?;
            writer.write_u8(width)?;
            writer.write_u32::<LittleEndian>(value)?;
        }

        match &self.extra_samples {
            Some(samples) => {
                writer.write_u8(1)?;
                writer.write_u16::<LittleEndian>(samples.len() as u16)?;
                for &sample in samples {
                    writer.write_u16::<LittleEndian>(sample)?;
                }
            }
            None => writer.write_u8(0)?,
        }

        let row_len = self.row_len.unwrap_or(0);
        writer.write_u32::<LittleEndian>(row_len as u32)?;
        writer.write_u32::<LittleEndian>(self.rows.len() as u32)?;
        for (&index, data) in &self.rows {
            writer.write_u32::<LittleEndian>(index)?;
            writer.write_all(data)?;
        }
        writer.flush()
    }
}

impl ContainerHandle for RawHandle {
    fn flush(&mut self) -> bool {
        if self.mode == OpenMode::Read {
            return true;
        }
        match self.serialize() {
            Ok(()) => {
                self.dirty = false;
                true
            }
            Err(err) => {
                tracing::warn!(path = %self.path.display(), %err, "raw container flush failed");
                false
            }
        }
    }

    fn tag_u16(&self, tag: Tag) -> Option<u16> {
        match self.tags.get(&tag.id()) {
            Some(&(WIDTH_U16, value)) => Some(value as u16),
            _ => None,
        }
    }

    fn tag_u32(&self, tag: Tag) -> Option<u32> {
        match self.tags.get(&tag.id()) {
            Some(&(WIDTH_U32, value)) => Some(value),
            _ => None,
        }
    }

    fn set_tag_u16(&mut self, tag: Tag, value: u16) -> bool {
        if self.mode == OpenMode::Read {
            return false;
        }
        self.tags.insert(tag.id(), (WIDTH_U16, value as u32));
        self.dirty = true;
        true
    }

    fn set_tag_u32(&mut self, tag: Tag, value: u32) -> bool {
        if self.mode == OpenMode::Read {
            return false;
        }
        self.tags.insert(tag.id(), (WIDTH_U32, value));
        self.dirty = true;
        true
    }

    fn extra_samples(&self) -> Option<Vec<u16>> {
        self.extra_samples.clone()
    }

    fn set_extra_samples(&mut self, samples: &[u16]) -> bool {
        if self.mode == OpenMode::Read {
            return false;
        }
        self.extra_samples = Some(samples.to_vec());
        self.dirty = true;
        true
    }

    fn scanline_size(&self) -> usize {
        let bits = self.tags.get(&Tag::BITS_PER_SAMPLE.id()).map(|&(_, v)| v);
        let samples = self.tags.get(&Tag::SAMPLES_PER_PIXEL.id()).map(|&(_, v)| v);
        let width = self.tags.get(&Tag::IMAGE_WIDTH.id()).map(|&(_, v)| v);
        match (bits, samples, width) {
            (Some(bits), Some(samples), Some(width)) => {
                (bits as usize / 8) * samples as usize * width as usize
            }
            _ => 0,
        }
    }

    fn read_scanline(&mut self, row: &mut [u8], index: u32) -> bool {
        match self.rows.get(&index) {
            Some(data) if data.len() == row.len() => {
                row.copy_from_slice(data);
                true
            }
            _ => false,
        }
    }

    fn write_scanline(&mut self, row: &[u8], index: u32) -> bool {
        if self.mode == OpenMode::Read {
            return false;
        }
        if row.len() != self.scanline_size() {
            return false;
        }
        if let Some(row_len) = self.row_len {
            if row.len() != row_len {
                return false;
            }
        } else {
            self.row_len = Some(row.len());
        }
        self.rows.insert(index, row.to_vec());
        self.dirty = true;
        true
    }
}

impl Drop for RawHandle {
    fn drop(&mut self) {
        // Backstop for callers that skipped close(); the image handle
        // flushes explicitly before release.
        if self.mode == OpenMode::Write && self.dirty {
            let _ = self.flush();
        }
    }
}
