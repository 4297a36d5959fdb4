//! Shared test support: an in-memory container backend with failure
//! injection and call recording.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tiffbuf::{Container, ContainerHandle, OpenMode, Tag};

/// Persisted state of one container "file".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileState {
    /// Tag id -> (stored width, value).
    pub tags: BTreeMap<u32, (u8, u32)>,
    pub extra_samples: Option<Vec<u16>>,
    pub rows: BTreeMap<u32, Vec<u8>>,
}

/// A ready-made interleaved RGB tag table.
pub fn rgb_file(width: u32, height: u32, bits_per_sample: u32) -> FileState {
    let mut tags = BTreeMap::new();
    tags.insert(Tag::IMAGE_WIDTH.id(), (4, width));
    tags.insert(Tag::IMAGE_LENGTH.id(), (4, height));
    tags.insert(Tag::BITS_PER_SAMPLE.id(), (4, bits_per_sample));
    tags.insert(Tag::SAMPLES_PER_PIXEL.id(), (4, 3));
    tags.insert(Tag::ROWS_PER_STRIP.id(), (4, 1));
    tags.insert(Tag::PHOTOMETRIC.id(), (4, 2));
    tags.insert(Tag::PLANAR_CONFIG.id(), (4, 1));
    tags.insert(Tag::ORIENTATION.id(), (4, 1));
    FileState {
        tags,
        extra_samples: None,
        rows: BTreeMap::new(),
    }
}

/// Switches that make the next matching operation fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailFlags {
    pub open: bool,
    pub flush: bool,
    pub tag_writes: bool,
    pub scanline_at: Option<u32>,
}

/// In-memory container keyed by path. Handles work on a copy of the file
/// state and persist it on flush, so unflushed writes never hit the store.
#[derive(Clone, Default)]
pub struct MemContainer {
    files: Rc<RefCell<HashMap<PathBuf, FileState>>>,
    pub fail: Rc<RefCell<FailFlags>>,
    /// Tag ids in write order across all handles; the extra-samples list
    /// logs as its own tag id.
    pub tag_log: Rc<RefCell<Vec<u32>>>,
    /// Scanline read + write calls across all handles.
    pub scanline_calls: Rc<RefCell<usize>>,
}

impl MemContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_file(&self, path: impl AsRef<Path>, state: FileState) {
        self.files
            .borrow_mut()
            .insert(path.as_ref().to_path_buf(), state);
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<FileState> {
        self.files.borrow().get(path.as_ref()).cloned()
    }

    pub fn take_tag_log(&self) -> Vec<u32> {
        std::mem::take(&mut self.tag_log.borrow_mut())
    }

    pub fn scanline_calls(&self) -> usize {
        *self.scanline_calls.borrow()
    }
}

pub struct MemHandle {
    container: MemContainer,
    path: PathBuf,
    mode: OpenMode,
    state: FileState,
}

impl Container for MemContainer {
    type Handle = MemHandle;

    fn open(&self, path: &Path, mode: OpenMode) -> Option<MemHandle> {
        if self.fail.borrow().open {
            return None;
        }
        let state = match mode {
            OpenMode::Read => self.files.borrow().get(path)?.clone(),
            OpenMode::Write => FileState::default(),
        };
        Some(MemHandle {
            container: self.clone(),
            path: path.to_path_buf(),
            mode,
            state,
        })
    }
}

impl ContainerHandle for MemHandle {
    fn flush(&mut self) -> bool {
        if self.container.fail.borrow().flush {
            return false;
        }
        if self.mode == OpenMode::Write {
            self.container
                .files
                .borrow_mut()
                .insert(self.path.clone(), self.state.clone());
        }
        true
    }

    fn tag_u16(&self, tag: Tag) -> Option<u16> {
        match self.state.tags.get(&tag.id()) {
            Some(&(2, value)) => Some(value as u16),
            _ => None,
        }
    }

    fn tag_u32(&self, tag: Tag) -> Option<u32> {
        match self.state.tags.get(&tag.id()) {
            Some(&(4, value)) => Some(value),
            _ => None,
        }
    }

    fn set_tag_u16(&mut self, tag: Tag, value: u16) -> bool {
        if self.container.fail.borrow().tag_writes {
            return false;
        }
        self.container.tag_log.borrow_mut().push(tag.id());
        self.state.tags.insert(tag.id(), (2, value as u32));
        true
    }

    fn set_tag_u32(&mut self, tag: Tag, value: u32) -> bool {
        if self.container.fail.borrow().tag_writes {
            return false;
        }
        self.container.tag_log.borrow_mut().push(tag.id());
        self.state.tags.insert(tag.id(), (4, value));
        true
    }

    fn extra_samples(&self) -> Option<Vec<u16>> {
        self.state.extra_samples.clone()
    }

    fn set_extra_samples(&mut self, samples: &[u16]) -> bool {
        if self.container.fail.borrow().tag_writes {
            return false;
        }
        self.container
            .tag_log
            .borrow_mut()
            .push(Tag::EXTRA_SAMPLES.id());
        self.state.extra_samples = Some(samples.to_vec());
        true
    }

    fn scanline_size(&self) -> usize {
        let get = |tag: Tag| self.state.tags.get(&tag.id()).map(|&(_, v)| v);
        match (
            get(Tag::BITS_PER_SAMPLE),
            get(Tag::SAMPLES_PER_PIXEL),
            get(Tag::IMAGE_WIDTH),
        ) {
            (Some(bits), Some(samples), Some(width)) => {
                (bits as usize / 8) * samples as usize * width as usize
            }
            _ => 0,
        }
    }

    fn read_scanline(&mut self, row: &mut [u8], index: u32) -> bool {
        *self.container.scanline_calls.borrow_mut() += 1;
        match self.state.rows.get(&index) {
            Some(data) if data.len() == row.len() => {
                row.copy_from_slice(data);
                true
            }
            _ => false,
        }
    }

    fn write_scanline(&mut self, row: &[u8], index: u32) -> bool {
        *self.container.scanline_calls.borrow_mut() += 1;
        if self.container.fail.borrow().scanline_at == Some(index) {
            return false;
        }
        if row.len() != self.scanline_size() {
            return false;
        }
        self.state.rows.insert(index, row.to_vec());
        true
    }
}
