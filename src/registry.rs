//! `FileHandle` and `OpenFileRegistry`: the minimal machinery the core
//! exposes so a caller can build real open-file handles, without owning the
//! process-level open-file table itself.

use crate::device::BlockDevice;
use crate::error::{FsError, FsResult};
use crate::geometry::MAX_OPEN_FILES;
use crate::header::FileHeader;

/// A handle bound to a file's header sector. Carries no cached header state
/// of its own — headers are never cached across operations, so every
/// operation re-fetches the header it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHandle {
    header_sector: u32,
}

impl FileHandle {
    pub(crate) fn new(header_sector: u32) -> Self {
        Self { header_sector }
    }

    pub fn header_sector(&self) -> u32 {
        self.header_sector
    }

    pub fn file_length(&self, device: &dyn BlockDevice) -> FsResult<usize> {
        Ok(FileHeader::fetch_from(device, self.header_sector)?.file_length())
    }

    pub fn byte_to_sector(&self, device: &dyn BlockDevice, offset: usize) -> FsResult<u32> {
        FileHeader::fetch_from(device, self.header_sector)?.byte_to_sector(offset)
    }

    pub fn read_at(&self, device: &dyn BlockDevice, offset: usize, buf: &mut [u8]) -> FsResult<()> {
        FileHeader::fetch_from(device, self.header_sector)?.read_at(device, offset, buf)
    }

    pub fn write_at(&self, device: &mut dyn BlockDevice, offset: usize, buf: &[u8]) -> FsResult<()> {
        FileHeader::fetch_from(device, self.header_sector)?.write_at(device, offset, buf)
    }
}

/// A small fixed-capacity table mapping kernel-facing file descriptor ids
/// (`1..=MAX_OPEN_FILES`) to open [`FileHandle`]s. This is a plain value the
/// caller owns rather than a process-wide global, so independent callers
/// (or tests) can each have their own.
#[derive(Debug, Default)]
pub struct OpenFileRegistry {
    slots: Vec<Option<FileHandle>>,
}

impl OpenFileRegistry {
    pub fn new() -> Self {
        Self { slots: vec![None; MAX_OPEN_FILES] }
    }

    /// Inserts `handle`, returning its id (`1..=MAX_OPEN_FILES`).
    pub fn insert(&mut self, handle: FileHandle) -> FsResult<u32> {
        let slot = self.slots.iter().position(Option::is_none).ok_or(FsError::RegistryFull)?;
        self.slots[slot] = Some(handle);
        Ok((slot + 1) as u32)
    }

    pub fn get(&self, id: u32) -> FsResult<&FileHandle> {
        self.slot_index(id)
            .and_then(|i| self.slots[i].as_ref())
            .ok_or(FsError::InvalidHandle(id))
    }

    /// Closes `id`. Returns `false` for an out-of-range or already-closed
    /// id rather than leaving that case as undefined behaviour.
    pub fn close(&mut self, id: u32) -> bool {
        match self.slot_index(id) {
            Some(i) if self.slots[i].is_some() => {
                self.slots[i] = None;
                true
            }
            _ => false,
        }
    }

    fn slot_index(&self, id: u32) -> Option<usize> {
        if id == 0 {
            return None;
        }
        let index = (id - 1) as usize;
        (index < self.slots.len()).then_some(index)
    }
}
