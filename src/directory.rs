//! Directory blocks: a fixed-size table of name → header-sector entries.

use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use log::trace;

use crate::device::BlockDevice;
use crate::error::{FsError, FsResult};
use crate::free_map::FreeMap;
use crate::geometry::{NAME_MAX_LEN, NUM_DIR_ENTRIES};
use crate::header::FileHeader;

/// On-disk directory entry. Kept as a flat `is_dir`/`sector` pair to match
/// the wire format; the crate's in-memory API instead hands callers the
/// sum-typed [`EntryKind`] so a kind can't be observed without its sector.
#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct RawDirEntry {
    sector: i32,
    in_use: u8,
    is_dir: u8,
    name: [u8; NAME_MAX_LEN + 1],
    _reserved: [u8; 3],
}

pub(crate) const RAW_DIR_ENTRY_SIZE: usize = size_of::<RawDirEntry>();

impl RawDirEntry {
    const EMPTY: Self = Self {
        sector: -1,
        in_use: 0,
        is_dir: 0,
        name: [0; NAME_MAX_LEN + 1],
        _reserved: [0; 3],
    };

    fn name_str(&self) -> &str {
        let end = self.name.iter().position(|&c| c == 0).unwrap_or(self.name.len());
        std::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    fn set_name(&mut self, name: &str) {
        self.name = [0; NAME_MAX_LEN + 1];
        let bytes = name.as_bytes();
        let len = bytes.len().min(NAME_MAX_LEN);
        self.name[..len].copy_from_slice(&bytes[..len]);
    }

    fn kind(&self) -> EntryKind {
        if self.is_dir != 0 {
            EntryKind::Dir(self.sector as u32)
        } else {
            EntryKind::File(self.sector as u32)
        }
    }
}

/// What kind of file a directory entry names, paired with its header sector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File(u32),
    Dir(u32),
}

impl EntryKind {
    pub fn sector(self) -> u32 {
        match self {
            EntryKind::File(s) | EntryKind::Dir(s) => s,
        }
    }

    pub fn is_dir(self) -> bool {
        matches!(self, EntryKind::Dir(_))
    }
}

/// One line of a directory listing: a fully resolved path and its kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub path: String,
    pub kind: EntryKind,
}

/// An in-memory directory: a fixed-capacity array of entries backed by one
/// data sector of a file.
#[derive(Debug, Clone)]
pub struct Directory {
    entries: Vec<RawDirEntry>,
}

impl Directory {
    /// A freshly created, empty directory image.
    pub fn empty() -> Self {
        Self { entries: vec![RawDirEntry::EMPTY; NUM_DIR_ENTRIES] }
    }

    pub fn fetch_from(header: &FileHeader, device: &dyn BlockDevice) -> FsResult<Self> {
        let mut buf = vec![0u8; NUM_DIR_ENTRIES * RAW_DIR_ENTRY_SIZE];
        header.read_at(device, 0, &mut buf)?;

        let entries = buf
            .chunks_exact(RAW_DIR_ENTRY_SIZE)
            .map(bytemuck::pod_read_unaligned)
            .collect();

        Ok(Self { entries })
    }

    pub fn write_back(&self, header: &FileHeader, device: &mut dyn BlockDevice) -> FsResult<()> {
        let mut buf = vec![0u8; NUM_DIR_ENTRIES * RAW_DIR_ENTRY_SIZE];
        for (slot, entry) in buf.chunks_exact_mut(RAW_DIR_ENTRY_SIZE).zip(&self.entries) {
            slot.copy_from_slice(bytemuck::bytes_of(entry));
        }
        header.write_at(device, 0, &buf)
    }

    fn find_index(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|entry| entry.in_use != 0 && entry.name_str() == name)
    }

    pub fn find(&self, name: &str) -> Option<EntryKind> {
        self.find_index(name).map(|i| self.entries[i].kind())
    }

    pub fn add(&mut self, name: &str, sector: u32, is_dir: bool) -> FsResult<()> {
        if self.find_index(name).is_some() {
            return Err(FsError::NameExists(name.to_string()));
        }

        let slot = self
            .entries
            .iter_mut()
            .find(|entry| entry.in_use == 0)
            .ok_or(FsError::DirectoryFull)?;

        slot.in_use = 1;
        slot.is_dir = is_dir as u8;
        slot.sector = sector as i32;
        slot.set_name(name);

        trace!("added {name:?} -> sector {sector} (dir={is_dir}) to directory entry");
        Ok(())
    }

    /// Clears the `in_use` flag of a matching entry; no compaction.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.find_index(name) {
            Some(i) => {
                self.entries[i] = RawDirEntry::EMPTY;
                true
            }
            None => false,
        }
    }

    fn live_entries(&self) -> impl Iterator<Item = &RawDirEntry> {
        self.entries.iter().filter(|entry| entry.in_use != 0)
    }

    /// Lists entries, concatenating `prefix` and each entry's bare name with
    /// no separator. `prefix` is expected to already be the caller's resolved
    /// path for this directory, so e.g. listing `/d` yields entries like
    /// `/dx` rather than `/d/x`.
    pub fn list(
        &self,
        device: &dyn BlockDevice,
        prefix: &str,
        recursive: bool,
    ) -> FsResult<Vec<ListingEntry>> {
        let mut out = Vec::new();

        for entry in self.live_entries() {
            let path = format!("{prefix}{}", entry.name_str());
            let kind = entry.kind();
            out.push(ListingEntry { path: path.clone(), kind });

            if recursive && kind.is_dir() {
                let child_header = FileHeader::fetch_from(device, kind.sector())?;
                let child_dir = Directory::fetch_from(&child_header, device)?;
                out.extend(child_dir.list(device, &path, recursive)?);
            }
        }

        Ok(out)
    }

    /// Recursively frees every entry's data: directories first destroy their
    /// own contents, then every entry (file or directory) has its header
    /// fetched, deallocated, and its bit cleared, and is removed from the
    /// table. After the loop, the now-empty directory is written back to
    /// `own_header` — the header of the directory being destroyed itself,
    /// not of any of its entries.
    pub fn destroy(
        &mut self,
        own_header: &FileHeader,
        device: &mut dyn BlockDevice,
        free_map: &mut FreeMap,
    ) -> FsResult<()> {
        let snapshot: Vec<RawDirEntry> = self.live_entries().copied().collect();

        for entry in snapshot {
            let sector = entry.sector as u32;

            if entry.is_dir != 0 {
                let child_header = FileHeader::fetch_from(device, sector)?;
                let mut child_dir = Directory::fetch_from(&child_header, device)?;
                child_dir.destroy(&child_header, device, free_map)?;
            }

            let header = FileHeader::fetch_from(device, sector)?;
            header.deallocate(free_map);
            free_map.clear(sector);

            self.remove(entry.name_str());
        }

        self.write_back(own_header, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryBlockDevice;

    #[test]
    fn add_rejects_duplicate_names() {
        let mut dir = Directory::empty();
        dir.add("a", 10, false).unwrap();
        assert!(matches!(dir.add("a", 11, false), Err(FsError::NameExists(_))));
    }

    #[test]
    fn add_rejects_when_full() {
        let mut dir = Directory::empty();
        for i in 0..NUM_DIR_ENTRIES {
            dir.add(&format!("f{i}"), i as u32, false).unwrap();
        }
        assert!(matches!(dir.add("overflow", 99, false), Err(FsError::DirectoryFull)));
    }

    #[test]
    fn find_and_remove_round_trip() {
        let mut dir = Directory::empty();
        dir.add("sub", 5, true).unwrap();
        assert_eq!(dir.find("sub"), Some(EntryKind::Dir(5)));
        assert!(dir.remove("sub"));
        assert_eq!(dir.find("sub"), None);
        assert!(!dir.remove("sub"));
    }

    #[test]
    fn fetch_and_write_back_preserve_entries() {
        let mut free_map = FreeMap::new(32);
        let header = FileHeader::allocate(&mut free_map, crate::geometry::DIR_FILE_SIZE).unwrap();
        let mut device = MemoryBlockDevice::new(32);
        header.write_back(&mut device, 5).unwrap();

        let mut dir = Directory::empty();
        dir.add("a", 6, false).unwrap();
        dir.add("b", 7, true).unwrap();
        dir.write_back(&header, &mut device).unwrap();

        let reloaded = Directory::fetch_from(&header, &device).unwrap();
        assert_eq!(reloaded.find("a"), Some(EntryKind::File(6)));
        assert_eq!(reloaded.find("b"), Some(EntryKind::Dir(7)));
    }

    #[test]
    fn list_concatenates_prefix_and_name_without_separator() {
        let mut dir = Directory::empty();
        dir.add("x", 9, false).unwrap();
        let device = MemoryBlockDevice::new(4);

        let entries = dir.list(&device, "/d", false).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "/dx");
    }
}
