//! The `BlockDevice` collaborator and the two reference implementations this
//! crate needs to exercise and test the core. A real disk driver is an
//! external collaborator and stays out of this crate.

use std::fs::{File, OpenOptions};
use std::io::{Error, ErrorKind};
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::error::FsResult;
use crate::geometry::SECTOR_SIZE;

/// Synchronous, fixed-size sector I/O. Implementors are assumed to serialise
/// their own reads/writes; the core places no locks around device access.
pub trait BlockDevice {
    /// Total number of addressable sectors.
    fn num_sectors(&self) -> usize;

    /// Reads sector `index` into `buf`. `buf` must be exactly `SECTOR_SIZE`
    /// bytes long.
    fn read_sector(&self, index: u32, buf: &mut [u8]) -> FsResult<()>;

    /// Writes `buf` to sector `index`. `buf` must be exactly `SECTOR_SIZE`
    /// bytes long.
    fn write_sector(&mut self, index: u32, buf: &[u8]) -> FsResult<()>;
}

fn check_bounds(index: u32, num_sectors: usize, buf_len: usize) -> FsResult<()> {
    if buf_len != SECTOR_SIZE {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("sector buffer must be {SECTOR_SIZE} bytes, got {buf_len}"),
        )
        .into());
    }
    if index as usize >= num_sectors {
        return Err(Error::new(
            ErrorKind::InvalidInput,
            format!("sector {index} is out of range (device has {num_sectors} sectors)"),
        )
        .into());
    }
    Ok(())
}

/// A `Vec`-backed block device, for fast unit tests that don't need to touch
/// the filesystem.
pub struct MemoryBlockDevice {
    sectors: Vec<[u8; SECTOR_SIZE]>,
}

impl MemoryBlockDevice {
    pub fn new(num_sectors: usize) -> Self {
        Self {
            sectors: vec![[0u8; SECTOR_SIZE]; num_sectors],
        }
    }
}

impl BlockDevice for MemoryBlockDevice {
    fn num_sectors(&self) -> usize {
        self.sectors.len()
    }

    fn read_sector(&self, index: u32, buf: &mut [u8]) -> FsResult<()> {
        check_bounds(index, self.sectors.len(), buf.len())?;
        buf.copy_from_slice(&self.sectors[index as usize]);
        Ok(())
    }

    fn write_sector(&mut self, index: u32, buf: &[u8]) -> FsResult<()> {
        check_bounds(index, self.sectors.len(), buf.len())?;
        self.sectors[index as usize].copy_from_slice(buf);
        Ok(())
    }
}

/// A block device backed by a single regular host file, accessed through
/// positioned reads/writes the same way the `mkfs` tooling in this
/// codebase's lineage lays out a filesystem image.
pub struct FileBlockDevice {
    file: File,
    num_sectors: usize,
}

impl FileBlockDevice {
    /// Creates (or truncates) `path` and sizes it to hold `num_sectors`
    /// sectors.
    pub fn create(path: impl AsRef<Path>, num_sectors: usize) -> FsResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len((num_sectors * SECTOR_SIZE) as u64)?;
        Ok(Self { file, num_sectors })
    }

    /// Opens an existing image file that already holds `num_sectors`
    /// sectors.
    pub fn open_existing(path: impl AsRef<Path>, num_sectors: usize) -> FsResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        Ok(Self { file, num_sectors })
    }
}

impl BlockDevice for FileBlockDevice {
    fn num_sectors(&self) -> usize {
        self.num_sectors
    }

    fn read_sector(&self, index: u32, buf: &mut [u8]) -> FsResult<()> {
        check_bounds(index, self.num_sectors, buf.len())?;
        self.file
            .read_exact_at(buf, (index as u64) * SECTOR_SIZE as u64)?;
        Ok(())
    }

    fn write_sector(&mut self, index: u32, buf: &[u8]) -> FsResult<()> {
        check_bounds(index, self.num_sectors, buf.len())?;
        self.file
            .write_all_at(buf, (index as u64) * SECTOR_SIZE as u64)?;
        Ok(())
    }
}
