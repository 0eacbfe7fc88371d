//! Compile-time record layout plus the runtime-validated volume geometry.
//!
//! The original kernel this crate's engineering lineage comes from hard-codes
//! its on-disk layout as `const`s in `param.rs`. The record layout here is
//! the same idea (it must be, since `FileHeader`/`Directory` are `bytemuck`
//! `Pod` types of a fixed size), but the *size of the volume* is no longer a
//! build-time constant: it is supplied at `format`/`open_volume` time as a
//! [`Geometry`] and validated before anything touches the device.

use crate::error::{FsError, FsResult};

/// Size of one device sector, in bytes.
pub const SECTOR_SIZE: usize = 128;

/// Number of direct data-sector pointers in a [`crate::header::FileHeader`].
pub const NUM_DIRECT: usize = 4;

/// Number of indirect-header pointers in a [`crate::header::FileHeader`].
pub const NUM_INDIRECT: usize = 2;

/// Capacity of a single indirect header. An indirect header reuses the exact
/// on-disk layout of a top-level header, but only its direct portion is
/// meaningful, so its capacity equals [`NUM_DIRECT`].
pub const NUM_MAX_SECT: usize = NUM_DIRECT;

/// Total pointer slots carried by one header record (direct + indirect).
pub const NUM_HEADER_SLOTS: usize = NUM_DIRECT + NUM_INDIRECT;

/// Largest file length (in bytes) representable by one header.
pub const MAX_FILE_SIZE: usize =
    NUM_DIRECT * SECTOR_SIZE + NUM_INDIRECT * NUM_MAX_SECT * SECTOR_SIZE;

/// Maximum length of a path component name, not counting the NUL terminator.
pub const NAME_MAX_LEN: usize = 14;

/// Number of entries in one directory block.
pub const NUM_DIR_ENTRIES: usize = 5;

/// Number of simultaneously open file descriptors an [`crate::registry::OpenFileRegistry`]
/// can hold.
pub const MAX_OPEN_FILES: usize = 16;

/// Sector holding the free-space map's header.
pub const FREEMAP_SECTOR: u32 = 0;

/// Sector holding the root directory's header.
pub const ROOT_DIR_SECTOR: u32 = 1;

/// Runtime description of a volume: how many sectors the underlying
/// [`crate::device::BlockDevice`] exposes. Everything else about the on-disk
/// format (`SECTOR_SIZE`, `NUM_DIRECT`, ...) is fixed by this build of the
/// crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    total_sectors: usize,
}

impl Geometry {
    /// Validates and builds a geometry for a volume of `total_sectors`
    /// sectors. Rejects volumes too small to hold the free-map and root
    /// directory headers, or whose free-map would not fit in a file this
    /// format can address.
    pub fn new(total_sectors: usize) -> FsResult<Self> {
        if total_sectors <= ROOT_DIR_SECTOR as usize {
            return Err(FsError::InvalidGeometry(
                "volume must have room for the free-map and root-directory sectors",
            ));
        }

        let geometry = Self { total_sectors };
        if geometry.freemap_bytes() > MAX_FILE_SIZE {
            return Err(FsError::InvalidGeometry(
                "free-map image would not fit in a file addressable by one header",
            ));
        }

        Ok(geometry)
    }

    pub const fn total_sectors(&self) -> usize {
        self.total_sectors
    }

    /// Size, in bytes, of the free-map's byte image: one bit per sector.
    pub fn freemap_bytes(&self) -> usize {
        self.total_sectors.div_ceil(8)
    }
}

/// Byte size of one directory block's on-disk image.
pub const DIR_FILE_SIZE: usize = NUM_DIR_ENTRIES * crate::directory::RAW_DIR_ENTRY_SIZE;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directory_block_fits_in_one_sector() {
        assert!(DIR_FILE_SIZE <= SECTOR_SIZE);
    }

    #[test]
    fn rejects_undersized_volume() {
        assert!(Geometry::new(0).is_err());
        assert!(Geometry::new(1).is_err());
        assert!(Geometry::new(2).is_ok());
    }
}
