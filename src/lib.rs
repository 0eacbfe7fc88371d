//! A small on-disk file system core: a free-space bitmap, fixed-size file
//! headers with direct and single-level indirect addressing, and directory
//! blocks that map names to header sectors — built over an abstract
//! [`device::BlockDevice`] rather than any particular disk driver.
//!
//! The crate has no process model, no caching layer, and no crash recovery:
//! it is the index structure a kernel or a userland tool would drive, not a
//! mountable filesystem by itself.

mod device;
mod directory;
mod error;
mod free_map;
mod fs;
mod geometry;
mod header;
mod path;
mod registry;

pub use device::{BlockDevice, FileBlockDevice, MemoryBlockDevice};
pub use directory::{EntryKind, ListingEntry};
pub use error::{FsError, FsResult};
pub use fs::FileSystem;
pub use geometry::{Geometry, MAX_OPEN_FILES, NAME_MAX_LEN, SECTOR_SIZE};
pub use registry::{FileHandle, OpenFileRegistry};
