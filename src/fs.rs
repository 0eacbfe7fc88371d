//! The file system facade: path walking, allocation coordination, create,
//! remove (including recursive subtree removal), listing, and the
//! kernel-facing entry points built on top.

use log::{debug, warn};

use crate::device::BlockDevice;
use crate::directory::{Directory, EntryKind, ListingEntry};
use crate::error::{FsError, FsResult};
use crate::free_map::FreeMap;
use crate::geometry::{Geometry, DIR_FILE_SIZE, FREEMAP_SECTOR, ROOT_DIR_SECTOR};
use crate::header::FileHeader;
use crate::path;
use crate::registry::{FileHandle, OpenFileRegistry};

/// Owns the two always-open files of a volume: the free-map file and the
/// root-directory file. Every other header/directory is fetched fresh for
/// the duration of a single operation and dropped when it returns.
pub struct FileSystem {
    geometry: Geometry,
    freemap_header: FileHeader,
    root_header: FileHeader,
}

impl FileSystem {
    /// Zero-initialises a free-map and a root directory: marks sectors 0 and
    /// 1 allocated, allocates data blocks for both well-known files, then
    /// writes headers, directory body, and bitmap back in that order.
    pub fn format(device: &mut dyn BlockDevice, geometry: Geometry) -> FsResult<Self> {
        debug!("formatting volume with {} sector(s)", geometry.total_sectors());

        let mut free_map = FreeMap::new(geometry.total_sectors());
        free_map.mark(FREEMAP_SECTOR);
        free_map.mark(ROOT_DIR_SECTOR);

        let freemap_header = FileHeader::allocate(&mut free_map, geometry.freemap_bytes())?;
        let root_header = FileHeader::allocate(&mut free_map, DIR_FILE_SIZE)?;

        freemap_header.write_back(device, FREEMAP_SECTOR)?;
        root_header.write_back(device, ROOT_DIR_SECTOR)?;

        Directory::empty().write_back(&root_header, device)?;
        free_map.write_back(&freemap_header, device)?;

        Ok(Self { geometry, freemap_header, root_header })
    }

    /// Opens a volume, formatting it first if `format` is true; otherwise
    /// simply reads the two well-known headers off disk.
    pub fn open_volume(device: &mut dyn BlockDevice, geometry: Geometry, format: bool) -> FsResult<Self> {
        if format {
            return Self::format(device, geometry);
        }

        let freemap_header = FileHeader::fetch_from(device, FREEMAP_SECTOR)?;
        let root_header = FileHeader::fetch_from(device, ROOT_DIR_SECTOR)?;
        Ok(Self { geometry, freemap_header, root_header })
    }

    fn load_free_map(&self, device: &dyn BlockDevice) -> FsResult<FreeMap> {
        FreeMap::fetch_from(&self.freemap_header, device, self.geometry.total_sectors())
    }

    /// Reports whether `sector` is currently marked allocated in the free
    /// map. Mainly useful for verifying allocation/deallocation behavior
    /// from outside the crate.
    pub fn is_sector_allocated(&self, device: &dyn BlockDevice, sector: u32) -> FsResult<bool> {
        Ok(self.load_free_map(device)?.test(sector))
    }

    /// Creates a file or (if `is_dir`) a directory at `path`.
    pub fn create(
        &self,
        device: &mut dyn BlockDevice,
        path: &str,
        initial_size: usize,
        is_dir: bool,
    ) -> FsResult<()> {
        debug!("create {path:?} (size={initial_size}, dir={is_dir})");

        let (base, leaf) = path::split_base_leaf(path)?;
        let leaf_name = leaf.trim_start_matches('/');

        let parent_sector = path::resolve_dir(device, &base)?;
        let parent_header = FileHeader::fetch_from(device, parent_sector)?;
        let mut parent_dir = Directory::fetch_from(&parent_header, device)?;

        if parent_dir.find(leaf_name).is_some() {
            warn!("create {path:?} failed: name already exists");
            return Err(FsError::NameExists(leaf_name.to_string()));
        }

        let mut free_map = self.load_free_map(device)?;
        let header_sector = free_map
            .find_and_set()
            .ok_or(FsError::NoSpaceOnDisk { requested: 1, available: free_map.num_clear() })?;

        let content_size = if is_dir { DIR_FILE_SIZE } else { initial_size };
        let new_header = match FileHeader::allocate(&mut free_map, content_size) {
            Ok(header) => header,
            Err(err) => {
                warn!("create {path:?} failed: {err}");
                return Err(err);
            }
        };

        if let Err(err) = parent_dir.add(leaf_name, header_sector, is_dir) {
            warn!("create {path:?} failed: {err}");
            return Err(err);
        }

        new_header.write_back(device, header_sector)?;
        parent_dir.write_back(&parent_header, device)?;
        free_map.write_back(&self.freemap_header, device)?;

        if is_dir {
            Directory::empty().write_back(&new_header, device)?;
        }

        Ok(())
    }

    /// Resolves `path` to an open handle, or `NotFound`/`InvalidPath`.
    pub fn open(&self, device: &dyn BlockDevice, path: &str) -> FsResult<FileHandle> {
        let entry = path::resolve_path(device, path)?;
        Ok(FileHandle::new(entry.sector()))
    }

    /// Removes `path`. With `recursive`, first destroys the entire subtree
    /// rooted at `path` if it names a directory.
    pub fn remove(&self, device: &mut dyn BlockDevice, path: &str, recursive: bool) -> FsResult<()> {
        debug!("remove {path:?} (recursive={recursive})");

        let (base, leaf) = path::split_base_leaf(path)?;
        let leaf_name = leaf.trim_start_matches('/');

        let parent_sector = path::resolve_dir(device, &base)?;
        let parent_header = FileHeader::fetch_from(device, parent_sector)?;
        let mut parent_dir = Directory::fetch_from(&parent_header, device)?;

        let target = parent_dir.find(leaf_name).ok_or_else(|| FsError::NotFound(path.to_string()))?;
        if target.sector() == ROOT_DIR_SECTOR {
            warn!("remove {path:?} failed: cannot remove root");
            return Err(FsError::InvalidTarget);
        }

        let mut free_map = self.load_free_map(device)?;

        if recursive {
            if let EntryKind::Dir(sector) = target {
                let target_header = FileHeader::fetch_from(device, sector)?;
                let mut target_dir = Directory::fetch_from(&target_header, device)?;
                target_dir.destroy(&target_header, device, &mut free_map)?;
            }
        }

        let target_header = FileHeader::fetch_from(device, target.sector())?;
        target_header.deallocate(&mut free_map);
        free_map.clear(target.sector());
        parent_dir.remove(leaf_name);

        parent_dir.write_back(&parent_header, device)?;
        free_map.write_back(&self.freemap_header, device)?;

        Ok(())
    }

    /// Lists `path` (resolving it first; it must name a directory).
    pub fn list(&self, device: &dyn BlockDevice, path: &str, recursive: bool) -> FsResult<Vec<ListingEntry>> {
        let sector = path::resolve_dir(device, path)?;
        let header = FileHeader::fetch_from(device, sector)?;
        let dir = Directory::fetch_from(&header, device)?;
        dir.list(device, path, recursive)
    }

    // --- Kernel-facing entry points. Thin adapters over the Result-based
    // core API above, exposing a plain 0/1/bool ABI for callers that don't
    // want to deal with `FsError` directly. ---

    /// `0|1` adapter over [`Self::create`].
    pub fn create_raw(&self, device: &mut dyn BlockDevice, path: &str, size: usize, is_dir: bool) -> i32 {
        match self.create(device, path, size, is_dir) {
            Ok(()) => 1,
            Err(_) => 0,
        }
    }

    /// `bool` adapter over [`Self::remove`].
    pub fn remove_raw(&self, device: &mut dyn BlockDevice, path: &str, recursive: bool) -> bool {
        self.remove(device, path, recursive).is_ok()
    }

    pub fn open_for_id(
        &self,
        device: &dyn BlockDevice,
        registry: &mut OpenFileRegistry,
        path: &str,
    ) -> FsResult<u32> {
        let handle = self.open(device, path)?;
        registry.insert(handle)
    }

    pub fn read_by_id(
        &self,
        device: &dyn BlockDevice,
        registry: &OpenFileRegistry,
        id: u32,
        offset: usize,
        buf: &mut [u8],
    ) -> FsResult<()> {
        registry.get(id)?.read_at(device, offset, buf)
    }

    pub fn write_by_id(
        &self,
        device: &mut dyn BlockDevice,
        registry: &OpenFileRegistry,
        id: u32,
        offset: usize,
        buf: &[u8],
    ) -> FsResult<()> {
        registry.get(id)?.write_at(device, offset, buf)
    }

    /// Returns `0` for an invalid or already-closed id, `1` on success.
    pub fn close_by_id(&self, registry: &mut OpenFileRegistry, id: u32) -> u32 {
        registry.close(id) as u32
    }
}
