//! Path grammar and resolution. Every lookup starts from the root
//! directory — there is no process model and therefore no notion of a
//! current working directory.

use crate::device::BlockDevice;
use crate::directory::{Directory, EntryKind};
use crate::error::{FsError, FsResult};
use crate::geometry::ROOT_DIR_SECTOR;
use crate::header::FileHeader;

/// Splits `path` into `(base_path, leaf)` at the last `/`, the way the
/// kernel-facing `create`/`remove` entry points do. `leaf` keeps its leading
/// `/`. A path with no `/` at all (impossible for anything starting with
/// `/`) or equal to exactly `/` is rejected, since neither names anything
/// that could be created or removed.
pub fn split_base_leaf(path: &str) -> FsResult<(String, String)> {
    if !path.starts_with('/') {
        return Err(FsError::InvalidPath(path.to_string()));
    }

    let last_slash = path.rfind('/').expect("checked above that path starts with '/'");
    let base = path[..last_slash].to_string();
    let leaf = path[last_slash..].to_string();

    if leaf.len() <= 1 {
        return Err(FsError::InvalidPath(path.to_string()));
    }

    Ok((base, leaf))
}

/// Resolves `path` to a directory sector, requiring every component
/// (including the last) to be a directory. An empty string or a bare `/`
/// both mean the root. Descending through a component that turns out to be
/// a file is rejected rather than treating the file's data as if it were a
/// directory block.
pub fn resolve_dir(device: &dyn BlockDevice, path: &str) -> FsResult<u32> {
    if path.is_empty() || path == "/" {
        return Ok(ROOT_DIR_SECTOR);
    }
    if !path.starts_with('/') {
        return Err(FsError::InvalidPath(path.to_string()));
    }

    let mut sector = ROOT_DIR_SECTOR;
    for component in path.trim_start_matches('/').split('/') {
        if component.is_empty() {
            return Err(FsError::InvalidPath(path.to_string()));
        }

        let header = FileHeader::fetch_from(device, sector)?;
        let dir = Directory::fetch_from(&header, device)?;
        match dir.find(component) {
            Some(EntryKind::Dir(s)) => sector = s,
            Some(EntryKind::File(_)) => return Err(FsError::NotADirectory(component.to_string())),
            None => return Err(FsError::NotFound(path.to_string())),
        }
    }

    Ok(sector)
}

/// Resolves `path` to whatever it names — file or directory — checking that
/// every *intermediate* component is a directory, but allowing the final
/// component to be either.
pub fn resolve_path(device: &dyn BlockDevice, path: &str) -> FsResult<EntryKind> {
    if !path.starts_with('/') {
        return Err(FsError::InvalidPath(path.to_string()));
    }
    if path == "/" {
        return Ok(EntryKind::Dir(ROOT_DIR_SECTOR));
    }

    let mut sector = ROOT_DIR_SECTOR;
    let components: Vec<&str> = path.trim_start_matches('/').split('/').collect();

    for (i, component) in components.iter().enumerate() {
        if component.is_empty() {
            return Err(FsError::InvalidPath(path.to_string()));
        }

        let header = FileHeader::fetch_from(device, sector)?;
        let dir = Directory::fetch_from(&header, device)?;
        let is_last = i + 1 == components.len();

        match dir.find(component) {
            Some(EntryKind::Dir(s)) => {
                if is_last {
                    return Ok(EntryKind::Dir(s));
                }
                sector = s;
            }
            Some(EntryKind::File(s)) => {
                if !is_last {
                    return Err(FsError::NotADirectory(component.to_string()));
                }
                return Ok(EntryKind::File(s));
            }
            None => return Err(FsError::NotFound(path.to_string())),
        }
    }

    unreachable!("path != \"/\" always yields at least one component")
}
