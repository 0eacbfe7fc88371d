//! Error kinds recognised by the core.

use thiserror::Error;

/// Every fallible operation in this crate returns `Result<T, FsError>`.
#[derive(Debug, Error)]
pub enum FsError {
    #[error("free map cannot satisfy allocation of {requested} sector(s), only {available} free")]
    NoSpaceOnDisk { requested: usize, available: usize },

    #[error("directory has no free slot")]
    DirectoryFull,

    #[error("name {0:?} already exists in this directory")]
    NameExists(String),

    #[error("path {0:?} does not resolve")]
    NotFound(String),

    #[error("cannot remove the root directory")]
    InvalidTarget,

    #[error("malformed path {0:?}")]
    InvalidPath(String),

    #[error("path component {0:?} is not a directory")]
    NotADirectory(String),

    #[error("offset {offset} is out of range for a file of length {length} bytes")]
    OutOfRange { offset: u64, length: u64 },

    #[error("file handle {0} is not open")]
    InvalidHandle(u32),

    #[error("no free slots in the open-file registry")]
    RegistryFull,

    #[error("invalid geometry: {0}")]
    InvalidGeometry(&'static str),

    #[error("device I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type FsResult<T> = Result<T, FsError>;
