use thiserror::Error;

pub type Result<T> = core::result::Result<T, FsError>;

/// Everything the volume engine can refuse to do.
///
/// None of these are retried internally; the caller decides what to do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum FsError {
    #[error("image could not be mounted")]
    Mount,
    #[error("short read or write against the backing image")]
    Io,
    #[error("no such file or directory")]
    NotFound,
    #[error("an entry with that name already exists")]
    AlreadyExists,
    #[error("not a directory")]
    NotADirectory,
    #[error("is a directory")]
    IsADirectory,
    #[error("directory is not empty")]
    DirectoryNotEmpty,
    #[error("file is already open")]
    AlreadyOpen,
    #[error("file is not open")]
    NotOpen,
    #[error("open file table is full")]
    TooManyOpenFiles,
    #[error("offset is past the end of the file")]
    InvalidOffset,
    #[error("no free cluster left on the volume")]
    AllocationExhausted,
    #[error("file is not open for reading")]
    NotReadable,
    #[error("file is not open for writing")]
    NotWritable,
    #[error("file is open")]
    Busy,
    #[error("invalid name")]
    InvalidName,
    #[error("cluster chain is corrupted")]
    Corrupted,
}
