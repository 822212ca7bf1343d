//! Random-access byte store holding a FAT32 image.
//!
//! All engine I/O goes through this trait, so the engine can run against a
//! file on the host or an in-memory buffer in tests. Every successful write
//! is expected to be visible to the next read; `flush` pushes it further
//! down where the store has somewhere to push it.

use alloc::vec::Vec;
use fat32_types::{FsError, Result};

// ─── Store abstraction ────────────────────────────────────────────────────────

pub trait ImageStore {
    /// Fill `buf` from `offset`. A short read is `FsError::Io`.
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()>;
    /// Write all of `buf` at `offset`. A short write is `FsError::Io`.
    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()>;
    fn flush(&mut self) -> Result<()> { Ok(()) }
    /// Size of the store in bytes.
    fn len(&self) -> u64;
}

// ─── In-memory store ──────────────────────────────────────────────────────────

/// Image held in a `Vec<u8>`. Never grows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MemImage(pub Vec<u8>);

impl MemImage {
    pub fn new(bytes: Vec<u8>) -> Self { Self(bytes) }
    pub fn into_inner(self) -> Vec<u8> { self.0 }

    fn range(&self, offset: u64, len: usize) -> Result<core::ops::Range<usize>> {
        let start = usize::try_from(offset).map_err(|_| FsError::Io)?;
        let end = start.checked_add(len).ok_or(FsError::Io)?;
        if end > self.0.len() { return Err(FsError::Io); }
        Ok(start..end)
    }
}

impl ImageStore for MemImage {
    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let range = self.range(offset, buf.len())?;
        buf.copy_from_slice(&self.0[range]);
        Ok(())
    }

    fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
        let range = self.range(offset, buf.len())?;
        self.0[range].copy_from_slice(buf);
        Ok(())
    }

    fn len(&self) -> u64 { self.0.len() as u64 }
}

// ─── File-backed store ────────────────────────────────────────────────────────

#[cfg(feature = "std")]
pub use file_image::FileImage;

#[cfg(feature = "std")]
mod file_image {
    use std::fs::{File, OpenOptions};
    use std::io::{Read, Seek, SeekFrom, Write};
    use std::path::Path;

    use fat32_types::{FsError, Result};

    use super::ImageStore;

    /// Image file opened read-write. Writes are flushed before returning.
    #[derive(Debug)]
    pub struct FileImage {
        file: File,
        len:  u64,
    }

    impl FileImage {
        pub fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
            let file = OpenOptions::new().read(true).write(true).open(path)?;
            let len = file.metadata()?.len();
            Ok(Self { file, len })
        }

        pub fn into_file(self) -> File { self.file }
    }

    impl ImageStore for FileImage {
        fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
            self.file.seek(SeekFrom::Start(offset)).map_err(|_| FsError::Io)?;
            self.file.read_exact(buf).map_err(|_| FsError::Io)
        }

        fn write_at(&mut self, offset: u64, buf: &[u8]) -> Result<()> {
            self.file.seek(SeekFrom::Start(offset)).map_err(|_| FsError::Io)?;
            self.file.write_all(buf).map_err(|_| FsError::Io)?;
            self.file.flush().map_err(|_| FsError::Io)?;
            self.len = self.len.max(offset + buf.len() as u64);
            Ok(())
        }

        fn flush(&mut self) -> Result<()> {
            self.file.flush().map_err(|_| FsError::Io)
        }

        fn len(&self) -> u64 { self.len }
    }
}
