//! User-space FAT32 volume engine.
//!
//! Mounts a FAT32 image held in any random-access byte store and exposes
//! directory traversal, file creation, cluster-level read/write, rename and
//! deletion directly against the on-disk layout. Short (8.3) names only;
//! long-name entries are skipped.
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

#[cfg(all(test, not(feature = "std")))]
extern crate std;

pub mod cluster;
pub mod dir;
pub mod fat;
pub mod file_io;
pub mod geometry;
pub mod handle;
pub mod image;
pub mod name;
pub mod namespace;
pub mod options;
pub mod volume;

#[cfg(test)]
mod testing;

pub use dir::{DirEntry, DirEntryRef, EntryLocation};
pub use fat32_types::{
    Attributes, DirListing, FatDateTime, FsError, HandleId, OpenFileInfo, OpenMode, Result,
    VolumeInfo,
};
pub use geometry::Geometry;
pub use handle::{OpenFile, OpenFileTable};
pub use image::{ImageStore, MemImage};
#[cfg(feature = "std")]
pub use image::FileImage;
pub use options::{DefaultTimeProvider, MountOptions, NullTimeProvider, TimeProvider};
pub use volume::Volume;
