#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod error;
pub mod fs;
pub mod time;

pub use error::{FsError, Result};
pub use fs::{Attributes, DirListing, HandleId, OpenFileInfo, OpenMode, VolumeInfo};
pub use time::FatDateTime;
