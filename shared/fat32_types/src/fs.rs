use alloc::string::String;
use bitflags::bitflags;

bitflags! {
    /// Directory entry attribute byte.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Attributes: u8 {
        const READ_ONLY = 0x01;
        const HIDDEN    = 0x02;
        const SYSTEM    = 0x04;
        const VOLUME_ID = 0x08;
        const DIRECTORY = 0x10;
        const ARCHIVE   = 0x20;
        /// Long-name pseudo attribute: all four low bits set at once.
        const LONG_NAME = Self::READ_ONLY.bits() | Self::HIDDEN.bits()
                        | Self::SYSTEM.bits() | Self::VOLUME_ID.bits();

        // The on-disk byte may carry any bits
        const _ = !0;
    }
}

impl Attributes {
    pub fn is_long_name(self) -> bool { self.contains(Self::LONG_NAME) }
    pub fn is_dir(self) -> bool { self.contains(Self::DIRECTORY) }
    pub fn is_volume_label(self) -> bool {
        self.contains(Self::VOLUME_ID) && !self.is_long_name()
    }
}

bitflags! {
    /// Access mode requested when opening a file.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct OpenMode: u8 {
        const READ  = 0x01;
        const WRITE = 0x02;
        const READ_WRITE = Self::READ.bits() | Self::WRITE.bits();
    }
}

impl OpenMode {
    pub fn can_read(self) -> bool { self.contains(Self::READ) }
    pub fn can_write(self) -> bool { self.contains(Self::WRITE) }
}

/// Slot index in the open-file table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct HandleId(usize);

impl HandleId {
    pub const fn new(slot: usize) -> Self { Self(slot) }
    pub const fn slot(self) -> usize { self.0 }
}

/// One live entry of a directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirListing {
    pub name:       String,
    pub attributes: Attributes,
    pub size:       u32,
    pub cluster:    u32,
}

impl DirListing {
    pub fn is_dir(&self) -> bool { self.attributes.is_dir() }
}

/// Snapshot of one occupied open-file slot.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OpenFileInfo {
    pub handle: HandleId,
    pub name:   String,
    pub path:   String,
    pub mode:   OpenMode,
    pub offset: u32,
    pub size:   u32,
}

/// Geometry figures for an info report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VolumeInfo {
    pub image_name:          String,
    pub root_cluster:        u32,
    pub bytes_per_sector:    u32,
    pub sectors_per_cluster: u32,
    pub total_clusters:      u32,
    pub fat_entry_count:     u32,
    pub image_size:          u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn long_name_needs_all_four_bits() {
        assert!(Attributes::from_bits_retain(0x0F).is_long_name());
        assert!(Attributes::from_bits_retain(0x3F).is_long_name());
        assert!(!Attributes::from_bits_retain(0x07).is_long_name());
        assert!(!Attributes::DIRECTORY.is_long_name());
    }

    #[test]
    fn volume_label_is_not_long_name() {
        assert!(Attributes::VOLUME_ID.is_volume_label());
        assert!(!Attributes::LONG_NAME.is_volume_label());
    }

    #[test]
    fn open_mode_bits() {
        assert!(OpenMode::READ_WRITE.can_read());
        assert!(OpenMode::READ_WRITE.can_write());
        assert!(!OpenMode::READ.can_write());
        assert!(!OpenMode::WRITE.can_read());
        assert_eq!(OpenMode::READ_WRITE.bits(), 0x03);
    }
}
