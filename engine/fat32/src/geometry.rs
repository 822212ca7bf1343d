//! Boot sector interpretation and the fixed offsets derived from it.
//!
//! Everything here is computed once at mount and never changes afterwards.

use fat32_types::{FsError, Result};

use crate::image::ImageStore;

// ─── BPB (BIOS Parameter Block) ───────────────────────────────────────────────

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct Bpb {
    jump:               [u8; 3],
    oem:                [u8; 8],
    bytes_per_sector:   u16,
    sectors_per_clus:   u8,
    reserved_sectors:   u16,
    num_fats:           u8,
    root_entry_count:   u16,
    total_sectors_16:   u16,
    media:              u8,
    fat_size_16:        u16,
    sectors_per_track:  u16,
    num_heads:          u16,
    hidden_sectors:     u32,
    total_sectors_32:   u32,
    // FAT32 extension
    fat_size_32:        u32,
    ext_flags:          u16,
    fs_version:         u16,
    root_cluster:       u32,
    fs_info:            u16,
    backup_boot_sector: u16,
    _reserved:          [u8; 12],
    drive_number:       u8,
    _reserved2:         u8,
    boot_signature:     u8,
    volume_id:          u32,
    volume_label:       [u8; 11],
    fs_type:            [u8; 8],
}

const BOOT_SECTOR_LEN: usize = 512;
/// Highest cluster count a 28-bit FAT can address.
const MAX_CLUSTERS: u32 = 0x0FFF_FFF5;
const _: () = assert!(core::mem::size_of::<Bpb>() == 90);

// ─── Geometry ─────────────────────────────────────────────────────────────────

/// Volume layout. All offsets are in bytes from the start of the image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Geometry {
    pub bytes_per_sector:    u32,
    pub sectors_per_cluster: u32,
    pub reserved_sectors:    u32,
    pub num_fats:            u32,
    pub fat_size_sectors:    u32,
    pub root_cluster:        u32,
    pub total_sectors:       u32,
    pub fat_start:           u64,
    pub data_start:          u64,
    pub total_clusters:      u32,
    pub cluster_size:        u32,
}

impl Geometry {
    /// Read sector 0 and derive the layout. Any failure is `FsError::Mount`.
    pub fn read<D: ImageStore>(disk: &mut D) -> Result<Self> {
        let mut sec = [0u8; BOOT_SECTOR_LEN];
        if disk.read_at(0, &mut sec).is_err() {
            log::warn!("mount: boot sector could not be read in full");
            return Err(FsError::Mount);
        }
        Self::parse(&sec)
    }

    /// Derive the layout from a raw boot sector.
    pub fn parse(sec: &[u8; BOOT_SECTOR_LEN]) -> Result<Self> {
        if sec[510] != 0x55 || sec[511] != 0xAA {
            log::warn!("mount: missing 0x55AA boot signature");
            return Err(FsError::Mount);
        }

        let bpb: Bpb = unsafe { core::ptr::read_unaligned(sec.as_ptr() as *const Bpb) };

        let bytes_per_sector    = u16::from_le(bpb.bytes_per_sector) as u32;
        let sectors_per_cluster = bpb.sectors_per_clus as u32;
        let reserved_sectors    = u16::from_le(bpb.reserved_sectors) as u32;
        let num_fats            = bpb.num_fats as u32;
        let fat_size_16         = u16::from_le(bpb.fat_size_16) as u32;
        let fat_size_sectors    = u32::from_le(bpb.fat_size_32);
        let root_cluster        = u32::from_le(bpb.root_cluster);
        let total_16            = u16::from_le(bpb.total_sectors_16) as u32;
        let total_sectors = if total_16 != 0 { total_16 } else { u32::from_le(bpb.total_sectors_32) };

        // FAT12/FAT16 have fat_size_16 != 0; we only support FAT32.
        if fat_size_16 != 0 {
            log::warn!("mount: FAT12/FAT16 volume (fat_size_16 = {fat_size_16}) is not supported");
            return Err(FsError::Mount);
        }
        if !matches!(bytes_per_sector, 512 | 1024 | 2048 | 4096) {
            log::warn!("mount: unsupported sector size {bytes_per_sector}");
            return Err(FsError::Mount);
        }
        if !sectors_per_cluster.is_power_of_two() || sectors_per_cluster > 128 {
            log::warn!("mount: sectors per cluster {sectors_per_cluster} is not a power of two up to 128");
            return Err(FsError::Mount);
        }
        if num_fats == 0 || fat_size_sectors == 0 {
            log::warn!("mount: degenerate BPB (fats={num_fats} fatsz={fat_size_sectors})");
            return Err(FsError::Mount);
        }

        let fat_sectors  = num_fats as u64 * fat_size_sectors as u64;
        let meta_sectors = reserved_sectors as u64 + fat_sectors;
        if (total_sectors as u64) < meta_sectors {
            log::warn!("mount: {total_sectors} total sectors leave no data region");
            return Err(FsError::Mount);
        }

        let fat_start      = reserved_sectors as u64 * bytes_per_sector as u64;
        let data_start     = fat_start + fat_sectors * bytes_per_sector as u64;
        let total_clusters = ((total_sectors as u64 - meta_sectors) / sectors_per_cluster as u64) as u32;
        let cluster_size   = sectors_per_cluster * bytes_per_sector;

        if total_clusters > MAX_CLUSTERS {
            log::warn!("mount: {total_clusters} clusters exceed the FAT32 limit");
            return Err(FsError::Mount);
        }
        if root_cluster < 2 || root_cluster >= total_clusters + 2 {
            log::warn!("mount: root cluster {root_cluster} outside the data region");
            return Err(FsError::Mount);
        }

        Ok(Self {
            bytes_per_sector, sectors_per_cluster, reserved_sectors, num_fats,
            fat_size_sectors, root_cluster, total_sectors,
            fat_start, data_start, total_clusters, cluster_size,
        })
    }

    /// Byte size of one FAT copy.
    pub fn fat_bytes(&self) -> u64 {
        self.fat_size_sectors as u64 * self.bytes_per_sector as u64
    }

    /// Number of 32-bit entries one FAT copy can hold.
    pub fn fat_entry_count(&self) -> u32 {
        (self.fat_bytes() / 4) as u32
    }

    /// Image size according to the boot sector.
    pub fn image_size(&self) -> u64 {
        self.total_sectors as u64 * self.bytes_per_sector as u64
    }

    /// Directory entries per cluster.
    pub fn entries_per_cluster(&self) -> u32 {
        self.cluster_size / crate::dir::DIR_ENTRY_SIZE as u32
    }

    /// Whether `cluster` names a cell in the data region.
    pub fn is_data_cluster(&self, cluster: u32) -> bool {
        cluster >= 2 && cluster < self.total_clusters + 2
    }
}
