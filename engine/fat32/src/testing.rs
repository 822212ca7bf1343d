//! Test-only image construction and cross-checking through the `fatfs` crate.

use std::io::{Cursor, Read, Write};
use std::string::String;
use std::vec;
use std::vec::Vec;

use crate::image::MemImage;
use crate::options::{MountOptions, NullTimeProvider};
use crate::volume::Volume;

// ── fatfs-backed images ──────────────────────────────────────────────────────

const FATFS_IMAGE_BYTES: usize = 40 * 1024 * 1024;

/// 40 MB image formatted by `fatfs` with 512-byte clusters. Anything much
/// smaller falls under the FAT32 cluster minimum.
pub fn make_disk() -> MemImage {
    let mut cursor = Cursor::new(vec![0u8; FATFS_IMAGE_BYTES]);
    let opts = fatfs::FormatVolumeOptions::new().fat_type(fatfs::FatType::Fat32);
    fatfs::format_volume(&mut cursor, opts).expect("fatfs format");
    MemImage(cursor.into_inner())
}

/// Fresh `fatfs` image holding one root-level file.
pub fn disk_with_file(name: &str, content: &[u8]) -> MemImage {
    let mut disk = make_disk();
    {
        let mut cursor = Cursor::new(&mut disk.0);
        let fs = fatfs::FileSystem::new(&mut cursor, fatfs::FsOptions::new()).expect("fatfs mount");
        let mut file = fs.root_dir().create_file(name).expect("fatfs create");
        file.write_all(content).expect("fatfs write");
    }
    disk
}

/// Contents of `path` as `fatfs` reads them.
pub fn read_via_fatfs(disk: &mut MemImage, path: &str) -> Vec<u8> {
    let mut cursor = Cursor::new(&mut disk.0);
    let fs = fatfs::FileSystem::new(&mut cursor, fatfs::FsOptions::new()).expect("fatfs mount");
    let mut buf = Vec::new();
    fs.root_dir().open_file(path).expect("fatfs open").read_to_end(&mut buf).expect("fatfs read");
    buf
}

/// Names in a directory as `fatfs` sees them, excluding `.` and `..`.
pub fn list_via_fatfs(disk: &mut MemImage, path: &str) -> Vec<String> {
    let mut cursor = Cursor::new(&mut disk.0);
    let fs = fatfs::FileSystem::new(&mut cursor, fatfs::FsOptions::new()).expect("fatfs mount");
    let root = fs.root_dir();
    let dir = if path.is_empty() || path == "/" { root } else { root.open_dir(path).expect("fatfs open_dir") };
    let mut names: Vec<String> = dir
        .iter()
        .map(|e| e.expect("fatfs entry").file_name())
        .filter(|n| n != "." && n != "..")
        .collect();
    names.sort();
    names
}

/// Mount `disk` with a deterministic clock.
pub fn mount(disk: MemImage) -> Volume<MemImage> {
    Volume::mount_store(disk, MountOptions::new().time_provider(&NullTimeProvider)).unwrap()
}

// ── Hand-built images ────────────────────────────────────────────────────────

/// Builds minimal FAT32 images with an arbitrary cluster count.
///
/// `fatfs` refuses to treat volumes under 65 525 clusters as FAT32, which
/// rules it out for small geometries such as 2048-byte clusters.
pub struct ImageBuilder {
    bytes_per_sector:    u32,
    sectors_per_cluster: u32,
    reserved_sectors:    u32,
    num_fats:            u32,
    clusters:            u32,
}

impl ImageBuilder {
    pub fn new() -> Self {
        Self { bytes_per_sector: 512, sectors_per_cluster: 1, reserved_sectors: 32, num_fats: 2, clusters: 128 }
    }

    pub fn sectors_per_cluster(mut self, spc: u32) -> Self { self.sectors_per_cluster = spc; self }
    pub fn num_fats(mut self, n: u32) -> Self { self.num_fats = n; self }
    pub fn clusters(mut self, n: u32) -> Self { self.clusters = n; self }

    pub fn build(&self) -> MemImage {
        let bps = self.bytes_per_sector;
        let fat_size = ((self.clusters + 2) * 4).div_ceil(bps);
        let total = self.reserved_sectors + self.num_fats * fat_size + self.clusters * self.sectors_per_cluster;
        let mut img = vec![0u8; (total * bps) as usize];

        let bs = &mut img[..512];
        bs[0..3].copy_from_slice(&[0xEB, 0x58, 0x90]);
        bs[3..11].copy_from_slice(b"FAT32ENG");
        bs[11..13].copy_from_slice(&(bps as u16).to_le_bytes());
        bs[13] = self.sectors_per_cluster as u8;
        bs[14..16].copy_from_slice(&(self.reserved_sectors as u16).to_le_bytes());
        bs[16] = self.num_fats as u8;
        bs[21] = 0xF8; // media
        bs[24..26].copy_from_slice(&63u16.to_le_bytes());
        bs[26..28].copy_from_slice(&255u16.to_le_bytes());
        bs[32..36].copy_from_slice(&total.to_le_bytes());
        bs[36..40].copy_from_slice(&fat_size.to_le_bytes());
        bs[44..48].copy_from_slice(&2u32.to_le_bytes()); // root cluster
        bs[48..50].copy_from_slice(&1u16.to_le_bytes());
        bs[50..52].copy_from_slice(&6u16.to_le_bytes());
        bs[64] = 0x80;
        bs[66] = 0x29;
        bs[67..71].copy_from_slice(&0x1234_5678u32.to_le_bytes());
        bs[71..82].copy_from_slice(b"NO NAME    ");
        bs[82..90].copy_from_slice(b"FAT32   ");
        bs[510] = 0x55;
        bs[511] = 0xAA;

        for copy in 0..self.num_fats {
            let base = ((self.reserved_sectors + copy * fat_size) * bps) as usize;
            for (i, v) in [0x0FFF_FFF8u32, 0x0FFF_FFFF, 0x0FFF_FFFF].iter().enumerate() {
                img[base + i * 4..base + i * 4 + 4].copy_from_slice(&v.to_le_bytes());
            }
        }
        MemImage(img)
    }
}

/// 512 B/sector × 4 sectors/cluster = 2048-byte clusters, 256 clusters.
pub fn small_volume() -> Volume<MemImage> {
    let disk = ImageBuilder::new().sectors_per_cluster(4).clusters(256).build();
    Volume::mount_store(disk, MountOptions::new().time_provider(&NullTimeProvider)).unwrap()
}
