//! Whole-cluster I/O and the cluster allocator.

use alloc::vec;
use fat32_types::{FsError, Result};

use crate::fat::{FAT_EOC_MARK, FAT_FREE, FAT_MASK};
use crate::image::ImageStore;
use crate::volume::Volume;

impl<D: ImageStore> Volume<D> {
    /// Byte offset of a data cluster within the image.
    pub fn cluster_offset(&self, cluster: u32) -> Result<u64> {
        if !self.geo.is_data_cluster(cluster) {
            log::warn!("cluster: {cluster} is not a data cluster");
            return Err(FsError::Corrupted);
        }
        Ok(self.geo.data_start + (cluster - 2) as u64 * self.geo.cluster_size as u64)
    }

    /// Fill `buf` (exactly one cluster long) with the contents of `cluster`.
    pub fn read_cluster(&mut self, cluster: u32, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), self.geo.cluster_size as usize);
        let off = self.cluster_offset(cluster)?;
        self.disk.read_at(off, buf)?;
        log::trace!("cluster: read {cluster}");
        Ok(())
    }

    /// Overwrite `cluster` with `buf` (exactly one cluster long), then flush.
    pub fn write_cluster(&mut self, cluster: u32, buf: &[u8]) -> Result<()> {
        debug_assert_eq!(buf.len(), self.geo.cluster_size as usize);
        let off = self.cluster_offset(cluster)?;
        self.disk.write_at(off, buf)?;
        self.disk.flush()?;
        log::trace!("cluster: wrote {cluster}");
        Ok(())
    }

    /// Lowest free data cluster, scanning the first FAT one sector at a time.
    pub fn find_free_cluster(&mut self) -> Result<Option<u32>> {
        let end = (self.geo.total_clusters + 2).min(self.geo.fat_entry_count());
        let per_sector = self.geo.bytes_per_sector / 4;
        let mut sec = vec![0u8; self.geo.bytes_per_sector as usize];

        let mut base = 0u32;
        while base < end {
            self.disk.read_at(self.geo.fat_start + base as u64 * 4, &mut sec)?;
            for i in 0..per_sector {
                let cluster = base + i;
                if cluster < 2 { continue; }
                if cluster >= end { return Ok(None); }
                let off = i as usize * 4;
                let entry = u32::from_le_bytes([sec[off], sec[off+1], sec[off+2], sec[off+3]]) & FAT_MASK;
                if entry == FAT_FREE {
                    return Ok(Some(cluster));
                }
            }
            base += per_sector;
        }
        Ok(None)
    }

    /// Claim a free cluster: terminate it, zero it, and link it after `prev`
    /// unless `prev` is 0.
    pub fn allocate_cluster(&mut self, prev: u32) -> Result<u32> {
        let Some(cluster) = self.find_free_cluster()? else {
            log::warn!("cluster: no free clusters left");
            return Err(FsError::AllocationExhausted);
        };
        self.set_fat_entry(cluster, FAT_EOC_MARK)?;
        let zero = vec![0u8; self.geo.cluster_size as usize];
        self.write_cluster(cluster, &zero)?;
        if prev != 0 {
            self.set_fat_entry(prev, cluster)?;
        }
        log::debug!("cluster: allocated {cluster} after {prev}");
        Ok(cluster)
    }
}
