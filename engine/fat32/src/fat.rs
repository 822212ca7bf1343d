//! File Allocation Table access.
//!
//! Every call goes straight to the backing store; there is no FAT cache, so
//! the image is consistent after each completed write.

use alloc::vec::Vec;
use fat32_types::{FsError, Result};

use crate::image::ImageStore;
use crate::volume::Volume;

// ─── Constants ────────────────────────────────────────────────────────────────

pub const FAT_FREE:  u32 = 0x0000_0000;
pub const FAT_BAD:   u32 = 0x0FFF_FFF7;
pub const FAT32_EOC: u32 = 0x0FFF_FFF8;
/// Value written when terminating a chain.
pub const FAT_EOC_MARK: u32 = 0x0FFF_FFFF;
pub const FAT_MASK:  u32 = 0x0FFF_FFFF;

pub fn is_eoc(value: u32) -> bool { value >= FAT32_EOC }

// ─── Entry access ─────────────────────────────────────────────────────────────

impl<D: ImageStore> Volume<D> {
    fn fat_offset(&self, cluster: u32) -> Result<u64> {
        if cluster >= self.geo.fat_entry_count() {
            log::warn!("fat: cluster {cluster} is outside the table");
            return Err(FsError::Corrupted);
        }
        Ok(self.geo.fat_start + cluster as u64 * 4)
    }

    /// Raw link value of `cluster`, masked to 28 bits.
    pub fn fat_entry(&mut self, cluster: u32) -> Result<u32> {
        let off = self.fat_offset(cluster)?;
        let mut raw = [0u8; 4];
        self.disk.read_at(off, &mut raw)?;
        Ok(u32::from_le_bytes(raw) & FAT_MASK)
    }

    /// Write `value` into every FAT copy, then flush.
    pub fn set_fat_entry(&mut self, cluster: u32, value: u32) -> Result<()> {
        let off = self.fat_offset(cluster)?;
        let raw = (value & FAT_MASK).to_le_bytes();
        for copy in 0..self.geo.num_fats as u64 {
            self.disk.write_at(off + copy * self.geo.fat_bytes(), &raw)?;
        }
        self.disk.flush()?;
        log::trace!("fat: [{cluster}] = {value:#010x}");
        Ok(())
    }

    // ─── Chains ───────────────────────────────────────────────────────────────

    /// Successor of `cluster`, or `None` at end of chain.
    pub fn next_cluster(&mut self, cluster: u32) -> Result<Option<u32>> {
        let next = self.fat_entry(cluster)?;
        if is_eoc(next) {
            return Ok(None);
        }
        if !self.geo.is_data_cluster(next) {
            log::warn!("fat: cluster {cluster} links to invalid cluster {next:#x}");
            return Err(FsError::Corrupted);
        }
        Ok(Some(next))
    }

    /// Every cluster of the chain starting at `head`, in order.
    ///
    /// A chain longer than the data region must contain a cycle and is
    /// reported as `FsError::Corrupted`.
    pub fn chain(&mut self, head: u32) -> Result<Vec<u32>> {
        let mut clusters = Vec::new();
        if head == 0 {
            return Ok(clusters);
        }
        if !self.geo.is_data_cluster(head) {
            return Err(FsError::Corrupted);
        }
        let mut cur = Some(head);
        while let Some(c) = cur {
            if clusters.len() as u32 >= self.geo.total_clusters {
                log::warn!("fat: chain from {head} does not terminate");
                return Err(FsError::Corrupted);
            }
            clusters.push(c);
            cur = self.next_cluster(c)?;
        }
        Ok(clusters)
    }

    /// Mark every cluster of the chain at `head` free. Head 0 is a no-op.
    /// Returns the number of clusters released.
    pub fn free_chain(&mut self, head: u32) -> Result<u32> {
        let clusters = self.chain(head)?;
        for &c in &clusters {
            self.set_fat_entry(c, FAT_FREE)?;
        }
        if !clusters.is_empty() {
            log::debug!("fat: freed {} cluster(s) from {head}", clusters.len());
        }
        Ok(clusters.len() as u32)
    }
}
