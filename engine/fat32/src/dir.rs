//! Directory entry store.
//!
//! A directory is a cluster chain of 32-byte slots. A slot whose first byte
//! is 0x00 ends the directory; 0xE5 marks a deleted entry whose slot may be
//! reused. Long-name entries are skipped everywhere.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use core::ops::ControlFlow;

use fat32_types::{Attributes, DirListing, FatDateTime, FsError, Result};

use crate::image::ImageStore;
use crate::name::{self, ShortName};
use crate::volume::Volume;

pub const DIR_ENTRY_SIZE: usize = 32;

const SLOT_END:     u8 = 0x00;
const SLOT_DELETED: u8 = 0xE5;

// ─── Directory entry (32 bytes) ────────────────────────────────────────────────

/// On-disk directory record. Multi-byte fields are kept little-endian and
/// converted by the accessors.
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct DirEntry {
    name:        ShortName,
    attr:        u8,
    _nt:         u8,
    _crt_tenths: u8,
    crt_time:    u16,
    crt_date:    u16,
    acc_date:    u16,
    cluster_hi:  u16,
    wrt_time:    u16,
    wrt_date:    u16,
    cluster_lo:  u16,
    size:        u32,
}

const _: () = assert!(core::mem::size_of::<DirEntry>() == DIR_ENTRY_SIZE);

impl DirEntry {
    /// Fresh entry with creation, modification and access stamps set to `now`.
    pub fn new(name: ShortName, attributes: Attributes, cluster: u32, now: FatDateTime) -> Self {
        let mut e = Self::from_bytes(&[0u8; DIR_ENTRY_SIZE]);
        e.name = name;
        e.attr = attributes.bits();
        e.crt_time = now.time.to_le();
        e.crt_date = now.date.to_le();
        e.set_cluster(cluster);
        e.touch(now);
        e
    }

    pub fn from_bytes(raw: &[u8; DIR_ENTRY_SIZE]) -> Self {
        unsafe { core::ptr::read_unaligned(raw.as_ptr() as *const DirEntry) }
    }

    pub fn to_bytes(&self) -> [u8; DIR_ENTRY_SIZE] {
        let mut out = [0u8; DIR_ENTRY_SIZE];
        unsafe { core::ptr::write_unaligned(out.as_mut_ptr() as *mut DirEntry, *self) };
        out
    }

    pub fn name(&self) -> ShortName { self.name }
    pub fn set_name(&mut self, name: ShortName) { self.name = name; }
    /// Decoded name, e.g. `"HELLO.TXT"`.
    pub fn display_name(&self) -> String { name::from_8_3(&self.name) }

    pub fn attributes(&self) -> Attributes { Attributes::from_bits_retain(self.attr) }
    pub fn is_dir(&self) -> bool { self.attributes().is_dir() }
    pub fn is_end(&self) -> bool { self.name[0] == SLOT_END }
    pub fn is_deleted(&self) -> bool { self.name[0] == SLOT_DELETED }
    pub fn is_free(&self) -> bool { self.is_end() || self.is_deleted() }
    pub fn is_long_name(&self) -> bool { self.attributes().is_long_name() }
    pub fn is_volume_label(&self) -> bool { self.attributes().is_volume_label() }
    pub fn is_dot_entry(&self) -> bool { name::is_dot_entry(&self.name) }

    pub fn cluster(&self) -> u32 {
        ((u16::from_le(self.cluster_hi) as u32) << 16) | u16::from_le(self.cluster_lo) as u32
    }

    pub fn set_cluster(&mut self, cluster: u32) {
        self.cluster_hi = ((cluster >> 16) as u16).to_le();
        self.cluster_lo = (cluster as u16).to_le();
    }

    pub fn size(&self) -> u32 { u32::from_le(self.size) }
    pub fn set_size(&mut self, size: u32) { self.size = size.to_le(); }

    pub fn created(&self) -> FatDateTime {
        FatDateTime { date: u16::from_le(self.crt_date), time: u16::from_le(self.crt_time) }
    }

    pub fn modified(&self) -> FatDateTime {
        FatDateTime { date: u16::from_le(self.wrt_date), time: u16::from_le(self.wrt_time) }
    }

    pub fn accessed_date(&self) -> u16 { u16::from_le(self.acc_date) }

    /// Stamp modification time and access date.
    pub fn touch(&mut self, now: FatDateTime) {
        self.wrt_time = now.time.to_le();
        self.wrt_date = now.date.to_le();
        self.acc_date = now.date.to_le();
    }

    pub fn listing(&self) -> DirListing {
        DirListing {
            name:       self.display_name(),
            attributes: self.attributes(),
            size:       self.size(),
            cluster:    self.cluster(),
        }
    }
}

impl fmt::Debug for DirEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirEntry")
            .field("name", &self.display_name())
            .field("attributes", &self.attributes())
            .field("cluster", &self.cluster())
            .field("size", &self.size())
            .finish()
    }
}

/// Position of a slot: the cluster holding it and its byte offset there.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EntryLocation {
    pub cluster: u32,
    pub offset:  u32,
}

/// A live entry together with where it lives.
#[derive(Clone, Copy, Debug)]
pub struct DirEntryRef {
    pub entry:    DirEntry,
    pub location: EntryLocation,
    /// First cluster of the directory containing the entry.
    pub parent:   u32,
}

// ─── Directory operations ─────────────────────────────────────────────────────

impl<D: ImageStore> Volume<D> {
    fn slot_offset(&self, loc: EntryLocation) -> Result<u64> {
        if loc.offset as usize % DIR_ENTRY_SIZE != 0 || loc.offset >= self.geo.cluster_size {
            return Err(FsError::Corrupted);
        }
        Ok(self.cluster_offset(loc.cluster)? + loc.offset as u64)
    }

    pub fn read_dir_entry(&mut self, loc: EntryLocation) -> Result<DirEntry> {
        let off = self.slot_offset(loc)?;
        let mut raw = [0u8; DIR_ENTRY_SIZE];
        self.disk.read_at(off, &mut raw)?;
        Ok(DirEntry::from_bytes(&raw))
    }

    pub fn write_dir_entry(&mut self, loc: EntryLocation, entry: &DirEntry) -> Result<()> {
        let off = self.slot_offset(loc)?;
        self.disk.write_at(off, &entry.to_bytes())?;
        self.disk.flush()
    }

    /// Visit live entries of `dir` in on-disk order until the end marker.
    /// Deleted slots, long-name entries and volume labels are skipped.
    ///
    /// The chain is followed one link at a time, so nothing past the cluster
    /// holding the end marker is read.
    fn scan_dir<T>(
        &mut self,
        dir: u32,
        mut visit: impl FnMut(&DirEntryRef) -> ControlFlow<T>,
    ) -> Result<Option<T>> {
        let mut buf = vec![0u8; self.geo.cluster_size as usize];
        let mut cur = Some(dir);
        let mut steps = 0u32;
        while let Some(cluster) = cur {
            if steps >= self.geo.total_clusters {
                log::warn!("dir: chain of {dir} does not terminate");
                return Err(FsError::Corrupted);
            }
            steps += 1;
            self.read_cluster(cluster, &mut buf)?;
            for (i, raw) in buf.chunks_exact(DIR_ENTRY_SIZE).enumerate() {
                let raw: &[u8; DIR_ENTRY_SIZE] = raw.try_into().map_err(|_| FsError::Corrupted)?;
                let entry = DirEntry::from_bytes(raw);
                if entry.is_end() { return Ok(None); }
                if entry.is_deleted() || entry.is_long_name() || entry.is_volume_label() { continue; }
                let found = DirEntryRef {
                    entry,
                    location: EntryLocation { cluster, offset: (i * DIR_ENTRY_SIZE) as u32 },
                    parent: dir,
                };
                if let ControlFlow::Break(t) = visit(&found) {
                    return Ok(Some(t));
                }
            }
            cur = self.next_cluster(cluster)?;
        }
        Ok(None)
    }

    /// Entry named `name` in `dir`, if any. Names compare in 8.3 form, so
    /// the match is case-insensitive.
    pub fn try_find_entry(&mut self, dir: u32, name: &str) -> Result<Option<DirEntryRef>> {
        let wanted = name::to_8_3(name);
        self.scan_dir(dir, |e| {
            if e.entry.name() == wanted { ControlFlow::Break(*e) } else { ControlFlow::Continue(()) }
        })
    }

    /// Like [`try_find_entry`](Self::try_find_entry), but absence is `NotFound`.
    pub fn find_entry(&mut self, dir: u32, name: &str) -> Result<DirEntryRef> {
        self.try_find_entry(dir, name)?.ok_or(FsError::NotFound)
    }

    /// Store `entry` in the first free slot of `dir`, growing the directory
    /// by one cluster when every slot is in use.
    pub fn add_entry(&mut self, dir: u32, entry: &DirEntry) -> Result<EntryLocation> {
        let clusters = self.chain(dir)?;
        let mut buf = vec![0u8; self.geo.cluster_size as usize];
        for &cluster in &clusters {
            self.read_cluster(cluster, &mut buf)?;
            let slot = buf
                .chunks_exact(DIR_ENTRY_SIZE)
                .position(|raw| raw[0] == SLOT_END || raw[0] == SLOT_DELETED);
            if let Some(i) = slot {
                let loc = EntryLocation { cluster, offset: (i * DIR_ENTRY_SIZE) as u32 };
                self.write_dir_entry(loc, entry)?;
                log::debug!("dir: added {} to {dir}", entry.display_name());
                return Ok(loc);
            }
        }

        let last = clusters.last().copied().ok_or(FsError::Corrupted)?;
        let grown = self.allocate_cluster(last)?;
        let loc = EntryLocation { cluster: grown, offset: 0 };
        self.write_dir_entry(loc, entry)?;
        log::debug!("dir: grew {dir} with cluster {grown} for {}", entry.display_name());
        Ok(loc)
    }

    /// Tombstone the slot at `loc`. Only the first name byte changes.
    pub fn remove_entry(&mut self, loc: EntryLocation) -> Result<()> {
        let off = self.slot_offset(loc)?;
        self.disk.write_at(off, &[SLOT_DELETED])?;
        self.disk.flush()?;
        log::debug!("dir: removed entry at {}:{}", loc.cluster, loc.offset);
        Ok(())
    }

    /// True when `dir` holds nothing but `.` and `..`.
    pub fn is_dir_empty(&mut self, dir: u32) -> Result<bool> {
        let other = self.scan_dir(dir, |e| {
            if e.entry.is_dot_entry() { ControlFlow::Continue(()) } else { ControlFlow::Break(()) }
        })?;
        Ok(other.is_none())
    }

    /// Live entries of `dir`, including `.` and `..` where present.
    pub fn list(&mut self, dir: u32) -> Result<Vec<DirListing>> {
        let mut out = Vec::new();
        self.scan_dir(dir, |e| {
            out.push(e.entry.listing());
            ControlFlow::<()>::Continue(())
        })?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::to_8_3;
    use crate::testing::{disk_with_file, mount, small_volume};

    fn file(name: &str) -> DirEntry {
        DirEntry::new(to_8_3(name), Attributes::ARCHIVE, 0, FatDateTime::EPOCH)
    }

    #[test]
    fn entry_layout_matches_disk_format() {
        let mut e = DirEntry::new(to_8_3("hello.txt"), Attributes::ARCHIVE, 0x0012_3456, FatDateTime::EPOCH);
        e.set_size(5000);
        let raw = e.to_bytes();
        assert_eq!(&raw[0..11], b"HELLO   TXT");
        assert_eq!(raw[11], 0x20);
        assert_eq!(&raw[20..22], &0x0012u16.to_le_bytes());
        assert_eq!(&raw[26..28], &0x3456u16.to_le_bytes());
        assert_eq!(&raw[28..32], &5000u32.to_le_bytes());
        let back = DirEntry::from_bytes(&raw);
        assert_eq!(back.cluster(), 0x0012_3456);
        assert_eq!(back.size(), 5000);
        assert_eq!(back.modified(), FatDateTime::EPOCH);
    }

    #[test]
    fn add_then_find() {
        let mut vol = small_volume();
        let root = vol.root_cluster();
        let loc = vol.add_entry(root, &file("a.txt")).unwrap();
        assert_eq!(loc, EntryLocation { cluster: root, offset: 0 });

        let found = vol.find_entry(root, "A.TXT").unwrap();
        assert_eq!(found.location, loc);
        assert_eq!(found.parent, root);
        assert!(vol.try_find_entry(root, "a.txt").unwrap().is_some());
        assert_eq!(vol.find_entry(root, "b.txt").unwrap_err(), FsError::NotFound);
    }

    #[test]
    fn remove_only_marks_first_byte() {
        let mut vol = small_volume();
        let root = vol.root_cluster();
        let mut e = file("gone.bin");
        e.set_size(77);
        let loc = vol.add_entry(root, &e).unwrap();
        vol.remove_entry(loc).unwrap();

        let raw = vol.read_dir_entry(loc).unwrap().to_bytes();
        assert_eq!(raw[0], 0xE5);
        assert_eq!(&raw[1..11], b"ONE    BIN");
        assert_eq!(&raw[28..32], &77u32.to_le_bytes());
        assert_eq!(vol.find_entry(root, "gone.bin").unwrap_err(), FsError::NotFound);
    }

    #[test]
    fn deleted_slot_is_reused() {
        let mut vol = small_volume();
        let root = vol.root_cluster();
        let first = vol.add_entry(root, &file("one")).unwrap();
        vol.add_entry(root, &file("two")).unwrap();
        vol.remove_entry(first).unwrap();
        assert_eq!(vol.add_entry(root, &file("three")).unwrap(), first);
        // "two" is still reachable past the reused slot.
        assert!(vol.try_find_entry(root, "two").unwrap().is_some());
    }

    #[test]
    fn search_stops_at_end_marker() {
        let mut vol = small_volume();
        let root = vol.root_cluster();
        // A live-looking record after the terminator must stay invisible.
        let hidden = EntryLocation { cluster: root, offset: 64 };
        vol.write_dir_entry(hidden, &file("ghost")).unwrap();
        assert!(vol.try_find_entry(root, "ghost").unwrap().is_none());
    }

    #[test]
    fn links_past_the_end_marker_are_not_followed() {
        let mut vol = small_volume();
        let root = vol.root_cluster();
        vol.add_entry(root, &file("a")).unwrap();
        // Point the root at a reserved cluster; the terminator comes first.
        vol.set_fat_entry(root, 1).unwrap();
        assert!(vol.find_entry(root, "a").is_ok());
        assert!(vol.try_find_entry(root, "zz").unwrap().is_none());
        assert_eq!(vol.list(root).unwrap().len(), 1);
        assert!(!vol.is_dir_empty(root).unwrap());
        assert_eq!(vol.chain(root).unwrap_err(), FsError::Corrupted);
    }

    #[test]
    fn unterminated_full_directory_is_corrupt() {
        let mut vol = small_volume();
        let root = vol.root_cluster();
        for i in 0..vol.geo.entries_per_cluster() {
            vol.add_entry(root, &file(&alloc::format!("f{i}"))).unwrap();
        }
        // No end marker in the only cluster, and the link loops back on itself.
        vol.set_fat_entry(root, root).unwrap();
        assert_eq!(vol.try_find_entry(root, "zz").unwrap_err(), FsError::Corrupted);
    }

    #[test]
    fn long_name_entries_are_skipped() {
        let mut vol = small_volume();
        let root = vol.root_cluster();
        let lfn = DirEntry::new(to_8_3("lfnpart"), Attributes::LONG_NAME, 0, FatDateTime::EPOCH);
        vol.add_entry(root, &lfn).unwrap();
        vol.add_entry(root, &file("real")).unwrap();
        assert!(vol.try_find_entry(root, "lfnpart").unwrap().is_none());
        let names: Vec<_> = vol.list(root).unwrap().into_iter().map(|l| l.name).collect();
        assert_eq!(names, ["REAL"]);
    }

    #[test]
    fn full_cluster_grows_directory() {
        let mut vol = small_volume();
        let root = vol.root_cluster();
        let per_cluster = vol.geo.entries_per_cluster();
        for i in 0..per_cluster {
            let loc = vol.add_entry(root, &file(&alloc::format!("f{i}"))).unwrap();
            assert_eq!(loc.cluster, root);
        }
        assert_eq!(vol.chain(root).unwrap().len(), 1);

        let loc = vol.add_entry(root, &file("overflow")).unwrap();
        let chain = vol.chain(root).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(loc, EntryLocation { cluster: chain[1], offset: 0 });
        assert!(vol.try_find_entry(root, "overflow").unwrap().is_some());
        assert_eq!(vol.list(root).unwrap().len(), per_cluster as usize + 1);
    }

    #[test]
    fn emptiness_ignores_dot_entries() {
        let mut vol = small_volume();
        let dir = vol.allocate_cluster(0).unwrap();
        assert!(vol.is_dir_empty(dir).unwrap());
        vol.add_entry(dir, &DirEntry::new(name::DOT, Attributes::DIRECTORY, dir, FatDateTime::EPOCH)).unwrap();
        vol.add_entry(dir, &DirEntry::new(name::DOT_DOT, Attributes::DIRECTORY, 0, FatDateTime::EPOCH)).unwrap();
        assert!(vol.is_dir_empty(dir).unwrap());

        let loc = vol.add_entry(dir, &file("x")).unwrap();
        assert!(!vol.is_dir_empty(dir).unwrap());
        vol.remove_entry(loc).unwrap();
        assert!(vol.is_dir_empty(dir).unwrap());
    }

    #[test]
    fn finds_files_written_by_fatfs() {
        let mut vol = mount(disk_with_file("HELLO.TXT", b"Hello"));
        let root = vol.root_cluster();
        let e = vol.find_entry(root, "hello.txt").unwrap();
        assert_eq!(e.entry.size(), 5);
        assert!(!e.entry.is_dir());
        assert!(vol.geo.is_data_cluster(e.entry.cluster()));
    }
}
