//! Open-file table.
//!
//! Fixed capacity, set at mount. A handle carries a copy of the file's first
//! cluster and size, plus the location of its directory entry so writes can
//! update the entry without searching for it again.

use alloc::string::String;
use alloc::vec::Vec;

use fat32_types::{FsError, HandleId, OpenFileInfo, OpenMode, Result};

use crate::dir::EntryLocation;
use crate::image::ImageStore;
use crate::name::ShortName;
use crate::volume::Volume;

#[derive(Clone, Debug)]
pub struct OpenFile {
    /// Decoded name, e.g. `"HELLO.TXT"`.
    pub name:          String,
    pub short_name:    ShortName,
    /// Working-directory path at the time of opening.
    pub path:          String,
    pub dir_cluster:   u32,
    pub first_cluster: u32,
    pub size:          u32,
    pub offset:        u32,
    pub mode:          OpenMode,
    pub entry:         EntryLocation,
}

pub struct OpenFileTable {
    slots: Vec<Option<OpenFile>>,
}

impl OpenFileTable {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots }
    }

    pub fn capacity(&self) -> usize { self.slots.len() }

    pub fn len(&self) -> usize { self.slots.iter().flatten().count() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Place `file` in the lowest empty slot.
    pub fn insert(&mut self, file: OpenFile) -> Result<HandleId> {
        let slot = self.slots.iter().position(Option::is_none).ok_or(FsError::TooManyOpenFiles)?;
        self.slots[slot] = Some(file);
        Ok(HandleId::new(slot))
    }

    pub fn get(&self, id: HandleId) -> Result<&OpenFile> {
        self.slots.get(id.slot()).and_then(Option::as_ref).ok_or(FsError::NotOpen)
    }

    pub fn get_mut(&mut self, id: HandleId) -> Result<&mut OpenFile> {
        self.slots.get_mut(id.slot()).and_then(Option::as_mut).ok_or(FsError::NotOpen)
    }

    pub fn remove(&mut self, id: HandleId) -> Result<OpenFile> {
        self.slots.get_mut(id.slot()).and_then(Option::take).ok_or(FsError::NotOpen)
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|s| *s = None);
    }

    pub fn iter(&self) -> impl Iterator<Item = (HandleId, &OpenFile)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|f| (HandleId::new(i), f)))
    }

    /// Handle of the file with this short name opened from `path`.
    pub fn find(&self, short_name: &ShortName, path: &str) -> Option<HandleId> {
        self.iter()
            .find(|(_, f)| &f.short_name == short_name && f.path == path)
            .map(|(id, _)| id)
    }

    /// Whether the entry `short_name` of directory `dir_cluster` is open.
    pub fn is_open_in(&self, dir_cluster: u32, short_name: &ShortName) -> bool {
        self.iter().any(|(_, f)| f.dir_cluster == dir_cluster && &f.short_name == short_name)
    }

    /// Whether some handle holds the directory slot at `loc`.
    pub fn is_open_at(&self, loc: EntryLocation) -> bool {
        self.iter().any(|(_, f)| f.entry == loc)
    }

    /// Whether any open file lives directly in `dir_cluster`.
    pub fn any_in_dir(&self, dir_cluster: u32) -> bool {
        self.iter().any(|(_, f)| f.dir_cluster == dir_cluster)
    }
}

// ─── Handle operations ────────────────────────────────────────────────────────

impl<D: ImageStore> Volume<D> {
    /// Open `name` in the working directory.
    ///
    /// Fails with `NotFound`, `IsADirectory`, `AlreadyOpen` or
    /// `TooManyOpenFiles`, checked in that order.
    pub fn open(&mut self, name: &str, mode: OpenMode) -> Result<HandleId> {
        let found = self.find_entry(self.current_dir, name)?;
        if found.entry.is_dir() {
            return Err(FsError::IsADirectory);
        }
        let short_name = found.entry.name();
        if self.files.find(&short_name, &self.current_path).is_some()
            || self.files.is_open_at(found.location)
        {
            return Err(FsError::AlreadyOpen);
        }
        let file = OpenFile {
            name: found.entry.display_name(),
            short_name,
            path: self.current_path.clone(),
            dir_cluster: found.parent,
            first_cluster: found.entry.cluster(),
            size: found.entry.size(),
            offset: 0,
            mode,
            entry: found.location,
        };
        let id = self.files.insert(file)?;
        log::debug!("open: {name} as slot {} ({mode:?})", id.slot());
        Ok(id)
    }

    pub fn close(&mut self, id: HandleId) -> Result<()> {
        let file = self.files.remove(id)?;
        log::debug!("close: {} (slot {})", file.name, id.slot());
        Ok(())
    }

    /// Set the offset of `id`. Offsets past the end of the file are refused.
    pub fn seek(&mut self, id: HandleId, offset: u32) -> Result<()> {
        let file = self.files.get_mut(id)?;
        if offset > file.size {
            return Err(FsError::InvalidOffset);
        }
        file.offset = offset;
        Ok(())
    }

    /// Handle of `name` if it is open from the working directory.
    pub fn handle(&self, name: &str) -> Result<HandleId> {
        self.files
            .find(&crate::name::to_8_3(name), &self.current_path)
            .ok_or(FsError::NotOpen)
    }

    pub fn open_file(&self, id: HandleId) -> Result<&OpenFile> {
        self.files.get(id)
    }

    /// Snapshot of every open handle, in slot order.
    pub fn open_files(&self) -> Vec<OpenFileInfo> {
        self.files
            .iter()
            .map(|(handle, f)| OpenFileInfo {
                handle,
                name:   f.name.clone(),
                path:   f.path.clone(),
                mode:   f.mode,
                offset: f.offset,
                size:   f.size,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::name::to_8_3;
    use crate::options::{MountOptions, NullTimeProvider};
    use crate::testing::{small_volume, ImageBuilder};

    fn dummy(name: &str, dir: u32) -> OpenFile {
        OpenFile {
            name: name.into(),
            short_name: to_8_3(name),
            path: "/".into(),
            dir_cluster: dir,
            first_cluster: 0,
            size: 0,
            offset: 0,
            mode: OpenMode::READ,
            entry: EntryLocation { cluster: dir, offset: 0 },
        }
    }

    #[test]
    fn table_fills_lowest_slot_first() {
        let mut t = OpenFileTable::new(3);
        let a = t.insert(dummy("A", 2)).unwrap();
        let b = t.insert(dummy("B", 2)).unwrap();
        assert_eq!((a.slot(), b.slot()), (0, 1));
        t.remove(a).unwrap();
        assert_eq!(t.insert(dummy("C", 2)).unwrap().slot(), 0);
        assert_eq!(t.len(), 2);
    }

    #[test]
    fn table_capacity_is_fixed() {
        let mut t = OpenFileTable::new(1);
        t.insert(dummy("A", 2)).unwrap();
        assert_eq!(t.insert(dummy("B", 2)).unwrap_err(), FsError::TooManyOpenFiles);
    }

    #[test]
    fn stale_handles_are_not_open() {
        let mut t = OpenFileTable::new(2);
        let a = t.insert(dummy("A", 2)).unwrap();
        t.remove(a).unwrap();
        assert_eq!(t.remove(a).unwrap_err(), FsError::NotOpen);
        assert_eq!(t.get(HandleId::new(99)).unwrap_err(), FsError::NotOpen);
    }

    #[test]
    fn lookups_by_name_and_directory() {
        let mut t = OpenFileTable::new(4);
        let a = t.insert(dummy("a.txt", 5)).unwrap();
        assert_eq!(t.find(&to_8_3("A.TXT"), "/"), Some(a));
        assert_eq!(t.find(&to_8_3("a.txt"), "/sub"), None);
        assert!(t.is_open_in(5, &to_8_3("a.txt")));
        assert!(!t.is_open_in(6, &to_8_3("a.txt")));
        assert!(t.any_in_dir(5));
        assert!(t.is_open_at(EntryLocation { cluster: 5, offset: 0 }));
        assert!(!t.is_open_at(EntryLocation { cluster: 5, offset: 32 }));
        t.clear();
        assert!(t.is_empty());
    }

    #[test]
    fn open_checks_run_in_order() {
        let mut vol = small_volume();
        let root = vol.root_cluster();
        assert_eq!(vol.open("nope", OpenMode::READ).unwrap_err(), FsError::NotFound);

        vol.create_dir(root, "sub").unwrap();
        assert_eq!(vol.open("sub", OpenMode::READ).unwrap_err(), FsError::IsADirectory);

        vol.create_file(root, "f").unwrap();
        let h = vol.open("f", OpenMode::READ).unwrap();
        assert_eq!(vol.open("F", OpenMode::WRITE).unwrap_err(), FsError::AlreadyOpen);
        assert_eq!(vol.handle("f").unwrap(), h);
    }

    #[test]
    fn open_close_seek() {
        let mut vol = small_volume();
        let root = vol.root_cluster();
        vol.create_file(root, "f").unwrap();
        let h = vol.open("f", OpenMode::READ_WRITE).unwrap();
        assert_eq!(vol.open_file(h).unwrap().offset, 0);

        vol.write(h, b"0123456789").unwrap();
        vol.seek(h, 10).unwrap();
        assert_eq!(vol.seek(h, 11).unwrap_err(), FsError::InvalidOffset);
        vol.seek(h, 3).unwrap();
        assert_eq!(vol.open_file(h).unwrap().offset, 3);

        vol.close(h).unwrap();
        assert_eq!(vol.close(h).unwrap_err(), FsError::NotOpen);
        assert_eq!(vol.seek(h, 0).unwrap_err(), FsError::NotOpen);
        assert_eq!(vol.handle("f").unwrap_err(), FsError::NotOpen);
    }

    #[test]
    fn table_full_after_configured_limit() {
        let disk = ImageBuilder::new().sectors_per_cluster(4).clusters(64).build();
        let opts = MountOptions::new().max_open_files(2).time_provider(&NullTimeProvider);
        let mut vol = Volume::mount_store(disk, opts).unwrap();
        let root = vol.root_cluster();
        for n in ["a", "b", "c"] {
            vol.create_file(root, n).unwrap();
        }
        vol.open("a", OpenMode::READ).unwrap();
        vol.open("b", OpenMode::READ).unwrap();
        assert_eq!(vol.open("c", OpenMode::READ).unwrap_err(), FsError::TooManyOpenFiles);
    }

    #[test]
    fn open_files_reports_every_slot() {
        let mut vol = small_volume();
        let root = vol.root_cluster();
        vol.create_file(root, "one.txt").unwrap();
        vol.create_file(root, "two.txt").unwrap();
        let a = vol.open("one.txt", OpenMode::READ).unwrap();
        let b = vol.open("two.txt", OpenMode::WRITE).unwrap();
        vol.write(b, b"xy").unwrap();

        let infos = vol.open_files();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].handle, a);
        assert_eq!(infos[0].name, "ONE.TXT");
        assert_eq!(infos[0].path, "/");
        assert_eq!(infos[1].mode, OpenMode::WRITE);
        assert_eq!((infos[1].offset, infos[1].size), (2, 2));
    }
}
