//! Creating, removing and moving directory entries.

use alloc::vec::Vec;
use fat32_types::{Attributes, FsError, Result};

use crate::dir::{DirEntry, DirEntryRef, EntryLocation, DIR_ENTRY_SIZE};
use crate::image::ImageStore;
use crate::name::{self, DOT, DOT_DOT};
use crate::volume::Volume;

impl<D: ImageStore> Volume<D> {
    /// Cluster a directory entry points at, with 0 meaning the root.
    pub(crate) fn dir_cluster_of(&self, entry: &DirEntry) -> u32 {
        match entry.cluster() {
            0 => self.geo.root_cluster,
            c => c,
        }
    }

    /// Value stored in a `..` entry that refers to `dir`.
    fn parent_link(&self, dir: u32) -> u32 {
        if dir == self.geo.root_cluster { 0 } else { dir }
    }

    fn ensure_absent(&mut self, dir: u32, name: &str) -> Result<()> {
        match self.try_find_entry(dir, name)? {
            Some(_) => Err(FsError::AlreadyExists),
            None => Ok(()),
        }
    }

    /// Create an empty regular file in `dir`. No cluster is allocated until
    /// the first write.
    pub fn create_file(&mut self, dir: u32, name: &str) -> Result<DirEntryRef> {
        name::validate_new(name)?;
        self.ensure_absent(dir, name)?;
        let entry = DirEntry::new(name::to_8_3(name), Attributes::ARCHIVE, 0, self.time.now());
        let location = self.add_entry(dir, &entry)?;
        log::debug!("creat: {} in {dir}", entry.display_name());
        Ok(DirEntryRef { entry, location, parent: dir })
    }

    /// Create a subdirectory of `dir` holding `.` and `..`.
    pub fn create_dir(&mut self, dir: u32, name: &str) -> Result<DirEntryRef> {
        name::validate_new(name)?;
        self.ensure_absent(dir, name)?;

        let now = self.time.now();
        let cluster = self.allocate_cluster(0)?;
        let entry = DirEntry::new(name::to_8_3(name), Attributes::DIRECTORY, cluster, now);
        let location = match self.link_new_dir(dir, cluster, &entry) {
            Ok(loc) => loc,
            Err(e) => {
                log::warn!("mkdir: {} failed ({e}), releasing cluster {cluster}", entry.display_name());
                self.free_chain(cluster)?;
                return Err(e);
            }
        };
        log::debug!("mkdir: {} in {dir} at cluster {cluster}", entry.display_name());
        Ok(DirEntryRef { entry, location, parent: dir })
    }

    /// Write `.` and `..` into the fresh `cluster`, then add `entry` to `dir`.
    fn link_new_dir(&mut self, dir: u32, cluster: u32, entry: &DirEntry) -> Result<EntryLocation> {
        let now = entry.modified();
        let dot = DirEntry::new(DOT, Attributes::DIRECTORY, cluster, now);
        let dot_dot = DirEntry::new(DOT_DOT, Attributes::DIRECTORY, self.parent_link(dir), now);
        self.write_dir_entry(EntryLocation { cluster, offset: 0 }, &dot)?;
        self.write_dir_entry(EntryLocation { cluster, offset: DIR_ENTRY_SIZE as u32 }, &dot_dot)?;
        self.add_entry(dir, entry)
    }

    /// Delete the regular file `name` from `dir` and release its clusters.
    pub fn remove_file(&mut self, dir: u32, name: &str) -> Result<()> {
        let found = self.find_entry(dir, name)?;
        if found.entry.is_dir() {
            return Err(FsError::IsADirectory);
        }
        if self.files.is_open_in(dir, &found.entry.name()) {
            return Err(FsError::Busy);
        }
        self.free_chain(found.entry.cluster())?;
        self.remove_entry(found.location)?;
        log::debug!("rm: {} from {dir}", found.entry.display_name());
        Ok(())
    }

    /// Delete the empty directory `name` from `dir`.
    pub fn remove_dir(&mut self, dir: u32, name: &str) -> Result<()> {
        if name == "." || name == ".." {
            return Err(FsError::InvalidName);
        }
        let found = self.find_entry(dir, name)?;
        if !found.entry.is_dir() {
            return Err(FsError::NotADirectory);
        }
        let target = found.entry.cluster();
        if !self.geo.is_data_cluster(target) || target == self.geo.root_cluster {
            return Err(FsError::Corrupted);
        }
        if !self.is_dir_empty(target)? {
            return Err(FsError::DirectoryNotEmpty);
        }
        if self.files.any_in_dir(target) || target == self.current_dir {
            return Err(FsError::Busy);
        }
        self.free_chain(target)?;
        self.remove_entry(found.location)?;
        log::debug!("rmdir: {} from {dir}", found.entry.display_name());
        Ok(())
    }

    /// Rename `src` within `dir`, or move it into `dest` when `dest` names
    /// an existing directory.
    ///
    /// An existing non-directory `dest` is never overwritten. A directory
    /// that moves gets its `..` entry repointed at the new parent.
    pub fn move_entry(&mut self, dir: u32, src: &str, dest: &str) -> Result<()> {
        if src == "." || src == ".." {
            return Err(FsError::InvalidName);
        }
        let found = self.find_entry(dir, src)?;
        let short = found.entry.name();
        if self.files.is_open_in(dir, &short) {
            return Err(FsError::Busy);
        }
        let moving_dir = found.entry.is_dir();
        if moving_dir && self.holds_open_files(self.dir_cluster_of(&found.entry))? {
            return Err(FsError::Busy);
        }

        match self.try_find_entry(dir, dest)? {
            Some(target) if target.entry.is_dir() => {
                let into = self.dir_cluster_of(&target.entry);
                if moving_dir {
                    let src_cluster = found.entry.cluster();
                    if self.is_within(into, src_cluster)? {
                        return Err(FsError::InvalidName);
                    }
                }
                if self.try_find_entry(into, &name::from_8_3(&short))?.is_some() {
                    return Err(FsError::AlreadyExists);
                }
                self.add_entry(into, &found.entry)?;
                self.remove_entry(found.location)?;
                if moving_dir {
                    let loc = EntryLocation { cluster: found.entry.cluster(), offset: DIR_ENTRY_SIZE as u32 };
                    let mut dot_dot = self.read_dir_entry(loc)?;
                    if dot_dot.name() == DOT_DOT {
                        dot_dot.set_cluster(self.parent_link(into));
                        self.write_dir_entry(loc, &dot_dot)?;
                    } else {
                        log::warn!("mv: {} has no '..' in its second slot", found.entry.display_name());
                    }
                }
                log::debug!("mv: {} from {dir} into {into}", found.entry.display_name());
            }
            Some(_) => return Err(FsError::AlreadyExists),
            None => {
                name::validate_new(dest)?;
                let mut renamed = found.entry;
                renamed.set_name(name::to_8_3(dest));
                self.write_dir_entry(found.location, &renamed)?;
                log::debug!("mv: {} -> {} in {dir}", found.entry.display_name(), renamed.display_name());
            }
        }
        Ok(())
    }

    /// Whether any open file lives in `dir` or one of its subdirectories.
    fn holds_open_files(&mut self, dir: u32) -> Result<bool> {
        let parents: Vec<u32> = self.files.iter().map(|(_, f)| f.dir_cluster).collect();
        for parent in parents {
            if self.is_within(parent, dir)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Whether `dir` is `ancestor` or lies somewhere beneath it, following
    /// `..` links up to the root.
    fn is_within(&mut self, dir: u32, ancestor: u32) -> Result<bool> {
        let root = self.geo.root_cluster;
        let mut cur = dir;
        for _ in 0..=self.geo.total_clusters {
            if cur == ancestor {
                return Ok(true);
            }
            if cur == root {
                return Ok(false);
            }
            cur = match self.try_find_entry(cur, "..")? {
                Some(up) => self.dir_cluster_of(&up.entry),
                None => return Ok(false),
            };
        }
        log::warn!("mv: '..' links from {dir} never reach the root");
        Err(FsError::Corrupted)
    }
}
