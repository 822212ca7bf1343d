//! A mounted FAT32 volume.
//!
//! `Volume` owns the backing store, the geometry computed at mount, the
//! open-file table and the working directory. The FAT, cluster, directory
//! and file I/O layers are implemented on it in their own modules.

use alloc::string::String;
use alloc::vec::Vec;

use fat32_types::{Attributes, DirListing, FsError, Result, VolumeInfo};

use crate::dir::DirEntryRef;
use crate::geometry::Geometry;
use crate::handle::OpenFileTable;
use crate::image::ImageStore;
use crate::options::{MountOptions, TimeProvider};

pub struct Volume<D> {
    pub(crate) disk:         D,
    pub(crate) geo:          Geometry,
    pub(crate) files:        OpenFileTable,
    pub(crate) time:         &'static dyn TimeProvider,
    pub(crate) current_dir:  u32,
    pub(crate) current_path: String,
    image_name:              String,
}

impl<D: ImageStore> Volume<D> {
    /// Mount the image held in `disk`.
    pub fn mount_store(mut disk: D, options: MountOptions) -> Result<Self> {
        let geo = Geometry::read(&mut disk)?;
        if disk.len() < geo.image_size() {
            log::warn!("mount: image is {} bytes, boot sector claims {}", disk.len(), geo.image_size());
        }
        log::info!(
            "mount: {} clusters of {} bytes, {} FAT(s) of {} sectors, root at cluster {}",
            geo.total_clusters, geo.cluster_size, geo.num_fats, geo.fat_size_sectors, geo.root_cluster
        );
        Ok(Self {
            disk,
            current_dir: geo.root_cluster,
            geo,
            files: OpenFileTable::new(options.max_open_files),
            time: options.time_provider,
            current_path: String::from("/"),
            image_name: String::new(),
        })
    }

    /// Close every handle, flush, and hand the backing store back.
    pub fn unmount(mut self) -> Result<D> {
        let open = self.files.len();
        self.files.clear();
        self.disk.flush()?;
        log::info!("unmount: {} ({open} handle(s) dropped)", self.image_name);
        Ok(self.disk)
    }

    // ─── Accessors ────────────────────────────────────────────────────────────

    pub fn geometry(&self) -> &Geometry { &self.geo }
    pub fn root_cluster(&self) -> u32 { self.geo.root_cluster }
    pub fn current_dir(&self) -> u32 { self.current_dir }
    pub fn current_path(&self) -> &str { &self.current_path }
    pub fn image_name(&self) -> &str { &self.image_name }
    pub fn store(&self) -> &D { &self.disk }

    pub fn info(&self) -> VolumeInfo {
        VolumeInfo {
            image_name:          self.image_name.clone(),
            root_cluster:        self.geo.root_cluster,
            bytes_per_sector:    self.geo.bytes_per_sector,
            sectors_per_cluster: self.geo.sectors_per_cluster,
            total_clusters:      self.geo.total_clusters,
            fat_entry_count:     self.geo.fat_entry_count(),
            image_size:          self.geo.image_size(),
        }
    }

    // ─── Navigation ───────────────────────────────────────────────────────────

    /// Entry `name` of the working directory, if present.
    pub fn resolve(&mut self, name: &str) -> Result<Option<DirEntryRef>> {
        self.try_find_entry(self.current_dir, name)
    }

    pub fn list_current(&mut self) -> Result<Vec<DirListing>> {
        self.list(self.current_dir)
    }

    /// Make `name` the working directory. `..` never climbs above `/`.
    pub fn change_dir(&mut self, name: &str) -> Result<()> {
        match name {
            "." => {}
            ".." => {
                if self.current_dir == self.geo.root_cluster {
                    return Ok(());
                }
                let up = self.find_entry(self.current_dir, "..")?;
                self.current_dir = self.dir_cluster_of(&up.entry);
                if let Some(i) = self.current_path.rfind('/') {
                    self.current_path.truncate(i.max(1));
                }
            }
            _ => {
                let found = self.find_entry(self.current_dir, name)?;
                if !found.entry.is_dir() {
                    return Err(FsError::NotADirectory);
                }
                self.current_dir = self.dir_cluster_of(&found.entry);
                if !self.current_path.ends_with('/') {
                    self.current_path.push('/');
                }
                self.current_path.push_str(&found.entry.display_name());
            }
        }
        log::debug!("cd: {} (cluster {})", self.current_path, self.current_dir);
        Ok(())
    }

    /// Resolve a `/`-separated path. Absolute paths start at the root,
    /// relative ones at the working directory; an empty path is the root.
    pub fn lookup_path(&mut self, path: &str) -> Result<DirListing> {
        let root = self.geo.root_cluster;
        let mut cur = if path.starts_with('/') || path.is_empty() { root } else { self.current_dir };
        let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();

        let mut last = None;
        for (i, part) in parts.iter().enumerate() {
            if cur == root && (*part == "." || *part == "..") {
                last = None;
                continue;
            }
            let found = self.find_entry(cur, part)?;
            if !found.entry.is_dir() && i + 1 < parts.len() {
                return Err(FsError::NotADirectory);
            }
            cur = self.dir_cluster_of(&found.entry);
            last = if found.entry.is_dir() && cur == root { None } else { Some(found.entry.listing()) };
        }

        Ok(last.unwrap_or(DirListing {
            name:       String::from("/"),
            attributes: Attributes::DIRECTORY,
            size:       0,
            cluster:    root,
        }))
    }
}

// ─── Mounting by path ─────────────────────────────────────────────────────────

#[cfg(feature = "std")]
impl Volume<crate::image::FileImage> {
    /// Mount the image file at `path` with default options.
    pub fn mount(path: impl AsRef<std::path::Path>) -> Result<Self> {
        Self::mount_with(path, MountOptions::new())
    }

    pub fn mount_with(path: impl AsRef<std::path::Path>, options: MountOptions) -> Result<Self> {
        let path = path.as_ref();
        let disk = crate::image::FileImage::open(path).map_err(|e| {
            log::warn!("mount: cannot open {}: {e}", path.display());
            FsError::Mount
        })?;
        let mut vol = Self::mount_store(disk, options)?;
        vol.image_name = image_name_of(path);
        Ok(vol)
    }
}

/// File name of `path` up to its `.img` suffix.
#[cfg(feature = "std")]
fn image_name_of(path: &std::path::Path) -> String {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    if let Some(i) = name.find(".img") {
        name.truncate(i);
    }
    name
}
