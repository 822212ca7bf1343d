//! Reading and writing through open handles.
//!
//! Data moves a cluster at a time. Writes read-modify-write any partially
//! covered cluster, extend the chain as they go and touch the directory
//! entry exactly once at the end.

use alloc::vec;
use alloc::vec::Vec;

use fat32_types::{FsError, HandleId, Result};

use crate::image::ImageStore;
use crate::volume::Volume;

impl<D: ImageStore> Volume<D> {
    /// Read up to `len` bytes from the current offset of `id`.
    ///
    /// The request is clamped to the end of the file; at end of file the
    /// result is empty. The offset advances by the number of bytes returned.
    pub fn read(&mut self, id: HandleId, len: usize) -> Result<Vec<u8>> {
        let file = self.files.get(id)?;
        if !file.mode.can_read() {
            return Err(FsError::NotReadable);
        }
        let (first, offset) = (file.first_cluster, file.offset);
        let want = len.min(file.size.saturating_sub(offset) as usize);
        if want == 0 || first == 0 {
            return Ok(Vec::new());
        }

        let cs = self.geo.cluster_size as usize;
        let Some(mut cluster) = self.seek_cluster(first, offset)? else {
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(want);
        let mut buf = vec![0u8; cs];
        while out.len() < want {
            self.read_cluster(cluster, &mut buf)?;
            let at = (offset as usize + out.len()) % cs;
            let take = (cs - at).min(want - out.len());
            out.extend_from_slice(&buf[at..at + take]);
            if out.len() < want {
                match self.next_cluster(cluster)? {
                    Some(next) => cluster = next,
                    None => {
                        log::warn!("read: chain at {first} ends before the recorded size");
                        break;
                    }
                }
            }
        }

        self.files.get_mut(id)?.offset = offset + out.len() as u32;
        Ok(out)
    }

    /// Write `data` at the current offset of `id`, growing the file as
    /// needed. Returns the number of bytes written.
    ///
    /// If the volume runs out of clusters part-way, the call fails with
    /// `AllocationExhausted` and leaves the handle and the directory entry
    /// as they were. Clusters already linked onto the chain stay there.
    pub fn write(&mut self, id: HandleId, data: &[u8]) -> Result<usize> {
        let file = self.files.get(id)?;
        if !file.mode.can_write() {
            return Err(FsError::NotWritable);
        }
        let (offset, size, mut first) = (file.offset, file.size, file.first_cluster);
        let end = u32::try_from(offset as u64 + data.len() as u64).map_err(|_| FsError::InvalidOffset)?;

        let mut fresh_head = false;
        if !data.is_empty() {
            if first == 0 {
                first = self.allocate_cluster(0)?;
                fresh_head = true;
            }
            if let Err(e) = self.write_chain(first, offset, data) {
                if fresh_head {
                    self.free_chain(first)?;
                }
                return Err(e);
            }
        }

        let new_size = size.max(end);
        self.sync_entry(id, first, new_size)?;

        let file = self.files.get_mut(id)?;
        file.first_cluster = first;
        file.size = new_size;
        file.offset = end;
        log::trace!("write: {} byte(s) to {} at {offset}", data.len(), file.name);
        Ok(data.len())
    }

    /// Cluster containing byte `offset` of the chain at `first`, or `None`
    /// when the chain is shorter than that.
    fn seek_cluster(&mut self, first: u32, offset: u32) -> Result<Option<u32>> {
        let mut cluster = first;
        for _ in 0..offset / self.geo.cluster_size {
            match self.next_cluster(cluster)? {
                Some(next) => cluster = next,
                None => return Ok(None),
            }
        }
        Ok(Some(cluster))
    }

    /// Next cluster of the chain, allocating and linking one at the end.
    fn next_or_grow(&mut self, cluster: u32) -> Result<u32> {
        match self.next_cluster(cluster)? {
            Some(next) => Ok(next),
            None => self.allocate_cluster(cluster),
        }
    }

    fn write_chain(&mut self, first: u32, offset: u32, data: &[u8]) -> Result<()> {
        let cs = self.geo.cluster_size as usize;
        let mut cluster = first;
        for _ in 0..offset / self.geo.cluster_size {
            cluster = self.next_or_grow(cluster)?;
        }

        let mut buf = vec![0u8; cs];
        let mut done = 0usize;
        while done < data.len() {
            let at = (offset as usize + done) % cs;
            let take = (cs - at).min(data.len() - done);
            if take < cs {
                self.read_cluster(cluster, &mut buf)?;
            }
            buf[at..at + take].copy_from_slice(&data[done..done + take]);
            self.write_cluster(cluster, &buf)?;
            done += take;
            if done < data.len() {
                cluster = self.next_or_grow(cluster)?;
            }
        }
        Ok(())
    }

    /// Store first cluster, size and a fresh modification stamp in the
    /// directory entry behind `id`.
    fn sync_entry(&mut self, id: HandleId, first: u32, size: u32) -> Result<()> {
        let loc = self.files.get(id)?.entry;
        let mut entry = self.read_dir_entry(loc)?;
        entry.set_cluster(first);
        entry.set_size(size);
        entry.touch(self.time.now());
        self.write_dir_entry(loc, &entry)
    }
}
