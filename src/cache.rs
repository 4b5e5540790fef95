//! Buffer cache sitting between the metadata engine and the block device.
//!
//! Every on-disk block the engine touches goes through a [`BlockCache`]
//! handle: an in-memory copy of one block with a dirty flag. Mutating the
//! block through `modify` marks it dirty; dropping the last handle releases
//! the cache entry, writing the block back if needed. Holding a handle pins
//! the entry, which is how the superblock keeps the bitmap and inode table
//! resident for the whole mounted lifetime.

use std::collections::VecDeque;
use std::sync::Arc;

use log::warn;
use spin::Mutex;

use crate::block_dev::BlockDevice;
use crate::config::BLOCK_SIZE;
use crate::error::Result;

const CACHE_CAPACITY: usize = 16;

// Keeps the u32 views over the raw bytes aligned.
#[repr(C, align(8))]
#[derive(Debug)]
struct BlockBuf([u8; BLOCK_SIZE]);

#[derive(Debug)]
pub struct BlockCache {
    buf: Box<BlockBuf>,
    block_id: usize,
    device: Arc<dyn BlockDevice>,
    modified: bool,
}

impl BlockCache {
    /// Loads a block from the device into a fresh cache entry.
    fn load(block_id: usize, device: Arc<dyn BlockDevice>) -> Result<Self> {
        let mut buf = Box::new(BlockBuf([0u8; BLOCK_SIZE]));
        device.read_block(block_id, &mut buf.0)?;
        Ok(Self {
            buf,
            block_id,
            device,
            modified: false,
        })
    }

    fn get_ref<T: Sized>(&self, offset: usize) -> &T {
        assert!(offset + size_of::<T>() <= BLOCK_SIZE);
        unsafe { &*(self.buf.0.as_ptr().add(offset) as *const T) }
    }

    fn get_mut<T: Sized>(&mut self, offset: usize) -> &mut T {
        assert!(offset + size_of::<T>() <= BLOCK_SIZE);
        self.modified = true;
        unsafe { &mut *(self.buf.0.as_mut_ptr().add(offset) as *mut T) }
    }

    /// Maps `f` over the value of type `T` stored at `offset`.
    pub fn read<T, V>(&self, offset: usize, f: impl FnOnce(&T) -> V) -> V {
        f(self.get_ref(offset))
    }

    /// Like [`Self::read`] but mutable; marks the block modified.
    pub fn modify<T, V>(&mut self, offset: usize, f: impl FnOnce(&mut T) -> V) -> V {
        f(self.get_mut(offset))
    }

    /// Writes the block back to the device if it has been modified.
    pub fn sync(&mut self) -> Result<()> {
        if self.modified {
            self.device.write_block(self.block_id, &self.buf.0)?;
            self.modified = false;
        }
        Ok(())
    }
}

impl Drop for BlockCache {
    fn drop(&mut self) {
        if self.sync().is_err() {
            warn!("block {} lost on release, device write failed", self.block_id);
        }
    }
}

/// Per-volume cache of recently used blocks, keyed by block id.
#[derive(Debug)]
pub struct BlockCacheManager {
    queue: VecDeque<(usize, Arc<Mutex<BlockCache>>)>,
}

impl BlockCacheManager {
    pub fn new() -> Self {
        Self {
            queue: VecDeque::new(),
        }
    }

    /// Returns a handle to `block_id`, loading it from `device` on a miss.
    /// Entries still referenced elsewhere are never evicted.
    pub fn get(
        &mut self,
        block_id: usize,
        device: Arc<dyn BlockDevice>,
    ) -> Result<Arc<Mutex<BlockCache>>> {
        if let Some((_, entry)) = self.queue.iter().find(|entry| entry.0 == block_id) {
            return Ok(Arc::clone(entry));
        }
        if self.queue.len() == CACHE_CAPACITY {
            if let Some((idx, _)) = self
                .queue
                .iter()
                .enumerate()
                .find(|(_, entry)| Arc::strong_count(&entry.1) == 1)
            {
                self.queue.drain(idx..=idx);
            } else {
                panic!("ran out of block cache entries");
            }
        }
        let entry = Arc::new(Mutex::new(BlockCache::load(block_id, device)?));
        self.queue.push_back((block_id, Arc::clone(&entry)));
        Ok(entry)
    }

    /// Writes every modified cached block back to the device.
    pub fn sync_all(&self) -> Result<()> {
        for (_, entry) in &self.queue {
            entry.lock().sync()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::memdisk::MemDisk;

    #[test]
    fn modified_blocks_write_back_on_sync() {
        let device: Arc<dyn BlockDevice> = Arc::new(MemDisk::new());
        let mut mgr = BlockCacheManager::new();
        let handle = mgr.get(7, Arc::clone(&device)).unwrap();
        handle.lock().modify(0, |v: &mut u32| *v = 0xabcd);
        mgr.sync_all().unwrap();

        let mut buf = [0u8; BLOCK_SIZE];
        device.read_block(7, &mut buf).unwrap();
        assert_eq!(u32::from_le_bytes(buf[..4].try_into().unwrap()), 0xabcd);
    }

    #[test]
    fn same_block_shares_one_entry() {
        let device: Arc<dyn BlockDevice> = Arc::new(MemDisk::new());
        let mut mgr = BlockCacheManager::new();
        let a = mgr.get(3, Arc::clone(&device)).unwrap();
        let b = mgr.get(3, Arc::clone(&device)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn pinned_entries_survive_eviction() {
        let device: Arc<dyn BlockDevice> = Arc::new(MemDisk::new());
        let mut mgr = BlockCacheManager::new();
        let pinned = mgr.get(0, Arc::clone(&device)).unwrap();
        for i in 1..=CACHE_CAPACITY {
            mgr.get(i, Arc::clone(&device)).unwrap();
        }
        let again = mgr.get(0, Arc::clone(&device)).unwrap();
        assert!(Arc::ptr_eq(&pinned, &again));
    }
}
