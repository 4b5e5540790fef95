//! Block allocation over the bitmap block.
//!
//! One bit per block, covering the reserved blocks as well, so an
//! allocated block number can be used as-is with no base offset. The
//! bitmap block stays resident from mount to unmount; allocate and free
//! only mark it modified, write-back happens on the normal sync paths.

use log::debug;

use crate::config::*;
use crate::error::{FsError, Result};
use crate::fs::FileSystem;

impl FileSystem {
    /// Allocates one data block and returns its block number.
    ///
    /// The search walks the bitmap in groups of 8 bits: find the first
    /// group that is not fully saturated, then the first clear bit inside
    /// it. More iterations than a wide scan, but the per-group test stays
    /// trivial.
    pub(crate) fn alloc_block(&mut self) -> Result<u32> {
        if self.info.bfree == 0 {
            return Err(FsError::OutOfSpace);
        }

        let bfree = self.info.bfree;
        let bmap = self.info.bmap.clone();
        let mut bmap = bmap.lock();
        let block = bmap.modify(0, |map: &mut [u8; BITMAP_BYTES]| {
            let Some(group) = map.iter().position(|&byte| byte != 0xFF) else {
                // The free counter says otherwise; the allocator state is
                // beyond repair.
                panic!("block bitmap corrupted: {bfree} blocks free but none tracked");
            };
            let bit = map[group].trailing_ones();
            map[group] |= 1 << bit;
            group as u32 * 8 + bit
        });

        self.info.bfree -= 1;
        debug!("allocated block {block}, {} left", self.info.bfree);
        Ok(block)
    }

    /// Clears the bit tracking `block`, unconditionally.
    ///
    /// The free-block counter is left alone: inode eviction releases a
    /// whole inode's blocks and bumps the counter once for the batch.
    /// Callers must not free a block twice.
    pub(crate) fn free_block(&mut self, block: u32) {
        assert!((block as usize) < NUM_BLOCKS);
        let group = block as usize / 8;
        let bit = block % 8;
        self.info
            .bmap
            .lock()
            .modify(0, |map: &mut [u8; BITMAP_BYTES]| {
                map[group] &= !(1 << bit);
            });
        debug!("freed block {block}");
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;
    use std::sync::Arc;

    use crate::config::*;
    use crate::error::FsError;
    use crate::fs::FileSystem;
    use crate::memdisk::MemDisk;

    fn fresh_fs() -> FileSystem {
        FileSystem::format(Arc::new(MemDisk::new())).unwrap()
    }

    #[test]
    fn first_allocation_skips_taken_blocks() {
        // the metadata blocks and the root directory block are taken
        let mut fs = fresh_fs();
        assert_eq!(fs.alloc_block().unwrap(), FIRST_DATA_BLOCK + 1);
    }

    #[test]
    fn allocations_are_distinct() {
        let mut fs = fresh_fs();
        let mut seen = HashSet::new();
        for _ in 0..64 {
            assert!(seen.insert(fs.alloc_block().unwrap()));
        }
    }

    #[test]
    fn counter_matches_clear_bits() {
        let mut fs = fresh_fs();
        let free = fs.info.bfree;
        let mut got = 0;
        loop {
            match fs.alloc_block() {
                Ok(_) => got += 1,
                Err(FsError::OutOfSpace) => break,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(got, free);
        assert_eq!(fs.info.bfree, 0);
    }

    #[test]
    fn freed_block_is_reallocated() {
        let mut fs = fresh_fs();
        let a = fs.alloc_block().unwrap();
        let b = fs.alloc_block().unwrap();
        assert_ne!(a, b);
        fs.free_block(a);
        fs.info.bfree += 1; // counter upkeep belongs to the caller
        assert_eq!(fs.alloc_block().unwrap(), a);
    }

    #[test]
    fn allocation_fails_fast_when_counter_is_zero() {
        let mut fs = fresh_fs();
        fs.info.bfree = 0;
        assert_eq!(fs.alloc_block().unwrap_err(), FsError::OutOfSpace);
    }
}
