//! In-memory block device backing the unit tests.

use std::sync::Mutex;

use crate::block_dev::BlockDevice;
use crate::config::{BLOCK_SIZE, NUM_BLOCKS};
use crate::error::{FsError, Result};

#[derive(Debug)]
pub(crate) struct MemDisk {
    data: Mutex<Vec<u8>>,
    num_blocks: usize,
}

impl MemDisk {
    pub fn new() -> Self {
        Self {
            data: Mutex::new(vec![0u8; NUM_BLOCKS * BLOCK_SIZE]),
            num_blocks: NUM_BLOCKS,
        }
    }
}

impl BlockDevice for MemDisk {
    fn num_blocks(&self) -> usize {
        self.num_blocks
    }

    fn read_block(&self, block_id: usize, buf: &mut [u8; BLOCK_SIZE]) -> Result<()> {
        if block_id >= self.num_blocks {
            return Err(FsError::InvalidBlockId);
        }
        let data = self.data.lock().unwrap();
        let start = block_id * BLOCK_SIZE;
        buf.copy_from_slice(&data[start..start + BLOCK_SIZE]);
        Ok(())
    }

    fn write_block(&self, block_id: usize, buf: &[u8; BLOCK_SIZE]) -> Result<()> {
        if block_id >= self.num_blocks {
            return Err(FsError::InvalidBlockId);
        }
        let mut data = self.data.lock().unwrap();
        let start = block_id * BLOCK_SIZE;
        data[start..start + BLOCK_SIZE].copy_from_slice(buf);
        Ok(())
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }
}
