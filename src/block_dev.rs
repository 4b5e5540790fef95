use crate::config::BLOCK_SIZE;
use crate::error::Result;

pub trait BlockDevice: Send + Sync + std::fmt::Debug {
    /// Returns the number of blocks in the block device.
    fn num_blocks(&self) -> usize;

    /// Reads one block of data from the block device.
    fn read_block(&self, block_id: usize, buf: &mut [u8; BLOCK_SIZE]) -> Result<()>;

    /// Writes one block of data to the block device.
    fn write_block(&self, block_id: usize, buf: &[u8; BLOCK_SIZE]) -> Result<()>;

    /// Flushes any buffered writes to the underlying storage.
    fn flush(&self) -> Result<()>;

    /// Returns the size of each block in bytes.
    fn block_size(&self) -> usize {
        BLOCK_SIZE
    }
}
