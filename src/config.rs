pub const MAGIC: u32 = 0x5F54_4F59;

/// Only 2048-byte blocks are supported.
pub const BLOCK_SIZE: usize = 2048;
/// Yup. Volume maximum size is 1 MiB.
pub const NUM_BLOCKS: usize = 512;

// Disk location of the metadata blocks.
pub const SUPERBLOCK_BLOCK: u32 = 0;
pub const INODE_TABLE_BLOCK: u32 = 1;
pub const BITMAP_BLOCK: u32 = 2;
pub const FIRST_DATA_BLOCK: u32 = 3;

/// The whole inode table fits in a single block: 32 inodes of 64 bytes.
pub const INODE_COUNT: usize = 32;
pub const INODE_SIZE: usize = 64;
pub const ROOT_INO: u32 = 0; // Inode number of the root directory

/// Block addresses stored inline in an inode, no indirection.
pub const INO_DIRECT_BLOCKS: usize = 7;
pub const MAX_FILE_SIZE: usize = INO_DIRECT_BLOCKS * BLOCK_SIZE;

/// Names are stored inline in the entry; 28 bytes rounds the whole
/// directory entry to a power of 2 (32 bytes).
pub const MAX_NAME_LEN: usize = 28;
pub const DIR_ENTRY_SIZE: usize = 32;
pub const ENTRIES_PER_BLOCK: usize = BLOCK_SIZE / DIR_ENTRY_SIZE;

/// One bit per block, so the bitmap occupies 64 bytes of its block.
pub const BITMAP_BYTES: usize = NUM_BLOCKS / 8;

/// Invalid reference, marking free directory entries, unallocated inode
/// block slots, and the like. Something like this is needed because inode 0
/// and block 0 are both valid references. Safe to use: we never address
/// more than 32 inodes or 512 blocks, so no real reference reaches it.
pub const INVALID: u32 = 0xdead_beef;

// Superblock state flag values.
pub const SB_CLEAN: u32 = 0;
pub const SB_DIRTY: u32 = 1;

// Inode usage table values.
pub const INODE_FREE: u32 = 0;
pub const INODE_INUSE: u32 = 1;

pub const DOT_NAME: &[u8] = b".";
pub const DOTDOT_NAME: &[u8] = b"..";
