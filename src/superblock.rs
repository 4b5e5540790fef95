//! Superblock validation and the in-core volume state mirrored from it.

use std::sync::Arc;

use spin::Mutex;

use crate::cache::BlockCache;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::DiskSuperblock;

impl DiskSuperblock {
    /// Mount-time sanity check. A dirty flag is a hard refusal: there is
    /// no journal to replay, so an unclean volume cannot be trusted.
    pub fn validate(&self) -> Result<()> {
        if self.magic != MAGIC {
            return Err(FsError::InvalidMagic);
        }
        if self.flags != SB_CLEAN {
            return Err(FsError::DirtyVolume);
        }
        Ok(())
    }
}

/// Volume state kept in core while mounted: the free counters and inode
/// usage table copied out of the superblock, plus pinned handles to the
/// bitmap and inode-table blocks so they stay resident until unmount.
#[derive(Debug)]
pub(crate) struct FsInfo {
    pub ifree: u32,
    pub bfree: u32,
    pub inodes: [u32; INODE_COUNT],
    pub bmap: Arc<Mutex<BlockCache>>,
    pub itable: Arc<Mutex<BlockCache>>,
}

impl FsInfo {
    pub fn new(
        dsb: &DiskSuperblock,
        bmap: Arc<Mutex<BlockCache>>,
        itable: Arc<Mutex<BlockCache>>,
    ) -> Self {
        Self {
            ifree: dsb.ifree,
            bfree: dsb.bfree,
            inodes: dsb.inodes,
            bmap,
            itable,
        }
    }
}
