//! The file system facade: format, the mount/unmount lifecycle, and the
//! per-inode operations a host integration layer drives.

use std::sync::Arc;

use log::debug;
use spin::Mutex;

use crate::block_dev::BlockDevice;
use crate::cache::{BlockCache, BlockCacheManager};
use crate::config::*;
use crate::error::{FsError, Result};
use crate::structs::*;
use crate::superblock::FsInfo;

/// A mounted volume.
///
/// Every mutating operation takes `&mut self`, so a volume has exactly one
/// writer at a time; callers sharing a volume across threads wrap their
/// own lock around it.
#[derive(Debug)]
pub struct FileSystem {
    pub(crate) device: Arc<dyn BlockDevice>,
    pub(crate) cache: BlockCacheManager,
    pub(crate) info: FsInfo,
}

/// Counters reported by [`FileSystem::stat`].
#[derive(Debug, Clone, Copy)]
pub struct VolumeStats {
    pub block_size: usize,
    pub total_blocks: u32,
    pub free_blocks: u32,
    pub total_inodes: u32,
    pub free_inodes: u32,
    pub name_limit: usize,
}

impl FileSystem {
    /// Writes a fresh, empty volume onto `device` and mounts it: a clean
    /// superblock, a bitmap with the metadata blocks and the root block
    /// taken, and a root directory holding `.` and `..`.
    pub fn format(device: Arc<dyn BlockDevice>) -> Result<FileSystem> {
        if device.num_blocks() < NUM_BLOCKS {
            return Err(FsError::InvalidBlockId);
        }
        let mut cache = BlockCacheManager::new();
        let now = unix_now();

        cache
            .get(SUPERBLOCK_BLOCK as usize, Arc::clone(&device))?
            .lock()
            .modify(0, |dsb: &mut DiskSuperblock| {
                let mut inodes = [INODE_FREE; INODE_COUNT];
                inodes[ROOT_INO as usize] = INODE_INUSE;
                *dsb = DiskSuperblock {
                    magic: MAGIC,
                    flags: SB_CLEAN,
                    ifree: INODE_COUNT as u32 - 1,
                    bfree: NUM_BLOCKS as u32 - FIRST_DATA_BLOCK - 1,
                    inodes,
                };
            });

        cache
            .get(BITMAP_BLOCK as usize, Arc::clone(&device))?
            .lock()
            .modify(0, |map: &mut [u8; BITMAP_BYTES]| {
                map.fill(0);
                map[0] = 0b0000_1111; // superblock, inode table, bitmap, root block
            });

        cache
            .get(INODE_TABLE_BLOCK as usize, Arc::clone(&device))?
            .lock()
            .modify(0, |table: &mut [DiskInode; INODE_COUNT]| {
                table.fill(DiskInode::EMPTY);
                let mut addr = [INVALID; INO_DIRECT_BLOCKS];
                addr[0] = FIRST_DATA_BLOCK;
                table[ROOT_INO as usize] = DiskInode {
                    mode: FileKind::Directory as u32 | Perm::RWX.bits(),
                    nlink: 2, // '.' plus '..', both the root itself
                    atime: now,
                    mtime: now,
                    ctime: now,
                    uid: 0,
                    gid: 0,
                    size: 2 * DIR_ENTRY_SIZE as u32,
                    blocks: 1,
                    addr,
                };
            });

        cache
            .get(FIRST_DATA_BLOCK as usize, Arc::clone(&device))?
            .lock()
            .modify(0, |entries: &mut [DirEntry; ENTRIES_PER_BLOCK]| {
                entries.fill(DirEntry::FREE);
                entries[0] = DirEntry {
                    ino: ROOT_INO,
                    name: pad_name(DOT_NAME),
                };
                entries[1] = DirEntry {
                    ino: ROOT_INO,
                    name: pad_name(DOTDOT_NAME),
                };
            });

        cache.sync_all()?;
        device.flush()?;
        drop(cache);
        Self::mount(device)
    }

    /// Validates the superblock and brings the volume state in core. The
    /// bitmap and inode-table blocks are pinned here and stay resident
    /// until unmount. A refused mount leaves no cache handle behind.
    pub fn mount(device: Arc<dyn BlockDevice>) -> Result<FileSystem> {
        let mut cache = BlockCacheManager::new();
        let sb = cache.get(SUPERBLOCK_BLOCK as usize, Arc::clone(&device))?;
        let dsb = sb.lock().read(0, |d: &DiskSuperblock| *d);
        drop(sb);
        dsb.validate()?;

        let bmap = cache.get(BITMAP_BLOCK as usize, Arc::clone(&device))?;
        let itable = cache.get(INODE_TABLE_BLOCK as usize, Arc::clone(&device))?;
        debug!(
            "mounting clean volume: {} free inodes, {} free blocks",
            dsb.ifree, dsb.bfree
        );

        let mut fs = Self {
            device,
            cache,
            info: FsInfo::new(&dsb, bmap, itable),
        };
        let root = fs.read_inode(ROOT_INO)?;
        if root.kind != FileKind::Directory {
            return Err(FsError::CorruptedInode);
        }
        Ok(fs)
    }

    /// Writes the free counters and the inode usage table back into the
    /// superblock, releases the resident handles, and pushes every
    /// modified block out to the device.
    pub fn unmount(mut self) -> Result<()> {
        debug!(
            "unmounting: {} free inodes, {} free blocks",
            self.info.ifree, self.info.bfree
        );
        let (ifree, bfree, inodes) = (self.info.ifree, self.info.bfree, self.info.inodes);
        self.block(SUPERBLOCK_BLOCK)?
            .lock()
            .modify(0, |dsb: &mut DiskSuperblock| {
                dsb.ifree = ifree;
                dsb.bfree = bfree;
                dsb.inodes = inodes;
            });

        let Self {
            device,
            cache,
            info,
        } = self;
        drop(info); // unpins the bitmap and inode-table handles
        cache.sync_all()?;
        device.flush()?;
        Ok(())
    }

    /// Returns a handle to `block_id` through the volume cache.
    pub(crate) fn block(&mut self, block_id: u32) -> Result<Arc<Mutex<BlockCache>>> {
        if block_id as usize >= NUM_BLOCKS {
            return Err(FsError::InvalidBlockId);
        }
        self.cache.get(block_id as usize, Arc::clone(&self.device))
    }

    pub fn root_ino(&self) -> u32 {
        ROOT_INO
    }

    /// Forces an inode's data blocks and table record out to the device,
    /// surfacing the I/O error if the flush does not land. Everything else
    /// stays on the deferred write-back paths until unmount.
    pub fn fsync(&mut self, ino: u32) -> Result<()> {
        let inode = self.read_inode(ino)?;
        for &blk in &inode.addr {
            if blk != INVALID {
                self.block(blk)?.lock().sync()?;
            }
        }
        self.write_inode(&inode, true)
    }

    pub fn stat(&self) -> VolumeStats {
        VolumeStats {
            block_size: BLOCK_SIZE,
            total_blocks: NUM_BLOCKS as u32,
            free_blocks: self.info.bfree,
            total_inodes: INODE_COUNT as u32,
            free_inodes: self.info.ifree,
            name_limit: MAX_NAME_LEN,
        }
    }

    /// Resolves `name` under the directory inode `dir`.
    pub fn lookup(&mut self, dir: u32, name: &str) -> Result<Inode> {
        if name.len() > MAX_NAME_LEN {
            return Err(FsError::NameTooLong);
        }
        let dir = self.read_inode(dir)?;
        let ino = self.find_entry(&dir, name.as_bytes())?;
        self.read_inode(ino)
    }

    /// Creates a regular file. No data blocks are allocated until the
    /// first write.
    pub fn create(&mut self, dir: u32, name: &str, perm: Perm) -> Result<Inode> {
        debug!("creating regular file \"{name}\"");
        self.new_inode(dir, FileKind::Regular, perm, None, name.as_bytes())
    }

    /// Creates a directory, populated with its `.` and `..` entries.
    pub fn mkdir(&mut self, dir: u32, name: &str, perm: Perm) -> Result<Inode> {
        debug!("creating directory \"{name}\"");
        self.new_inode(dir, FileKind::Directory, perm, None, name.as_bytes())
    }

    /// Creates a symbolic link holding `target`.
    pub fn symlink(&mut self, dir: u32, name: &str, target: &str) -> Result<Inode> {
        debug!("creating symlink \"{name}\" -> \"{target}\"");
        self.new_inode(dir, FileKind::Symlink, Perm::RWX, Some(target), name.as_bytes())
    }

    /// Adds a hard link `name` to the inode `ino`. Directories cannot be
    /// hard-linked.
    pub fn link(&mut self, dir: u32, name: &str, ino: u32) -> Result<()> {
        let mut child = self.read_inode(ino)?;
        if child.kind == FileKind::Directory {
            return Err(FsError::IsDirectory);
        }
        let mut parent = self.read_inode(dir)?;
        match self.find_entry(&parent, name.as_bytes()) {
            Ok(_) => return Err(FsError::AlreadyExists),
            Err(FsError::NotFound) => {}
            Err(e) => return Err(e),
        }
        debug!("creating hardlink \"{name}\" for inode {ino}");
        child.ctime = unix_now();
        self.add_entry(&mut parent, name.as_bytes(), &mut child)
    }

    /// Removes the name `name` from `dir`; the inode itself is reclaimed
    /// only once its link count reaches zero.
    pub fn unlink(&mut self, dir: u32, name: &str) -> Result<()> {
        let mut parent = self.read_inode(dir)?;
        let ino = self.find_entry(&parent, name.as_bytes())?;
        if self.read_inode(ino)?.kind == FileKind::Directory {
            return Err(FsError::IsDirectory);
        }
        self.del_entry(&mut parent, name.as_bytes())?;
        let target = self.read_inode(ino)?;
        self.evict_inode(&target)
    }

    /// Removes an empty directory.
    pub fn rmdir(&mut self, dir: u32, name: &str) -> Result<()> {
        let mut parent = self.read_inode(dir)?;
        let ino = self.find_entry(&parent, name.as_bytes())?;
        let child = self.read_inode(ino)?;
        if child.kind != FileKind::Directory {
            return Err(FsError::NotDirectory);
        }
        if !self.dir_is_empty(&child)? {
            return Err(FsError::NotEmpty);
        }
        self.del_entry(&mut parent, name.as_bytes())?;
        let mut child = self.read_inode(ino)?;
        child.nlink = child.nlink.saturating_sub(1); // drop the '.' self-reference
        self.write_inode(&child, false)?;
        self.evict_inode(&child)
    }

    /// Moves `old_name` in `old_dir` to `new_name` in `new_dir`. An
    /// existing entry at the destination is unlinked first, so its link
    /// count drops before the name is taken over.
    pub fn rename(
        &mut self,
        old_dir: u32,
        old_name: &str,
        new_dir: u32,
        new_name: &str,
    ) -> Result<()> {
        let src = self.read_inode(old_dir)?;
        let moved = self.find_entry(&src, old_name.as_bytes())?;
        if old_dir == new_dir && old_name == new_name {
            return Ok(());
        }

        match self.lookup(new_dir, new_name) {
            Ok(victim) => match victim.kind {
                FileKind::Directory => self.rmdir(new_dir, new_name)?,
                _ => self.unlink(new_dir, new_name)?,
            },
            Err(FsError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let mut src = self.read_inode(old_dir)?;
        self.del_entry(&mut src, old_name.as_bytes())?;
        // Reload the destination after the delete; it may be the same
        // directory.
        let mut dst = self.read_inode(new_dir)?;
        let mut child = self.read_inode(moved)?;
        self.add_entry(&mut dst, new_name.as_bytes(), &mut child)
    }

    /// Lists the live entries of the directory inode `dir`.
    pub fn read_dir(&mut self, dir: u32) -> Result<Vec<DirEntry>> {
        let dir = self.read_inode(dir)?;
        self.list_dir(&dir)
    }
}
