//! Inode allocation, marshaling to and from the on-disk table, and the
//! logical-to-physical block mapping for file data.
//!
//! The table is never compacted: an evicted inode's record stays on disk
//! and only its slot in the superblock usage table goes back to free.

use log::debug;

use crate::config::*;
use crate::error::{FsError, Result};
use crate::fs::FileSystem;
use crate::structs::*;

impl FileSystem {
    /// Allocates a free inode number from the usage table.
    pub(crate) fn alloc_inode(&mut self) -> Result<u32> {
        if self.info.ifree == 0 {
            debug!("we ran out of inodes");
            return Err(FsError::OutOfInodes);
        }
        let Some(ino) = self.info.inodes.iter().position(|&s| s == INODE_FREE) else {
            // Free count shows spare inodes but the usage table disagrees.
            panic!(
                "inode table corrupted: {} inodes free but none tracked",
                self.info.ifree
            );
        };
        self.info.inodes[ino] = INODE_INUSE;
        self.info.ifree -= 1;
        debug!("allocated inode {ino}");
        Ok(ino as u32)
    }

    /// Reads an inode record out of the table. Symlinks also pull their
    /// target string from their single data block into the in-core inode.
    pub fn read_inode(&mut self, ino: u32) -> Result<Inode> {
        if ino as usize >= INODE_COUNT {
            return Err(FsError::OutOfBounds);
        }
        let itable = self.info.itable.clone();
        let disk = itable
            .lock()
            .read(ino as usize * INODE_SIZE, |d: &DiskInode| *d);
        let mut inode = Inode::from_disk(ino, &disk)?;

        if inode.kind == FileKind::Symlink {
            // Symlinks always have exactly their first block allocated.
            if inode.addr[0] == INVALID {
                return Err(FsError::CorruptedInode);
            }
            let handle = self.block(inode.addr[0])?;
            let target = handle.lock().read(0, |data: &[u8; BLOCK_SIZE]| {
                let end = data[..MAX_NAME_LEN]
                    .iter()
                    .position(|&c| c == 0)
                    .unwrap_or(MAX_NAME_LEN);
                String::from_utf8(data[..end].to_vec())
            });
            inode.link_target = Some(target.map_err(|_| FsError::CorruptedInode)?);
        }
        Ok(inode)
    }

    /// Writes an inode record into its table slot. With `sync` the table
    /// block is flushed immediately and the I/O error surfaced; otherwise
    /// the write rides the normal write-back paths.
    pub(crate) fn write_inode(&mut self, inode: &Inode, sync: bool) -> Result<()> {
        let itable = self.info.itable.clone();
        let mut itable = itable.lock();
        itable.modify(inode.ino as usize * INODE_SIZE, |d: &mut DiskInode| {
            *d = inode.to_disk();
        });
        if sync {
            itable.sync()?;
            self.device.flush()?;
        }
        Ok(())
    }

    /// Allocates and initializes a new inode of the given kind under
    /// `parent_ino`, then links `name` to it in the parent directory.
    ///
    /// If the directory insert fails, the error is surfaced as-is: the
    /// record and any block allocated for it have already been persisted.
    // TODO: roll the inode and block allocations back when the parent
    // insert fails, instead of leaking them until the next mkfs.
    pub(crate) fn new_inode(
        &mut self,
        parent_ino: u32,
        kind: FileKind,
        perm: Perm,
        target: Option<&str>,
        name: &[u8],
    ) -> Result<Inode> {
        check_name(name)?;
        if name == DOT_NAME || name == DOTDOT_NAME {
            return Err(FsError::InvalidFileName);
        }
        let mut parent = self.read_inode(parent_ino)?;
        if parent.kind != FileKind::Directory {
            return Err(FsError::NotDirectory);
        }
        match self.find_entry(&parent, name) {
            Ok(_) => return Err(FsError::AlreadyExists),
            Err(FsError::NotFound) => {}
            Err(e) => return Err(e),
        }

        let ino = self.alloc_inode()?;
        let now = unix_now();
        let mut inode = Inode {
            ino,
            kind,
            mode: kind as u32 | perm.bits(),
            nlink: 0,
            uid: parent.uid,
            gid: parent.gid,
            atime: now,
            mtime: now,
            ctime: now,
            size: 0,
            blocks: 0,
            addr: [INVALID; INO_DIRECT_BLOCKS],
            link_target: None,
        };

        match kind {
            // Regular files allocate nothing up front; blocks appear on
            // first write through the block mapper.
            FileKind::Regular => {}
            FileKind::Directory => {
                let blk = self.alloc_block()?;
                let handle = self.block(blk)?;
                handle
                    .lock()
                    .modify(0, |entries: &mut [DirEntry; ENTRIES_PER_BLOCK]| {
                        entries.fill(DirEntry::FREE);
                        entries[0] = DirEntry {
                            ino,
                            name: pad_name(DOT_NAME),
                        };
                        entries[1] = DirEntry {
                            ino: parent.ino,
                            name: pad_name(DOTDOT_NAME),
                        };
                    });
                inode.addr[0] = blk;
                inode.blocks = 1;
                inode.size = 2 * DIR_ENTRY_SIZE as u32;
                inode.nlink += 1; // '.' counts as a link
            }
            FileKind::Symlink => {
                let target = target.ok_or(FsError::InvalidPath)?;
                let bytes = target.as_bytes();
                if bytes.len() >= MAX_NAME_LEN {
                    return Err(FsError::NameTooLong);
                }
                let blk = self.alloc_block()?;
                let handle = self.block(blk)?;
                handle.lock().modify(0, |data: &mut [u8; BLOCK_SIZE]| {
                    data[..MAX_NAME_LEN].fill(0);
                    data[..bytes.len()].copy_from_slice(bytes);
                });
                debug!("link created to {target}");
                inode.addr[0] = blk;
                inode.blocks = 1;
                inode.size = bytes.len() as u32;
                inode.link_target = Some(target.into());
            }
        }

        self.write_inode(&inode, false)?;
        self.add_entry(&mut parent, name, &mut inode)?;
        Ok(inode)
    }

    /// Reclaims an inode whose last name is gone. A nonzero link count
    /// means the inode is still reachable and nothing happens. Otherwise
    /// the usage slot and every allocated block go back to the free
    /// pools, and the counters are restored in one step.
    pub(crate) fn evict_inode(&mut self, inode: &Inode) -> Result<()> {
        if inode.nlink != 0 {
            return Ok(());
        }
        debug!("evicting inode {}", inode.ino);
        self.info.inodes[inode.ino as usize] = INODE_FREE;
        self.info.ifree += 1;
        let mut freed = 0;
        for &blk in &inode.addr {
            if blk != INVALID {
                self.free_block(blk);
                freed += 1;
            }
        }
        self.info.bfree += freed;
        Ok(())
    }

    /// Maps a file's logical block index to a physical block number.
    ///
    /// A missing mapping on a read is a hole ([`None`]); the caller fills
    /// with zeros. On a write the block is allocated on demand, recorded
    /// in the inode, and returned flagged fresh.
    pub fn resolve_block(
        &mut self,
        inode: &mut Inode,
        logical: u32,
        create: bool,
    ) -> Result<Option<MappedBlock>> {
        if (logical as usize) < INO_DIRECT_BLOCKS {
            let blk = inode.addr[logical as usize];
            if blk != INVALID {
                return Ok(Some(MappedBlock {
                    block: blk,
                    fresh: false,
                }));
            }
        }

        // Reading with no block on disk: report the hole and let the
        // caller deal with it.
        if !create {
            return Ok(None);
        }

        if logical as usize >= INO_DIRECT_BLOCKS {
            return Err(FsError::FileTooLarge);
        }

        let blk = self.alloc_block()?;
        inode.addr[logical as usize] = blk;
        inode.blocks += 1;
        self.write_inode(inode, false)?;
        debug!("mapped logical block {logical} of inode {} to {blk}", inode.ino);
        Ok(Some(MappedBlock {
            block: blk,
            fresh: true,
        }))
    }
}
