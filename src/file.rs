//! Byte-granular file data access on top of the block mapper.

use crate::config::*;
use crate::error::{FsError, Result};
use crate::fs::FileSystem;
use crate::structs::{FileKind, unix_now};

impl FileSystem {
    /// Reads from a regular file at `offset`, returning the number of
    /// bytes read. Reads past the end of file are clamped; holes left by
    /// sparse writes read as zeros.
    pub fn read(&mut self, ino: u32, offset: usize, buf: &mut [u8]) -> Result<usize> {
        let mut inode = self.read_inode(ino)?;
        if inode.kind != FileKind::Regular {
            return Err(FsError::NotRegular);
        }

        let size = inode.size as usize;
        if offset >= size || buf.is_empty() {
            return Ok(0);
        }
        let end = size.min(offset + buf.len());

        let mut pos = offset;
        let mut done = 0;
        while pos < end {
            let logical = (pos / BLOCK_SIZE) as u32;
            let begin = pos % BLOCK_SIZE;
            let count = (BLOCK_SIZE - begin).min(end - pos);
            match self.resolve_block(&mut inode, logical, false)? {
                Some(mapped) => {
                    let handle = self.block(mapped.block)?;
                    handle.lock().read(0, |data: &[u8; BLOCK_SIZE]| {
                        buf[done..done + count].copy_from_slice(&data[begin..begin + count]);
                    });
                }
                None => buf[done..done + count].fill(0),
            }
            pos += count;
            done += count;
        }
        Ok(done)
    }

    /// Writes to a regular file at `offset`, allocating blocks on demand
    /// through the block mapper, and returns the number of bytes written.
    pub fn write(&mut self, ino: u32, offset: usize, buf: &[u8]) -> Result<usize> {
        let mut inode = self.read_inode(ino)?;
        if inode.kind != FileKind::Regular {
            return Err(FsError::NotRegular);
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if offset + buf.len() > MAX_FILE_SIZE {
            return Err(FsError::FileTooLarge);
        }

        let end = offset + buf.len();
        let mut pos = offset;
        let mut done = 0;
        while pos < end {
            let logical = (pos / BLOCK_SIZE) as u32;
            let begin = pos % BLOCK_SIZE;
            let count = (BLOCK_SIZE - begin).min(end - pos);
            let Some(mapped) = self.resolve_block(&mut inode, logical, true)? else {
                return Err(FsError::OutOfBounds);
            };
            let handle = self.block(mapped.block)?;
            handle.lock().modify(0, |data: &mut [u8; BLOCK_SIZE]| {
                // A fresh block still holds whatever the device had there.
                if mapped.fresh {
                    data.fill(0);
                }
                data[begin..begin + count].copy_from_slice(&buf[done..done + count]);
            });
            pos += count;
            done += count;
        }

        if end as u32 > inode.size {
            inode.size = end as u32;
        }
        inode.mtime = unix_now();
        self.write_inode(&inode, false)?;
        Ok(done)
    }

    /// Returns a symlink's target, cached in core when the inode was read.
    pub fn read_link(&mut self, ino: u32) -> Result<String> {
        let inode = self.read_inode(ino)?;
        if inode.kind != FileKind::Symlink {
            return Err(FsError::NotSymlink);
        }
        inode.link_target.ok_or(FsError::CorruptedInode)
    }
}
