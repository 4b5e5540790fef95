//! Directory entry search, insert, and delete.
//!
//! A directory's data blocks hold fixed 32-byte entries with no ordering.
//! Deletions leave holes that later inserts reuse, so free and used slots
//! end up interleaved and every scan has to visit all slots.

use std::sync::Arc;

use log::debug;
use spin::Mutex;

use crate::cache::BlockCache;
use crate::config::*;
use crate::error::{FsError, Result};
use crate::fs::FileSystem;
use crate::structs::*;

impl FileSystem {
    /// Searches `dir` for an entry named `name` and returns its inode
    /// number. Walks every entry of every directory block: bailing on the
    /// first free slot would miss valid entries stored after a hole.
    pub(crate) fn find_entry(&mut self, dir: &Inode, name: &[u8]) -> Result<u32> {
        if dir.kind != FileKind::Directory {
            return Err(FsError::NotDirectory);
        }
        check_name(name)?;

        for i in 0..dir.blocks as usize {
            let cur = self.block(dir.addr[i])?;
            let guard = cur.lock();
            for slot in 0..ENTRIES_PER_BLOCK {
                let hit = guard.read(slot * DIR_ENTRY_SIZE, |e: &DirEntry| {
                    (!e.is_free() && e.name_eq(name)).then_some(e.ino)
                });
                if let Some(ino) = hit {
                    return Ok(ino);
                }
            }
        }

        debug!("entry not found: {}", String::from_utf8_lossy(name));
        Err(FsError::NotFound)
    }

    /// Links `name` to `child` in `dir`.
    ///
    /// One traversal does double duty: it remembers the first free slot
    /// it passes and keeps checking every used slot for the same name. An
    /// existing entry with the name takes priority over any free slot
    /// found earlier, even in another block, which makes insert double as
    /// replace for rename-onto-existing-name. Only the chosen block's
    /// handle outlives the scan; cursor handles are released as the loop
    /// advances, and re-choosing the block already saved cannot release
    /// it twice since the saved handle keeps it alive.
    ///
    /// Fails with [`FsError::OutOfSpace`] when every slot of every
    /// allocated block is taken; directories do not grow here.
    pub(crate) fn add_entry(
        &mut self,
        dir: &mut Inode,
        name: &[u8],
        child: &mut Inode,
    ) -> Result<()> {
        if dir.kind != FileKind::Directory {
            return Err(FsError::NotDirectory);
        }
        check_name(name)?;

        let mut target: Option<(Arc<Mutex<BlockCache>>, usize)> = None;
        'scan: for i in 0..dir.blocks as usize {
            let cur = self.block(dir.addr[i])?;
            for slot in 0..ENTRIES_PER_BLOCK {
                let offset = slot * DIR_ENTRY_SIZE;
                let (free, matched) = cur.lock().read(offset, |e: &DirEntry| {
                    (e.is_free(), !e.is_free() && e.name_eq(name))
                });
                if target.is_none() && free {
                    target = Some((Arc::clone(&cur), offset));
                    continue;
                }
                if matched {
                    target = Some((Arc::clone(&cur), offset));
                    break 'scan;
                }
            }
        }

        let Some((handle, offset)) = target else {
            return Err(FsError::OutOfSpace);
        };
        handle.lock().modify(offset, |e: &mut DirEntry| {
            *e = DirEntry {
                ino: child.ino,
                name: pad_name(name),
            };
        });

        let now = unix_now();
        dir.size += DIR_ENTRY_SIZE as u32;
        dir.ctime = now;
        dir.atime = now;
        child.nlink += 1;
        self.write_inode(dir, false)?;
        self.write_inode(child, false)?;
        debug!(
            "added entry {} -> inode {} in directory {}",
            String::from_utf8_lossy(name),
            child.ino,
            dir.ino
        );
        Ok(())
    }

    /// Removes the entry named `name` from `dir`, returning the inode
    /// number it pointed at. The scan stops at the first match: insert
    /// keeps names unique, so duplicates cannot exist. The target's link
    /// count is decremented here; whether a zero count leads to eviction
    /// is the caller's call.
    pub(crate) fn del_entry(&mut self, dir: &mut Inode, name: &[u8]) -> Result<u32> {
        if dir.kind != FileKind::Directory {
            return Err(FsError::NotDirectory);
        }
        check_name(name)?;
        if name == DOT_NAME || name == DOTDOT_NAME {
            return Err(FsError::InvalidFileName);
        }

        for i in 0..dir.blocks as usize {
            let cur = self.block(dir.addr[i])?;
            let mut guard = cur.lock();
            let mut removed = None;
            for slot in 0..ENTRIES_PER_BLOCK {
                let offset = slot * DIR_ENTRY_SIZE;
                let hit = guard.read(offset, |e: &DirEntry| {
                    (!e.is_free() && e.name_eq(name)).then_some(e.ino)
                });
                if let Some(ino) = hit {
                    guard.modify(offset, |e: &mut DirEntry| *e = DirEntry::FREE);
                    removed = Some(ino);
                    break;
                }
            }
            drop(guard);

            if let Some(ino) = removed {
                let now = unix_now();
                dir.ctime = now;
                dir.atime = now;
                self.write_inode(dir, false)?;

                let mut child = self.read_inode(ino)?;
                child.nlink = child.nlink.saturating_sub(1);
                self.write_inode(&child, false)?;
                debug!(
                    "removed entry {} -> inode {ino} from directory {}",
                    String::from_utf8_lossy(name),
                    dir.ino
                );
                return Ok(ino);
            }
        }

        debug!("entry not found: {}", String::from_utf8_lossy(name));
        Err(FsError::NotFound)
    }

    /// Collects the live entries of `dir`, holes skipped.
    pub(crate) fn list_dir(&mut self, dir: &Inode) -> Result<Vec<DirEntry>> {
        if dir.kind != FileKind::Directory {
            return Err(FsError::NotDirectory);
        }
        let mut entries = Vec::new();
        for i in 0..dir.blocks as usize {
            let cur = self.block(dir.addr[i])?;
            let guard = cur.lock();
            for slot in 0..ENTRIES_PER_BLOCK {
                let entry = guard.read(slot * DIR_ENTRY_SIZE, |e: &DirEntry| *e);
                if !entry.is_free() {
                    entries.push(entry);
                }
            }
        }
        Ok(entries)
    }

    /// True when `dir` holds nothing beyond `.` and `..`. Counting live
    /// entries is the only reliable test; the recorded size only grows on
    /// insert and is not adjusted by delete.
    pub(crate) fn dir_is_empty(&mut self, dir: &Inode) -> Result<bool> {
        if dir.kind != FileKind::Directory {
            return Err(FsError::NotDirectory);
        }
        for i in 0..dir.blocks as usize {
            let cur = self.block(dir.addr[i])?;
            let guard = cur.lock();
            for slot in 0..ENTRIES_PER_BLOCK {
                let live = guard.read(slot * DIR_ENTRY_SIZE, |e: &DirEntry| {
                    !e.is_free() && !e.name_eq(DOT_NAME) && !e.name_eq(DOTDOT_NAME)
                });
                if live {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::config::*;
    use crate::error::FsError;
    use crate::fs::FileSystem;
    use crate::memdisk::MemDisk;
    use crate::structs::*;

    fn fresh_fs() -> FileSystem {
        FileSystem::format(Arc::new(MemDisk::new())).unwrap()
    }

    /// Allocates an inode without linking it anywhere.
    fn bare_file(fs: &mut FileSystem) -> Inode {
        let ino = fs.alloc_inode().unwrap();
        let inode = Inode {
            ino,
            kind: FileKind::Regular,
            mode: FileKind::Regular as u32 | Perm::RW.bits(),
            nlink: 0,
            uid: 0,
            gid: 0,
            atime: 0,
            mtime: 0,
            ctime: 0,
            size: 0,
            blocks: 0,
            addr: [INVALID; INO_DIRECT_BLOCKS],
            link_target: None,
        };
        fs.write_inode(&inode, false).unwrap();
        inode
    }

    fn names_of(fs: &mut FileSystem, dir: u32) -> Vec<String> {
        fs.read_dir(dir)
            .unwrap()
            .iter()
            .map(|e| String::from_utf8_lossy(e.name()).into_owned())
            .collect()
    }

    #[test]
    fn find_scans_past_holes() {
        let mut fs = fresh_fs();
        let a = fs.create(ROOT_INO, "a", Perm::RW).unwrap();
        let b = fs.create(ROOT_INO, "b", Perm::RW).unwrap();
        let c = fs.create(ROOT_INO, "c", Perm::RW).unwrap();
        fs.unlink(ROOT_INO, "a").unwrap();
        fs.unlink(ROOT_INO, "b").unwrap();

        // entries after the holes must still be reachable
        let root = fs.read_inode(ROOT_INO).unwrap();
        assert_eq!(fs.find_entry(&root, b"c").unwrap(), c.ino);
        assert_eq!(fs.find_entry(&root, b"a").unwrap_err(), FsError::NotFound);
        assert_eq!(fs.find_entry(&root, b"b").unwrap_err(), FsError::NotFound);
        let _ = (a, b);
    }

    #[test]
    fn insert_prefers_match_over_earlier_free_slot() {
        let mut fs = fresh_fs();
        fs.create(ROOT_INO, "a", Perm::RW).unwrap();
        fs.create(ROOT_INO, "b", Perm::RW).unwrap();
        fs.unlink(ROOT_INO, "a").unwrap(); // hole before b's slot

        let replacement = bare_file(&mut fs);
        let mut root = fs.read_inode(ROOT_INO).unwrap();
        let mut child = fs.read_inode(replacement.ino).unwrap();
        fs.add_entry(&mut root, b"b", &mut child).unwrap();

        // exactly one entry named b, remapped, still in its original slot
        let entries = fs.read_dir(ROOT_INO).unwrap();
        let bs: Vec<_> = entries.iter().filter(|e| e.name_eq(b"b")).collect();
        assert_eq!(bs.len(), 1);
        assert_eq!(bs[0].ino, replacement.ino);

        // the skipped hole is still free: the next insert lands in it
        fs.create(ROOT_INO, "c", Perm::RW).unwrap();
        assert_eq!(names_of(&mut fs, ROOT_INO), [".", "..", "c", "b"]);
    }

    #[test]
    fn insert_reuses_holes_left_by_delete() {
        let mut fs = fresh_fs();
        fs.create(ROOT_INO, "a", Perm::RW).unwrap();
        fs.create(ROOT_INO, "b", Perm::RW).unwrap();
        fs.unlink(ROOT_INO, "a").unwrap();
        fs.create(ROOT_INO, "c", Perm::RW).unwrap();
        assert_eq!(names_of(&mut fs, ROOT_INO), [".", "..", "c", "b"]);
    }

    #[test]
    fn delete_blanks_the_slot() {
        let mut fs = fresh_fs();
        let a = fs.create(ROOT_INO, "a", Perm::RW).unwrap();
        let mut root = fs.read_inode(ROOT_INO).unwrap();
        assert_eq!(fs.del_entry(&mut root, b"a").unwrap(), a.ino);
        assert_eq!(fs.find_entry(&root, b"a").unwrap_err(), FsError::NotFound);
        assert_eq!(fs.read_dir(ROOT_INO).unwrap().len(), 2); // '.' and '..'
    }

    #[test]
    fn insert_fails_when_directory_is_full() {
        let mut fs = fresh_fs();
        let file = bare_file(&mut fs);
        for i in 0..ENTRIES_PER_BLOCK - 2 {
            let name = format!("n{i}");
            let mut root = fs.read_inode(ROOT_INO).unwrap();
            let mut child = fs.read_inode(file.ino).unwrap();
            fs.add_entry(&mut root, name.as_bytes(), &mut child).unwrap();
        }
        let mut root = fs.read_inode(ROOT_INO).unwrap();
        let mut child = fs.read_inode(file.ino).unwrap();
        assert_eq!(
            fs.add_entry(&mut root, b"full", &mut child).unwrap_err(),
            FsError::OutOfSpace
        );
    }

    #[test]
    fn dot_entries_cannot_be_deleted() {
        let mut fs = fresh_fs();
        let mut root = fs.read_inode(ROOT_INO).unwrap();
        assert_eq!(
            fs.del_entry(&mut root, b".").unwrap_err(),
            FsError::InvalidFileName
        );
        assert_eq!(
            fs.del_entry(&mut root, b"..").unwrap_err(),
            FsError::InvalidFileName
        );
    }

    #[test]
    fn emptiness_scans_live_entries() {
        let mut fs = fresh_fs();
        let d = fs.mkdir(ROOT_INO, "d", Perm::RWX).unwrap();
        assert!(fs.dir_is_empty(&d).unwrap());
        fs.create(d.ino, "f", Perm::RW).unwrap();
        let d = fs.read_inode(d.ino).unwrap();
        assert!(!fs.dir_is_empty(&d).unwrap());
        fs.unlink(d.ino, "f").unwrap();
        let d = fs.read_inode(d.ino).unwrap();
        assert!(fs.dir_is_empty(&d).unwrap());
    }
}
