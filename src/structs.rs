use bitflags::bitflags;

use crate::config::*;
use crate::error::{FsError, Result};

/// On-disk superblock. The inode usage table lives here rather than in a
/// bitmap of its own; with 32 inodes a u32 per slot costs nothing.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DiskSuperblock {
    pub magic: u32,
    pub flags: u32, // SB_CLEAN / SB_DIRTY
    pub ifree: u32,
    pub bfree: u32,
    pub inodes: [u32; INODE_COUNT],
}

/// On-disk inode record. 36 bytes of fields plus 7 block addresses rounds
/// the record to a power of 2 (64 bytes), giving 32 inodes per table block.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DiskInode {
    pub mode: u32,
    pub nlink: u32,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
    pub blocks: u32,
    pub addr: [u32; INO_DIRECT_BLOCKS],
}

impl DiskInode {
    pub const EMPTY: Self = Self {
        mode: 0,
        nlink: 0,
        atime: 0,
        mtime: 0,
        ctime: 0,
        uid: 0,
        gid: 0,
        size: 0,
        blocks: 0,
        addr: [0; INO_DIRECT_BLOCKS],
    };
}

/// On-disk directory entry. A free slot carries `INVALID` as its inode
/// number; the name needs no length field since it is NUL-padded.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DirEntry {
    pub ino: u32,
    pub name: [u8; MAX_NAME_LEN],
}

impl DirEntry {
    pub const FREE: Self = Self {
        ino: INVALID,
        name: [0; MAX_NAME_LEN],
    };

    pub fn new(ino: u32, name: &[u8]) -> Result<Self> {
        check_name(name)?;
        Ok(Self {
            ino,
            name: pad_name(name),
        })
    }

    pub fn is_free(&self) -> bool {
        self.ino == INVALID
    }

    /// The stored name, up to its NUL padding.
    pub fn name(&self) -> &[u8] {
        let end = self
            .name
            .iter()
            .position(|&c| c == 0)
            .unwrap_or(MAX_NAME_LEN);
        &self.name[..end]
    }

    pub fn name_eq(&self, name: &[u8]) -> bool {
        self.name() == name
    }
}

pub(crate) fn pad_name(name: &[u8]) -> [u8; MAX_NAME_LEN] {
    let mut arr = [0; MAX_NAME_LEN];
    arr[..name.len()].copy_from_slice(name);
    arr
}

/// Rejects names a directory entry cannot hold.
pub(crate) fn check_name(name: &[u8]) -> Result<()> {
    if name.is_empty() {
        return Err(FsError::InvalidFileName);
    }
    if name.len() > MAX_NAME_LEN {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}

/// File type, stored in the high bits of the mode word.
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Regular = 0x8000,
    Directory = 0x4000,
    Symlink = 0xA000,
}

const KIND_MASK: u32 = 0xF000;

impl FileKind {
    /// Anything other than the three supported kinds means the inode
    /// table is corrupted.
    pub fn from_mode(mode: u32) -> Result<Self> {
        match mode & KIND_MASK {
            0x8000 => Ok(FileKind::Regular),
            0x4000 => Ok(FileKind::Directory),
            0xA000 => Ok(FileKind::Symlink),
            _ => Err(FsError::CorruptedInode),
        }
    }
}

bitflags! {
    /// Permission bits, kept in the low mode bits. Applied to all three
    /// classes at once; per-class permissions are not worth the trouble
    /// on a 32-inode volume.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Perm: u32 {
        const READ = 0o444;
        const WRITE = 0o222;
        const EXEC = 0o111;
        const RW = 0o666;
        const RWX = 0o777;
    }
}

/// In-core inode: the on-disk record plus the cached block addresses and,
/// for symlinks, the target string read from the first data block.
#[derive(Debug, Clone)]
pub struct Inode {
    pub ino: u32,
    pub kind: FileKind,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub atime: u32,
    pub mtime: u32,
    pub ctime: u32,
    pub size: u32,
    pub blocks: u32,
    pub addr: [u32; INO_DIRECT_BLOCKS],
    pub link_target: Option<String>,
}

impl Inode {
    pub(crate) fn from_disk(ino: u32, d: &DiskInode) -> Result<Self> {
        Ok(Self {
            ino,
            kind: FileKind::from_mode(d.mode)?,
            mode: d.mode,
            nlink: d.nlink,
            uid: d.uid,
            gid: d.gid,
            atime: d.atime,
            mtime: d.mtime,
            ctime: d.ctime,
            size: d.size,
            blocks: d.blocks,
            addr: d.addr,
            link_target: None,
        })
    }

    pub(crate) fn to_disk(&self) -> DiskInode {
        DiskInode {
            mode: self.mode,
            nlink: self.nlink,
            atime: self.atime,
            mtime: self.mtime,
            ctime: self.ctime,
            uid: self.uid,
            gid: self.gid,
            size: self.size,
            blocks: self.blocks,
            addr: self.addr,
        }
    }
}

/// Result of mapping a logical file block to a physical one. A freshly
/// allocated block still holds whatever the device had there; zero-filling
/// is the caller's job.
#[derive(Debug, Clone, Copy)]
pub struct MappedBlock {
    pub block: u32,
    pub fresh: bool,
}

pub(crate) fn unix_now() -> u32 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn record_sizes_match_layout() {
        assert_eq!(size_of::<DiskInode>(), INODE_SIZE);
        assert_eq!(size_of::<DirEntry>(), DIR_ENTRY_SIZE);
        assert!(size_of::<DiskSuperblock>() <= BLOCK_SIZE);
        assert_eq!(INODE_COUNT * INODE_SIZE, BLOCK_SIZE);
    }

    #[test]
    fn entry_names() {
        let e = DirEntry::new(3, b"test").unwrap();
        assert!(e.name_eq(b"test"));
        assert!(!e.name_eq(b"test1"));
        assert!(!e.name_eq(b"tes"));
        assert!(!e.is_free());
        assert!(DirEntry::FREE.is_free());
        assert_eq!(DirEntry::new(0, b"").unwrap_err(), FsError::InvalidFileName);
        assert_eq!(
            DirEntry::new(0, &[b'a'; MAX_NAME_LEN + 1]).unwrap_err(),
            FsError::NameTooLong
        );
        // a name filling all 28 bytes has no NUL and must still match
        let full = [b'x'; MAX_NAME_LEN];
        assert!(DirEntry::new(1, &full).unwrap().name_eq(&full));
    }

    #[test]
    fn kind_from_mode() {
        assert_eq!(FileKind::from_mode(0x81A4).unwrap(), FileKind::Regular);
        assert_eq!(FileKind::from_mode(0x41FF).unwrap(), FileKind::Directory);
        assert_eq!(FileKind::from_mode(0xA1FF).unwrap(), FileKind::Symlink);
        assert_eq!(FileKind::from_mode(0x0000).unwrap_err(), FsError::CorruptedInode);
    }
}
