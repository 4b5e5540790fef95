use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    #[error("block device i/o failure")]
    IoError,
    #[error("block id out of range")]
    InvalidBlockId,
    #[error("superblock magic mismatch")]
    InvalidMagic,
    #[error("volume was not cleanly unmounted")]
    DirtyVolume,
    #[error("inode table entry is corrupted")]
    CorruptedInode,
    #[error("no free data blocks")]
    OutOfSpace,
    #[error("no free inodes")]
    OutOfInodes,
    #[error("reference beyond filesystem limits")]
    OutOfBounds,
    #[error("file exceeds the direct block limit")]
    FileTooLarge,
    #[error("name too long")]
    NameTooLong,
    #[error("invalid file name")]
    InvalidFileName,
    #[error("entry not found")]
    NotFound,
    #[error("entry already exists")]
    AlreadyExists,
    #[error("not a directory")]
    NotDirectory,
    #[error("not a regular file")]
    NotRegular,
    #[error("not a symbolic link")]
    NotSymlink,
    #[error("is a directory")]
    IsDirectory,
    #[error("directory not empty")]
    NotEmpty,
    #[error("invalid path")]
    InvalidPath,
}

pub type Result<T> = core::result::Result<T, FsError>;
