//! Tauon is a tiny fixed-geometry file system metadata engine.
//!
//! The volume's linear layout:
//! - Block 0: superblock (magic, clean flag, free counters, inode usage table)
//! - Block 1: inode table (32 inodes, 64 bytes each)
//! - Block 2: block bitmap
//! - Blocks 3..511: data blocks
//!
//! Layers, from bottom to top:
//! 1. Block Device: abstraction for the backing storage.    | User implemented (hardware-specific)
//! 2. Block Cache: buffer handles over single blocks.       | Fs implemented
//! 3. Bitmap/Inode Table: allocation and record marshaling. | Fs implemented
//! 4. Directory: fixed-size entry search/insert/delete.     | Fs implemented
//! 5. FileSystem/Path: mount lifecycle and per-inode ops.   | Fs implemented
//!
//! Every mutating operation takes `&mut FileSystem`, so a volume has a
//! single writer at a time; users sharing one across threads wrap their
//! own lock around it.

mod bitmap;
mod block_dev;
mod cache;
#[cfg(test)]
mod memdisk;
mod config;
mod directory;
mod error;
mod file;
mod fs;
mod inode;
mod path;
mod structs;
mod superblock;

pub use block_dev::BlockDevice;
pub use config::*;
pub use error::FsError as Error;
pub use error::{FsError, Result};
pub use fs::{FileSystem, VolumeStats};
pub use path::split;
pub use structs::{DirEntry, DiskInode, DiskSuperblock, FileKind, Inode, MappedBlock, Perm};
