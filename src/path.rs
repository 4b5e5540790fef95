//! Path resolution and manipulation utilities.

use crate::config::ROOT_INO;
use crate::error::{FsError, Result};
use crate::fs::FileSystem;
use crate::structs::{FileKind, Inode};

impl FileSystem {
    /// Walks an absolute path from the root, returning the inode numbers
    /// of the final component's parent and of the component itself.
    /// Symlinks along the way are not followed.
    pub fn resolve(&mut self, path: &str) -> Result<(u32, u32)> {
        if !path.starts_with('/') {
            return Err(FsError::InvalidPath);
        }

        let mut parent = ROOT_INO;
        let mut current = ROOT_INO;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            let dir = self.read_inode(current)?;
            if dir.kind != FileKind::Directory {
                return Err(FsError::NotDirectory);
            }
            parent = current;
            current = self.find_entry(&dir, component.as_bytes())?;
        }
        Ok((parent, current))
    }

    /// [`Self::resolve`] plus reading the resolved inode.
    pub fn lookup_path(&mut self, path: &str) -> Result<Inode> {
        let (_, ino) = self.resolve(path)?;
        self.read_inode(ino)
    }
}

/// Splits a path into its parent path and final component.
pub fn split(path: &str) -> (&str, &str) {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(0) => ("/", &trimmed[1..]),
        Some(idx) => (&trimmed[..idx], &trimmed[idx + 1..]),
        None => ("", trimmed),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn split_paths() {
        assert_eq!(split("/a/b/c"), ("/a/b", "c"));
        assert_eq!(split("/a"), ("/", "a"));
        assert_eq!(split("/a/"), ("/", "a"));
    }
}
