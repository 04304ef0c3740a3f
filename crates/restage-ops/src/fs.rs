//! Filesystem capability used by the engine and the undo engine.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The filesystem calls the operation and undo engines are allowed to make.
///
/// Production code uses [`OsFileSystem`]; tests can wrap it to inject
/// failures or record calls.
pub trait FileSystem {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;
    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()>;
    fn symlink(&self, original: &Path, link: &Path) -> io::Result<()>;
    fn remove_file(&self, path: &Path) -> io::Result<()>;
    /// Remove an empty directory.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;
    /// Whether anything exists at `path`. Symlinks are not followed.
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    fn is_symlink(&self, path: &Path) -> bool;
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;
    fn is_dir_empty(&self, path: &Path) -> io::Result<bool>;
}

impl<F: FileSystem + ?Sized> FileSystem for &F {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        (**self).rename(from, to)
    }

    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()> {
        (**self).hard_link(original, link)
    }

    fn symlink(&self, original: &Path, link: &Path) -> io::Result<()> {
        (**self).symlink(original, link)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        (**self).remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        (**self).remove_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        (**self).create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        (**self).exists(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        (**self).is_dir(path)
    }

    fn is_symlink(&self, path: &Path) -> bool {
        (**self).is_symlink(path)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        (**self).read_link(path)
    }

    fn is_dir_empty(&self, path: &Path) -> io::Result<bool> {
        (**self).is_dir_empty(path)
    }
}

/// [`FileSystem`] backed by `std::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsFileSystem;

impl FileSystem for OsFileSystem {
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn hard_link(&self, original: &Path, link: &Path) -> io::Result<()> {
        fs::hard_link(original, link)
    }

    #[cfg(unix)]
    fn symlink(&self, original: &Path, link: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(original, link)
    }

    #[cfg(windows)]
    fn symlink(&self, original: &Path, link: &Path) -> io::Result<()> {
        if original.is_dir() {
            std::os::windows::fs::symlink_dir(original, link)
        } else {
            std::os::windows::fs::symlink_file(original, link)
        }
    }

    #[cfg(not(any(unix, windows)))]
    fn symlink(&self, _original: &Path, _link: &Path) -> io::Result<()> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "symlinks are not supported on this platform",
        ))
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path)
    }

    fn exists(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok()
    }

    fn is_dir(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok_and(|m| m.is_dir())
    }

    fn is_symlink(&self, path: &Path) -> bool {
        fs::symlink_metadata(path).is_ok_and(|m| m.file_type().is_symlink())
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(path)
    }

    fn is_dir_empty(&self, path: &Path) -> io::Result<bool> {
        Ok(fs::read_dir(path)?.next().is_none())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[test]
    fn test_exists_does_not_follow_symlinks() {
        let dir = TempDir::new().unwrap();
        let link = dir.path().join("dangling");
        let fs = OsFileSystem;
        fs.symlink(&dir.path().join("missing"), &link).unwrap();

        assert!(fs.exists(&link));
        assert!(fs.is_symlink(&link));
        assert!(!link.exists());
    }

    #[test]
    fn test_is_dir_empty() {
        let dir = TempDir::new().unwrap();
        let fs = OsFileSystem;
        assert!(fs.is_dir_empty(dir.path()).unwrap());

        std::fs::write(dir.path().join("f"), b"x").unwrap();
        assert!(!fs.is_dir_empty(dir.path()).unwrap());
    }
}
