use std::{
    io::Write,
    path::{Path, PathBuf},
    time::SystemTime,
};

use tempfile::NamedTempFile;

use crate::encoding::stays_inside;

/// A file found by `Filesystem::list`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    /// Path of the file,
    /// the listed directory joined with its basename.
    pub path: PathBuf,
    pub size: u64,
    pub modified: SystemTime,
}

impl Entry {
    pub fn basename(&self) -> Option<&str> {
        self.path.file_name().and_then(|name| name.to_str())
    }
}

/// Storage a library operates on.
///
/// All paths are relative to the storage root.
/// Implementations must be safe to share between threads,
/// because renames within one batch run in parallel.
pub trait Filesystem: Sync {
    /// List regular files directly inside `dir`.
    fn list(&self, dir: &Path) -> std::io::Result<Vec<Entry>>;

    /// Rename `from` to `to` within one directory.
    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()>;

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>>;

    /// Replace the contents of `path`.
    ///
    /// Readers must see either the old or the new contents,
    /// never a partial write.
    fn write(&self, path: &Path, contents: &[u8]) -> std::io::Result<()>;

    fn exists(&self, path: &Path) -> std::io::Result<bool>;

    fn remove(&self, path: &Path) -> std::io::Result<()>;
}

impl<F> Filesystem for &F
where
    F: Filesystem,
{
    fn list(&self, dir: &Path) -> std::io::Result<Vec<Entry>> {
        (**self).list(dir)
    }

    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        (**self).rename(from, to)
    }

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        (**self).read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
        (**self).write(path, contents)
    }

    fn exists(&self, path: &Path) -> std::io::Result<bool> {
        (**self).exists(path)
    }

    fn remove(&self, path: &Path) -> std::io::Result<()> {
        (**self).remove(path)
    }
}

/// The operating system's filesystem,
/// rooted at a library directory.
#[derive(Clone, Debug)]
pub struct OsFilesystem {
    root: PathBuf,
}

impl OsFilesystem {
    pub fn new<P>(root: P) -> Self
    where
        P: Into<PathBuf>,
    {
        Self { root: root.into() }
    }

    /// Resolve `path` under the root,
    /// refusing paths that would leave it.
    fn join(&self, path: &Path) -> std::io::Result<PathBuf> {
        if stays_inside(path) {
            Ok(self.root.join(path))
        } else {
            Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("`{}` leaves the library", path.display()),
            ))
        }
    }
}

impl Filesystem for OsFilesystem {
    fn list(&self, dir: &Path) -> std::io::Result<Vec<Entry>> {
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(self.join(dir)?)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if metadata.is_file() {
                entries.push(Entry {
                    path: dir.join(entry.file_name()),
                    size: metadata.len(),
                    modified: metadata.modified()?,
                });
            }
        }
        entries.sort_by(|x, y| x.path.cmp(&y.path));
        Ok(entries)
    }

    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        std::fs::rename(self.join(from)?, self.join(to)?)
    }

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        std::fs::read(self.join(path)?)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
        let path = self.join(path)?;
        let dir = path.parent().unwrap_or(&self.root);
        // A temporary file in the same directory
        // can be renamed over the target atomically.
        let mut file = NamedTempFile::new_in(dir)?;
        file.write_all(contents)?;
        file.as_file().sync_all()?;
        file.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    fn exists(&self, path: &Path) -> std::io::Result<bool> {
        self.join(path)?.try_exists()
    }

    fn remove(&self, path: &Path) -> std::io::Result<()> {
        std::fs::remove_file(self.join(path)?)
    }
}
