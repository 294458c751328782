use std::{
    fs::{create_dir_all, read_dir, write},
    path::Path,
    sync::atomic::{AtomicUsize, Ordering},
};

use once_cell::sync::Lazy;

use crate::{
    fs::Entry, Ext, Filesystem, Library, Name, OsFilesystem, Tag, REGISTRY_FILE, TAG_FORBIDDEN,
};

/// Valid tags as they are displayed.
pub(crate) static TAG_REGEX: Lazy<String> =
    Lazy::new(|| "[a-zA-Z0-9][a-zA-Z0-9-]{0,7}( [a-zA-Z0-9-]{1,7}){0,2}".to_owned());

pub(crate) static TAG_WITH_FORBIDDEN_REGEX: Lazy<String> = Lazy::new(|| {
    let forbidden = TAG_FORBIDDEN
        .iter()
        .map(|c| regex::escape(&c.to_string()))
        .collect::<String>();
    format!("[a-z ]{{0,4}}[{forbidden}][a-z ]{{0,4}}")
});

/// Normalized names without tags.
pub(crate) static NAME_REGEX: Lazy<String> =
    Lazy::new(|| "([a-zA-Z0-9,'-]{1,6}( [a-zA-Z0-9,'.-]{1,6}){0,3})?".to_owned());

/// Strings that are often,
/// but not always,
/// decodable basenames.
pub(crate) static MAYBE_BASENAME_REGEX: Lazy<String> = Lazy::new(|| {
    r"[a-zA-Z0-9 #_,.!-]{0,20}(\.(jpg|PNG|md|url|colors|txt|exe))?".to_owned()
});

pub(crate) const EXTS: &[&str] = &[
    "jpg", "jpeg", "JPG", "png", "gif", "webp", "bmp", "svg", "avif", "md", "markdown", "txt",
    "url", "colors",
];

pub(crate) fn tag(s: &str) -> Tag {
    Tag::new(s.to_owned()).unwrap()
}

pub(crate) fn name(s: &str) -> Name {
    Name::new(s.to_owned()).unwrap()
}

pub(crate) fn ext(s: &str) -> Ext {
    Ext::new(s).unwrap()
}

pub(crate) fn with_temp_dir<F, R>(f: F) -> R
where
    F: FnOnce(&Path) -> R,
{
    let dir = tempfile::tempdir().unwrap();
    f(dir.path())
}

/// A library rooted at `dir`
/// with one collection, `c`,
/// holding empty files named `basenames`
/// and a registry of `tags`.
pub(crate) fn tagged_library<P>(dir: P, basenames: &[&str], tags: &[&str]) -> Library<OsFilesystem>
where
    P: AsRef<Path>,
{
    let collection = dir.as_ref().join("c");
    create_dir_all(&collection).unwrap();
    for basename in basenames {
        write(collection.join(basename), "").unwrap();
    }
    write(
        collection.join(REGISTRY_FILE),
        tags.iter().map(|tag| format!("{tag}\n")).collect::<String>(),
    )
    .unwrap();
    Library::new(OsFilesystem::new(dir.as_ref()))
}

/// Sorted basenames of visible files in `collection`.
pub(crate) fn list_basenames<P, Q>(dir: P, collection: Q) -> Vec<String>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let mut basenames = read_dir(dir.as_ref().join(collection))
        .unwrap()
        .map(|entry| entry.unwrap())
        .filter(|entry| entry.file_type().unwrap().is_file())
        .map(|entry| entry.file_name().into_string().unwrap())
        .filter(|basename| !basename.starts_with('.'))
        .collect::<Vec<_>>();
    basenames.sort();
    basenames
}

/// Tags in the registry file of `collection`,
/// in file order.
pub(crate) fn registry_tags<P, Q>(dir: P, collection: Q) -> Vec<String>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    match std::fs::read_to_string(dir.as_ref().join(collection).join(REGISTRY_FILE)) {
        Ok(s) => s.lines().map(|line| line.to_owned()).collect(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => panic!("{e}"),
    }
}

/// Counts renames made through it.
#[derive(Debug)]
pub(crate) struct CountingFilesystem<F> {
    inner: F,
    pub renames: AtomicUsize,
}

impl<F> CountingFilesystem<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            renames: AtomicUsize::new(0),
        }
    }
}

impl<F> Filesystem for CountingFilesystem<F>
where
    F: Filesystem,
{
    fn list(&self, dir: &Path) -> std::io::Result<Vec<Entry>> {
        self.inner.list(dir)
    }

    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        self.renames.fetch_add(1, Ordering::SeqCst);
        self.inner.rename(from, to)
    }

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        self.inner.read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
        self.inner.write(path, contents)
    }

    fn exists(&self, path: &Path) -> std::io::Result<bool> {
        self.inner.exists(path)
    }

    fn remove(&self, path: &Path) -> std::io::Result<()> {
        self.inner.remove(path)
    }
}

/// Fails every rename of one basename.
#[derive(Debug)]
pub(crate) struct FailingFilesystem<F> {
    inner: F,
    basename: String,
}

impl<F> FailingFilesystem<F> {
    pub fn new<S>(inner: F, basename: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            inner,
            basename: basename.into(),
        }
    }
}

impl<F> Filesystem for FailingFilesystem<F>
where
    F: Filesystem,
{
    fn list(&self, dir: &Path) -> std::io::Result<Vec<Entry>> {
        self.inner.list(dir)
    }

    fn rename(&self, from: &Path, to: &Path) -> std::io::Result<()> {
        if from.file_name().and_then(|name| name.to_str()) == Some(self.basename.as_str()) {
            Err(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("Failed to rename `{}`", self.basename),
            ))
        } else {
            self.inner.rename(from, to)
        }
    }

    fn read(&self, path: &Path) -> std::io::Result<Vec<u8>> {
        self.inner.read(path)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> std::io::Result<()> {
        self.inner.write(path, contents)
    }

    fn exists(&self, path: &Path) -> std::io::Result<bool> {
        self.inner.exists(path)
    }

    fn remove(&self, path: &Path) -> std::io::Result<()> {
        self.inner.remove(path)
    }
}
