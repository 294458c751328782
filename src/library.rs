use std::{
    path::{Component, Path, PathBuf},
    sync::Arc,
};

use parking_lot::{lock_api::ArcMutexGuard, Mutex, RawMutex};
use rustc_hash::FxHashMap;

use crate::{ElementService, Filesystem, TagService};

/// Exclusive access to one collection's tag registry.
pub(crate) type CollectionGuard = ArcMutexGuard<RawMutex, ()>;

/// One lock per collection,
/// created on first use.
///
/// Every operation that reads and then writes a tag registry
/// or an element file
/// holds the lock of its collection throughout,
/// so concurrent operations cannot lose each other's changes.
#[derive(Debug, Default)]
pub struct CollectionLocks {
    locks: Mutex<FxHashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl CollectionLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock a collection.
    ///
    /// Spellings of the same path,
    /// such as `c`, `./c`, and `c/`,
    /// share one lock.
    pub(crate) fn lock(&self, collection: &Path) -> CollectionGuard {
        let key = collection
            .components()
            .filter(|component| !matches!(component, Component::CurDir))
            .collect::<PathBuf>();
        let lock = Arc::clone(self.locks.lock().entry(key).or_default());
        // The map lock is released before blocking on the collection.
        lock.lock_arc()
    }
}

/// A set of collections stored on one filesystem.
#[derive(Debug)]
pub struct Library<F> {
    fs: F,
    locks: CollectionLocks,
}

impl<F> Library<F>
where
    F: Filesystem,
{
    pub fn new(fs: F) -> Self {
        Self {
            fs,
            locks: CollectionLocks::new(),
        }
    }

    pub fn elements(&self) -> ElementService<'_, F> {
        ElementService::new(&self.fs, &self.locks)
    }

    pub fn tags(&self) -> TagService<'_, F> {
        TagService::new(&self.fs, &self.locks)
    }
}
