use std::{
    collections::{hash_map, BTreeSet},
    path::Path,
};

use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info, warn};

use crate::{
    basename::DecodeError,
    element_file::{CommitError, DestinationExistsError, HasTagError, LacksTagError, Rename, TooLongError},
    library::CollectionGuard,
    registry::LoadRegistryError,
    validation::ValidationErrors,
    CollectionLocks, Element, ElementFile, ElementType, Ext, Filesystem, Name, Tag, TagRegistry,
    HIDDEN_PREFIX, PATH_PART_MAX_LEN,
};

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("No element `{0}` exists")]
pub struct ElementNotFoundError(pub(crate) String);

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("{0}")]
pub enum MutateError {
    HasTag(#[from] HasTagError),
    LacksTag(#[from] LacksTagError),
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("`{target}` is also the new basename of `{claimed_by}`")]
pub struct ConflictError {
    pub target: String,
    pub claimed_by: String,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub enum BatchError {
    Mutate(#[from] MutateError),
    Conflict(#[from] ConflictError),
    Commit(#[from] CommitError),
}

/// An element a batch failed to change.
#[derive(Debug, thiserror::Error)]
#[error("`{basename}`: {error}")]
pub struct BatchFailure {
    pub basename: String,
    pub error: BatchError,
}

/// The outcome of `ElementService::batch_rename`
/// for every element matching its predicate.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub renamed: Vec<Rename>,
    /// Elements whose basename did not need to change.
    pub unchanged: Vec<String>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub enum GetElementError {
    NotFound(#[from] ElementNotFoundError),
    Decode(#[from] DecodeError),
    Filesystem(#[from] std::io::Error),
}

/// New name and tags for an element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UpdateElementRequest {
    pub name: String,
    pub tags: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub enum UpdateElementError {
    Validation(#[from] ValidationErrors),
    Get(#[from] GetElementError),
    Registry(#[from] LoadRegistryError),
    Commit(#[from] CommitError),
}

/// A new element.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CreateElementRequest {
    pub name: String,
    pub tags: Vec<String>,
    pub ext: String,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub enum CreateElementError {
    Validation(#[from] ValidationErrors),
    Registry(#[from] LoadRegistryError),
    Exists(#[from] DestinationExistsError),
    TooLong(#[from] TooLongError),
    Get(#[from] GetElementError),
    Filesystem(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub enum DeleteElementError {
    Get(#[from] GetElementError),
    Filesystem(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub enum ContentError {
    Get(#[from] GetElementError),
    #[error("Content of {0} elements is not text")]
    NotText(ElementType),
    #[error("Content is not valid UTF-8: {0}")]
    InvalidText(#[from] std::string::FromUtf8Error),
    Filesystem(#[from] std::io::Error),
}

/// Operations on the elements of collections.
#[derive(Debug)]
pub struct ElementService<'a, F> {
    fs: &'a F,
    locks: &'a CollectionLocks,
}

impl<'a, F> ElementService<'a, F>
where
    F: Filesystem,
{
    pub(crate) fn new(fs: &'a F, locks: &'a CollectionLocks) -> Self {
        Self { fs, locks }
    }

    /// Every element in `collection`,
    /// ordered by basename.
    ///
    /// Hidden files and files that do not decode as elements are skipped.
    pub fn list(&self, collection: &Path) -> std::io::Result<Vec<Element>> {
        let mut elements = Vec::new();
        for entry in self.fs.list(collection)? {
            let Some(basename) = entry.basename() else {
                warn!(path = %entry.path.display(), "Skipping file with non-Unicode name");
                continue;
            };
            if basename.starts_with(HIDDEN_PREFIX) {
                continue;
            }
            match crate::decode(basename) {
                Ok(decoded) => elements.push(Element::new(
                    decoded,
                    basename.to_owned(),
                    collection.to_owned(),
                    entry.size,
                    entry.modified,
                )),
                Err(DecodeError::UnsupportedType(e)) => debug!("Skipping file: {e}"),
                Err(e) => warn!("Skipping file `{basename}`: {e}"),
            }
        }
        elements.sort_by(|x, y| x.basename().cmp(y.basename()));
        Ok(elements)
    }

    /// Elements with every tag in `include`
    /// and no tag in `exclude`.
    pub fn find(
        &self,
        collection: &Path,
        include: &[Tag],
        exclude: &[Tag],
    ) -> std::io::Result<Vec<Element>> {
        Ok(self
            .list(collection)?
            .into_iter()
            .filter(|element| {
                let tags = element.tags().collect::<FxHashSet<_>>();
                include.iter().all(|tag| tags.contains(tag.as_ref()))
                    && !exclude.iter().any(|tag| tags.contains(tag.as_ref()))
            })
            .collect())
    }

    pub fn get(&self, collection: &Path, basename: &str) -> Result<Element, GetElementError> {
        // Decoding first rejects basenames that could never be listed.
        crate::decode(basename)?;
        self.list(collection)?
            .into_iter()
            .find(|element| element.basename() == basename)
            .ok_or_else(|| ElementNotFoundError(basename.to_owned()).into())
    }

    /// Apply `mutator` to every element matching `predicate`
    /// and rename each on disk.
    ///
    /// A failure for one element does not stop the others;
    /// failures are collected in the returned report.
    /// Only listing the collection can fail the batch as a whole.
    pub fn batch_rename<P, M>(
        &self,
        collection: &Path,
        predicate: P,
        mutator: M,
    ) -> std::io::Result<BatchReport>
    where
        P: Fn(&Element) -> bool,
        M: Fn(&mut ElementFile) -> Result<(), MutateError>,
    {
        let guard = self.locks.lock(collection);
        self.batch_rename_locked(&guard, collection, predicate, mutator)
    }

    pub(crate) fn batch_rename_locked<P, M>(
        &self,
        _guard: &CollectionGuard,
        collection: &Path,
        predicate: P,
        mutator: M,
    ) -> std::io::Result<BatchReport>
    where
        P: Fn(&Element) -> bool,
        M: Fn(&mut ElementFile) -> Result<(), MutateError>,
    {
        let mut report = BatchReport::default();

        let mut files = Vec::new();
        for element in self.list(collection)?.iter().filter(|element| predicate(element)) {
            let mut file = ElementFile::open(element);
            match mutator(&mut file) {
                Ok(()) => files.push(file),
                Err(e) => report.failed.push(BatchFailure {
                    basename: element.basename().to_owned(),
                    error: e.into(),
                }),
            }
        }

        // Two elements can end up with the same basename,
        // for example when one already had the new tag.
        // Only the first may take it,
        // so parallel renames never race for a destination.
        let mut claims = FxHashMap::default();
        let mut to_commit = Vec::new();
        for file in files {
            let target = file.target_basename();
            if target == file.basename() {
                to_commit.push(file);
                continue;
            }
            match claims.entry(target) {
                hash_map::Entry::Occupied(claim) => report.failed.push(BatchFailure {
                    basename: file.basename().to_owned(),
                    error: ConflictError {
                        target: claim.key().clone(),
                        claimed_by: String::clone(claim.get()),
                    }
                    .into(),
                }),
                hash_map::Entry::Vacant(claim) => {
                    claim.insert(file.basename().to_owned());
                    to_commit.push(file);
                }
            }
        }

        // Collecting waits for every rename to finish.
        let outcomes = to_commit
            .into_par_iter()
            .map(|mut file| {
                let outcome = file.commit(self.fs);
                (file, outcome)
            })
            .collect::<Vec<_>>();
        for (file, outcome) in outcomes {
            match outcome {
                Ok(Some(rename)) => report.renamed.push(rename),
                Ok(None) => report.unchanged.push(file.basename().to_owned()),
                Err(e) => report.failed.push(BatchFailure {
                    basename: file.basename().to_owned(),
                    error: e.into(),
                }),
            }
        }

        for failure in &report.failed {
            warn!(collection = %collection.display(), "Failed to rename element {failure}");
        }
        report.renamed.sort_by(|x, y| x.from.cmp(&y.from));
        report.unchanged.sort();
        report.failed.sort_by(|x, y| x.basename.cmp(&y.basename));
        debug!(
            collection = %collection.display(),
            renamed = report.renamed.len(),
            unchanged = report.unchanged.len(),
            failed = report.failed.len(),
            "Batch rename finished"
        );
        Ok(report)
    }

    /// Give an element a new name and tags.
    ///
    /// Every tag must exist in the collection's registry.
    pub fn update(
        &self,
        collection: &Path,
        basename: &str,
        request: &UpdateElementRequest,
    ) -> Result<Element, UpdateElementError> {
        let _guard = self.locks.lock(collection);

        let registry = TagRegistry::load(self.fs, collection)?;
        let mut errors = ValidationErrors::new();
        let (name, tags) = match validate_fields(&mut errors, &registry, &request.name, &request.tags) {
            Some(fields) if errors.is_empty() => fields,
            _ => return Err(errors.into()),
        };

        let mut file = ElementFile::open(&self.get(collection, basename)?);
        file.set_name(name);
        file.set_tags(tags);
        if let Some(rename) = file.commit(self.fs)? {
            info!(
                collection = %collection.display(),
                from = %rename.from,
                to = %rename.to,
                "Updated element"
            );
        }
        Ok(self.get(collection, file.basename())?)
    }

    /// Write a new element.
    ///
    /// Every tag must exist in the collection's registry.
    pub fn create(
        &self,
        collection: &Path,
        request: &CreateElementRequest,
        contents: &[u8],
    ) -> Result<Element, CreateElementError> {
        let _guard = self.locks.lock(collection);

        let registry = TagRegistry::load(self.fs, collection)?;
        let mut errors = ValidationErrors::new();
        let ext = errors.check("ext", Ext::supported(request.ext.as_str()));
        let fields = validate_fields(&mut errors, &registry, &request.name, &request.tags);
        let ((name, tags), ext) = match (fields, ext) {
            (Some(fields), Some(ext)) if errors.is_empty() => (fields, ext),
            _ => return Err(errors.into()),
        };

        let basename = crate::encode(&name, &tags, &ext);
        if basename.len() > PATH_PART_MAX_LEN {
            return Err(TooLongError(basename).into());
        }
        let path = collection.join(&basename);
        if self.fs.exists(&path)? {
            return Err(DestinationExistsError {
                from: path.clone(),
                to: path,
            }
            .into());
        }
        self.fs.write(&path, contents)?;
        info!(collection = %collection.display(), %basename, "Created element");
        Ok(self.get(collection, &basename)?)
    }

    pub fn delete(&self, collection: &Path, basename: &str) -> Result<(), DeleteElementError> {
        let _guard = self.locks.lock(collection);
        let element = self.get(collection, basename)?;
        self.fs.remove(&element.path())?;
        info!(collection = %collection.display(), basename, "Deleted element");
        Ok(())
    }

    /// The text content of an element,
    /// or `None` for types whose content is not loaded.
    pub fn content(&self, collection: &Path, basename: &str) -> Result<Option<String>, ContentError> {
        let _guard = self.locks.lock(collection);
        let element = self.get(collection, basename)?;
        if element.ty().should_load_content() {
            Ok(Some(String::from_utf8(self.fs.read(&element.path())?)?))
        } else {
            Ok(None)
        }
    }

    pub fn set_content(
        &self,
        collection: &Path,
        basename: &str,
        content: &str,
    ) -> Result<(), ContentError> {
        let _guard = self.locks.lock(collection);
        let element = self.get(collection, basename)?;
        if element.ty().should_load_content() {
            self.fs.write(&element.path(), content.as_bytes())?;
            Ok(())
        } else {
            Err(ContentError::NotText(element.ty()))
        }
    }
}

/// Validate a requested name and tags against `registry`,
/// recording problems in `errors`.
fn validate_fields(
    errors: &mut ValidationErrors,
    registry: &TagRegistry,
    name: &str,
    tags: &[String],
) -> Option<(Name, BTreeSet<Tag>)> {
    let name = errors.check("name", Name::normalized(name));
    let tags = tags
        .iter()
        .filter_map(|s| errors.check("tags", Tag::new(s.trim().to_owned())))
        .collect::<BTreeSet<_>>();
    for tag in tags.iter().filter(|tag| !registry.contains(*tag)) {
        errors.push("tags", format!("Tag `{tag}` does not exist"));
    }
    if name.as_ref().is_some_and(|name| name.is_empty()) && tags.is_empty() {
        errors.push("name", "A name is required for an element without tags");
    }
    Some((name?, tags))
}
