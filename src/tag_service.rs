use std::path::Path;

use tracing::{info, warn};

use crate::{
    encoding::{self, BadEncodingError},
    registry::{DuplicateTagError, LoadRegistryError, TagNotFoundError},
    validation::ValidationErrors,
    BatchReport, CollectionLocks, ElementService, Filesystem, Tag, TagRegistry,
};

/// A requested tag,
/// as submitted by a caller.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TagRequest {
    pub name: String,
}

impl TagRequest {
    pub fn new<S>(name: S) -> Self
    where
        S: Into<String>,
    {
        Self { name: name.into() }
    }

    /// Parse the requested tag,
    /// reporting problems per field.
    pub fn validate(&self) -> Result<Tag, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = self.name.trim();
        if name.is_empty() {
            errors.push("name", "A tag name is required");
            return Err(errors);
        }
        match errors.check("name", Tag::new(name.to_owned())) {
            Some(tag) => Ok(tag),
            None => Err(errors),
        }
    }
}

/// The result of renaming a tag.
#[derive(Debug)]
pub struct TagUpdate {
    pub tag: Tag,
    /// Elements carrying the old tag,
    /// including any that could not be renamed.
    pub report: BatchReport,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub enum CreateTagError {
    Validation(#[from] ValidationErrors),
    Duplicate(#[from] DuplicateTagError),
    Registry(#[from] LoadRegistryError),
    Filesystem(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub enum GetTagError {
    BadEncoding(#[from] BadEncodingError),
    NotFound(#[from] TagNotFoundError),
    Registry(#[from] LoadRegistryError),
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub enum UpdateTagError {
    BadEncoding(#[from] BadEncodingError),
    NotFound(#[from] TagNotFoundError),
    Validation(#[from] ValidationErrors),
    Duplicate(#[from] DuplicateTagError),
    Registry(#[from] LoadRegistryError),
    Filesystem(#[from] std::io::Error),
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub enum DeleteTagError {
    BadEncoding(#[from] BadEncodingError),
    NotFound(#[from] TagNotFoundError),
    Registry(#[from] LoadRegistryError),
    Filesystem(#[from] std::io::Error),
}

/// Operations on the tags of collections.
///
/// Tag names are given as URL-safe tokens,
/// see `encoding`.
/// Each operation holds its collection's lock throughout,
/// loads the registry once,
/// and saves it before returning.
#[derive(Debug)]
pub struct TagService<'a, F> {
    fs: &'a F,
    locks: &'a CollectionLocks,
}

impl<'a, F> TagService<'a, F>
where
    F: Filesystem,
{
    pub(crate) fn new(fs: &'a F, locks: &'a CollectionLocks) -> Self {
        Self { fs, locks }
    }

    fn elements(&self) -> ElementService<'a, F> {
        ElementService::new(self.fs, self.locks)
    }

    pub fn get_all(&self, collection: &Path) -> Result<Vec<Tag>, LoadRegistryError> {
        Ok(TagRegistry::load(self.fs, collection)?.tags().to_vec())
    }

    pub fn get(&self, collection: &Path, name: &str) -> Result<Tag, GetTagError> {
        let name = decode_tag_name(name)?;
        Ok(TagRegistry::load(self.fs, collection)?.get(name)?.clone())
    }

    pub fn create(&self, collection: &Path, request: &TagRequest) -> Result<Tag, CreateTagError> {
        let tag = request.validate()?;

        let _guard = self.locks.lock(collection);
        let mut registry = TagRegistry::load(self.fs, collection)?;
        registry.add(tag.clone())?;
        registry.save(self.fs)?;

        info!(collection = %collection.display(), %tag, "Created tag");
        Ok(tag)
    }

    /// Rename a tag
    /// in the registry and on every element carrying it.
    ///
    /// The new tag is registered before any element changes,
    /// so a name collision leaves everything untouched,
    /// and the old tag is removed only after every element was attempted.
    /// Elements that fail to rename are reported,
    /// but do not stop the registry from moving to the new tag.
    pub fn update(
        &self,
        collection: &Path,
        old_name: &str,
        request: &TagRequest,
    ) -> Result<TagUpdate, UpdateTagError> {
        let old_name = decode_tag_name(old_name)?;

        let guard = self.locks.lock(collection);
        let mut registry = TagRegistry::load(self.fs, collection)?;
        let old = registry.get(&old_name)?.clone();

        let new = request.validate()?;
        if new == old {
            return Ok(TagUpdate {
                tag: old,
                report: BatchReport::default(),
            });
        }

        registry.add(new.clone())?;
        // While elements migrate,
        // the registry on disk holds both tags.
        registry.save(self.fs)?;

        let report = self.elements().batch_rename_locked(
            &guard,
            collection,
            |element| element.has_tag(&old),
            |file| {
                file.remove_tag(&old)?;
                if !file.has_tag(&new) {
                    file.add_tag(new.clone())?;
                }
                Ok(())
            },
        )?;

        registry.remove(&old)?;
        registry.save(self.fs)?;

        if !report.is_complete() {
            warn!(
                collection = %collection.display(),
                failed = report.failed.len(),
                "Some elements still carry renamed tag `{old}`"
            );
        }
        info!(
            collection = %collection.display(),
            %old,
            %new,
            renamed = report.renamed.len(),
            "Renamed tag"
        );
        Ok(TagUpdate { tag: new, report })
    }

    /// Remove a tag
    /// from every element carrying it
    /// and then from the registry.
    pub fn delete(&self, collection: &Path, name: &str) -> Result<BatchReport, DeleteTagError> {
        let name = decode_tag_name(name)?;

        let guard = self.locks.lock(collection);
        let mut registry = TagRegistry::load(self.fs, collection)?;
        let tag = registry.get(&name)?.clone();

        let report = self.elements().batch_rename_locked(
            &guard,
            collection,
            |element| element.has_tag(&tag),
            |file| Ok(file.remove_tag(&tag).map(|_| ())?),
        )?;

        registry.remove(&tag)?;
        registry.save(self.fs)?;

        if !report.is_complete() {
            warn!(
                collection = %collection.display(),
                failed = report.failed.len(),
                "Some elements still carry deleted tag `{tag}`"
            );
        }
        info!(
            collection = %collection.display(),
            %tag,
            untagged = report.renamed.len(),
            "Deleted tag"
        );
        Ok(report)
    }
}

/// Decode a tag name token.
///
/// A token that decodes to something other than a valid tag
/// does not name a tag.
fn decode_tag_name(token: &str) -> Result<Tag, BadEncodingError> {
    let name = encoding::decode_str(token)?;
    Tag::new(name).map_err(|e| BadEncodingError {
        token: token.to_owned(),
        kind: "tag name",
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::{path::Path, thread};

    use crate::{
        encoding::encode_str,
        testing::{list_basenames, registry_tags, tag, tagged_library, with_temp_dir, FailingFilesystem},
        Library, OsFilesystem,
    };

    use super::*;

    fn c() -> &'static Path {
        Path::new("c")
    }

    fn t(name: &str) -> String {
        encode_str(name)
    }

    #[test]
    fn get_all_returns_tags_in_registry_order() {
        with_temp_dir(|dir| {
            let library = tagged_library(dir, &[], &["b", "a"]);
            assert_eq!(library.tags().get_all(c()).unwrap(), [tag("b"), tag("a")]);
        })
    }

    #[test]
    fn get_returns_err_for_missing_tag() {
        with_temp_dir(|dir| {
            let library = tagged_library(dir, &[], &["a"]);
            assert_eq!(library.tags().get(c(), &t("a")).unwrap(), tag("a"));
            assert!(matches!(
                library.tags().get(c(), &t("b")),
                Err(GetTagError::NotFound(_))
            ));
        })
    }

    #[test]
    fn get_returns_err_for_bad_tokens() {
        with_temp_dir(|dir| {
            let library = tagged_library(dir, &[], &["a"]);
            assert!(matches!(
                library.tags().get(c(), "!!"),
                Err(GetTagError::BadEncoding(_))
            ));
            assert!(matches!(
                library.tags().get(c(), &t("not_a_tag")),
                Err(GetTagError::BadEncoding(_))
            ));
        })
    }

    #[test]
    fn create_adds_a_tag_to_the_registry() {
        with_temp_dir(|dir| {
            let library = tagged_library(dir, &[], &["a"]);
            assert_eq!(
                library.tags().create(c(), &TagRequest::new(" Summer Trip ")).unwrap(),
                tag("Summer Trip")
            );
            assert_eq!(registry_tags(dir, "c"), ["a", "Summer Trip"]);
        })
    }

    #[test]
    fn create_returns_err_for_duplicate_and_leaves_everything_unchanged() {
        with_temp_dir(|dir| {
            let library = tagged_library(dir, &["a #vacation.jpg"], &["vacation"]);
            assert!(matches!(
                library.tags().create(c(), &TagRequest::new("vacation")),
                Err(CreateTagError::Duplicate(_))
            ));
            assert_eq!(registry_tags(dir, "c"), ["vacation"]);
            assert_eq!(list_basenames(dir, "c"), ["a #vacation.jpg"]);
        })
    }

    #[test]
    fn create_returns_validation_errors_for_invalid_names() {
        with_temp_dir(|dir| {
            let library = tagged_library(dir, &[], &[]);
            for name in ["", "   ", "a_b", "a#b", "a/b"] {
                match library.tags().create(c(), &TagRequest::new(name)) {
                    Err(CreateTagError::Validation(errors)) => {
                        assert_eq!(errors.field("name").count(), 1)
                    }
                    other => panic!("expected validation errors for `{name}`, got {other:?}"),
                }
            }
            assert!(registry_tags(dir, "c").is_empty());
        })
    }

    #[test]
    fn update_renames_tag_on_elements_and_in_registry() {
        with_temp_dir(|dir| {
            let library = tagged_library(
                dir,
                &["a #beach.jpg", "b #beach #sun.jpg", "c #sun.jpg"],
                &["beach", "sun"],
            );
            let update = library
                .tags()
                .update(c(), &t("beach"), &TagRequest::new("coast"))
                .unwrap();

            assert_eq!(update.tag, tag("coast"));
            assert!(update.report.is_complete());
            assert_eq!(
                list_basenames(dir, "c"),
                ["a #coast.jpg", "b #coast #sun.jpg", "c #sun.jpg"]
            );
            assert_eq!(registry_tags(dir, "c"), ["sun", "coast"]);
        })
    }

    #[test]
    fn update_to_same_name_changes_nothing() {
        with_temp_dir(|dir| {
            let library = tagged_library(dir, &["a #beach.jpg"], &["beach"]);
            let update = library
                .tags()
                .update(c(), &t("beach"), &TagRequest::new("beach"))
                .unwrap();

            assert_eq!(update.tag, tag("beach"));
            assert!(update.report.renamed.is_empty());
            assert_eq!(list_basenames(dir, "c"), ["a #beach.jpg"]);
            assert_eq!(registry_tags(dir, "c"), ["beach"]);
        })
    }

    #[test]
    fn update_to_existing_name_changes_nothing() {
        with_temp_dir(|dir| {
            let library =
                tagged_library(dir, &["a #beach.jpg", "b #vacation.jpg"], &["beach", "vacation"]);
            assert!(matches!(
                library
                    .tags()
                    .update(c(), &t("beach"), &TagRequest::new("vacation")),
                Err(UpdateTagError::Duplicate(_))
            ));
            assert_eq!(list_basenames(dir, "c"), ["a #beach.jpg", "b #vacation.jpg"]);
            assert_eq!(registry_tags(dir, "c"), ["beach", "vacation"]);
        })
    }

    #[test]
    fn update_of_missing_tag_returns_err() {
        with_temp_dir(|dir| {
            let library = tagged_library(dir, &["a #beach.jpg"], &[]);
            assert!(matches!(
                library
                    .tags()
                    .update(c(), &t("beach"), &TagRequest::new("coast")),
                Err(UpdateTagError::NotFound(_))
            ));
            assert_eq!(list_basenames(dir, "c"), ["a #beach.jpg"]);
        })
    }

    #[test]
    fn update_with_invalid_request_changes_nothing() {
        with_temp_dir(|dir| {
            let library = tagged_library(dir, &["a #beach.jpg"], &["beach"]);
            assert!(matches!(
                library
                    .tags()
                    .update(c(), &t("beach"), &TagRequest::new("co_ast")),
                Err(UpdateTagError::Validation(_))
            ));
            assert_eq!(list_basenames(dir, "c"), ["a #beach.jpg"]);
            assert_eq!(registry_tags(dir, "c"), ["beach"]);
        })
    }

    #[test]
    fn update_merges_into_elements_already_carrying_new_name() {
        with_temp_dir(|dir| {
            let library = tagged_library(dir, &["a #beach #coast.jpg"], &["beach"]);
            library
                .tags()
                .update(c(), &t("beach"), &TagRequest::new("coast"))
                .unwrap();
            assert_eq!(list_basenames(dir, "c"), ["a #coast.jpg"]);
        })
    }

    #[test]
    fn update_finishes_registry_despite_failed_elements() {
        with_temp_dir(|dir| {
            let _ = tagged_library(dir, &["a #beach.jpg", "b #beach.jpg"], &["beach"]);
            let library =
                Library::new(FailingFilesystem::new(OsFilesystem::new(dir), "b #beach.jpg"));

            let update = library
                .tags()
                .update(c(), &t("beach"), &TagRequest::new("coast"))
                .unwrap();

            assert_eq!(
                update
                    .report
                    .failed
                    .iter()
                    .map(|failure| failure.basename.as_str())
                    .collect::<Vec<_>>(),
                ["b #beach.jpg"]
            );
            assert_eq!(list_basenames(dir, "c"), ["a #coast.jpg", "b #beach.jpg"]);
            assert_eq!(registry_tags(dir, "c"), ["coast"]);
        })
    }

    #[test]
    fn delete_removes_tag_from_elements_and_registry() {
        with_temp_dir(|dir| {
            let library =
                tagged_library(dir, &["a #coast.jpg", "b #coast #sun.jpg"], &["coast", "sun"]);
            let report = library.tags().delete(c(), &t("sun")).unwrap();

            assert_eq!(report.renamed.len(), 1);
            assert_eq!(list_basenames(dir, "c"), ["a #coast.jpg", "b #coast.jpg"]);
            assert_eq!(registry_tags(dir, "c"), ["coast"]);
        })
    }

    #[test]
    fn delete_keeps_elements_that_would_lose_their_only_tag() {
        with_temp_dir(|dir| {
            let library = tagged_library(dir, &["#sun.jpg", "x #sun.jpg"], &["sun"]);
            let report = library.tags().delete(c(), &t("sun")).unwrap();

            assert_eq!(
                report
                    .failed
                    .iter()
                    .map(|failure| failure.basename.as_str())
                    .collect::<Vec<_>>(),
                ["#sun.jpg"]
            );
            assert_eq!(list_basenames(dir, "c"), ["#sun.jpg", "x.jpg"]);
            assert!(registry_tags(dir, "c").is_empty());
        })
    }

    #[test]
    fn collections_outside_the_library_are_refused() {
        with_temp_dir(|dir| {
            let library = tagged_library(dir.join("lib"), &["a #sun.jpg"], &["sun"]);
            std::fs::write(dir.join(crate::REGISTRY_FILE), "outside\n").unwrap();

            for collection in ["..", "c/../..", "/etc"] {
                assert!(matches!(
                    library.tags().get_all(Path::new(collection)),
                    Err(LoadRegistryError::Filesystem(e))
                        if e.kind() == std::io::ErrorKind::InvalidInput
                ));
            }
            assert!(matches!(
                library.tags().create(Path::new(".."), &TagRequest::new("moon")),
                Err(CreateTagError::Registry(LoadRegistryError::Filesystem(_)))
            ));
            assert_eq!(
                std::fs::read_to_string(dir.join(crate::REGISTRY_FILE)).unwrap(),
                "outside\n"
            );
        })
    }

    #[test]
    fn delete_of_missing_tag_returns_err() {
        with_temp_dir(|dir| {
            let library = tagged_library(dir, &["a #sun.jpg"], &[]);
            assert!(matches!(
                library.tags().delete(c(), &t("sun")),
                Err(DeleteTagError::NotFound(_))
            ));
            assert_eq!(list_basenames(dir, "c"), ["a #sun.jpg"]);
        })
    }

    #[test]
    fn operations_fail_on_corrupt_registry() {
        with_temp_dir(|dir| {
            let library = tagged_library(dir, &["a #sun.jpg"], &[]);
            std::fs::write(dir.join("c").join(crate::REGISTRY_FILE), "sun").unwrap();

            assert!(matches!(
                library.tags().get_all(c()),
                Err(LoadRegistryError::Corrupt(_))
            ));
            assert!(matches!(
                library.tags().create(c(), &TagRequest::new("moon")),
                Err(CreateTagError::Registry(LoadRegistryError::Corrupt(_)))
            ));
            assert_eq!(
                std::fs::read_to_string(dir.join("c").join(crate::REGISTRY_FILE)).unwrap(),
                "sun"
            );
        })
    }

    #[test]
    fn concurrent_creates_are_all_kept() {
        with_temp_dir(|dir| {
            let library = tagged_library(dir, &[], &[]);
            let names = (0..16).map(|i| format!("tag{i}")).collect::<Vec<_>>();
            thread::scope(|scope| {
                for name in &names {
                    let library = &library;
                    scope.spawn(move || {
                        library
                            .tags()
                            .create(c(), &TagRequest::new(name.as_str()))
                            .unwrap();
                    });
                }
            });

            let mut tags = registry_tags(dir, "c");
            tags.sort();
            let mut expected = names.clone();
            expected.sort();
            assert_eq!(tags, expected);
        })
    }
}
