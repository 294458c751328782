use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
};

use tracing::debug;

use crate::{
    encode, DecodeError, Element, Ext, ExtRef, Filesystem, Name, NameRef, Tag, TagRef,
    PATH_PART_MAX_LEN,
};

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("`{0}` already has `{1}`")]
pub struct HasTagError(String, Tag);

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("`{0}` lacks `{1}`")]
pub struct LacksTagError(String, Tag);

#[derive(Debug, thiserror::Error)]
#[error("Cannot rename `{}` to `{}`: destination already exists", from.display(), to.display())]
pub struct DestinationExistsError {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, thiserror::Error)]
#[error("`{0}` is longer than {PATH_PART_MAX_LEN} bytes")]
pub struct TooLongError(pub(crate) String);

#[derive(Debug, thiserror::Error)]
#[error("`{0}` would be left without a name or tags")]
pub struct NamelessError(pub(crate) String);

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub enum CommitError {
    DestinationExists(#[from] DestinationExistsError),
    TooLong(#[from] TooLongError),
    Nameless(#[from] NamelessError),
    Filesystem(#[from] std::io::Error),
}

/// A rename issued by `ElementFile::commit`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

/// One element opened for modification.
///
/// Changes are made in memory
/// and take effect on disk on `commit`.
#[derive(Clone, Debug)]
pub struct ElementFile {
    collection: PathBuf,
    /// Basename currently on disk.
    basename: String,
    name: Name,
    tags: BTreeSet<Tag>,
    ext: Ext,
}

impl ElementFile {
    pub fn open(element: &Element) -> Self {
        Self {
            collection: element.collection().to_owned(),
            basename: element.basename().to_owned(),
            name: element.name().to_owned(),
            tags: element.tag_set(),
            ext: element.ext().to_owned(),
        }
    }

    pub fn from_basename<P>(collection: P, basename: String) -> Result<Self, DecodeError>
    where
        P: Into<PathBuf>,
    {
        let (name, tags, ext) = crate::decode(&basename)?.into_parts();
        Ok(Self {
            collection: collection.into(),
            basename,
            name,
            tags,
            ext,
        })
    }

    pub fn collection(&self) -> &Path {
        &self.collection
    }

    pub fn basename(&self) -> &str {
        &self.basename
    }

    pub fn name(&self) -> &NameRef {
        &self.name
    }

    pub fn ext(&self) -> &ExtRef {
        &self.ext
    }

    pub fn tags(&self) -> impl Iterator<Item = &TagRef> {
        self.tags.iter().map(|tag| tag.as_ref())
    }

    pub fn has_tag<T>(&self, tag: T) -> bool
    where
        T: AsRef<TagRef>,
    {
        self.tags.contains(tag.as_ref())
    }

    pub fn add_tag(&mut self, tag: Tag) -> Result<(), HasTagError> {
        if self.tags.contains(tag.as_ref()) {
            Err(HasTagError(self.basename.clone(), tag))
        } else {
            self.tags.insert(tag);
            Ok(())
        }
    }

    /// Remove a tag,
    /// failing if the element does not have it.
    pub fn remove_tag<T>(&mut self, tag: T) -> Result<Tag, LacksTagError>
    where
        T: AsRef<TagRef>,
    {
        self.tags
            .take(tag.as_ref())
            .ok_or_else(|| LacksTagError(self.basename.clone(), tag.as_ref().to_owned()))
    }

    pub fn set_name(&mut self, name: Name) {
        self.name = name;
    }

    pub fn set_tags(&mut self, tags: BTreeSet<Tag>) {
        self.tags = tags;
    }

    /// The basename `commit` would rename to.
    pub fn target_basename(&self) -> String {
        encode(&self.name, &self.tags, &self.ext)
    }

    /// Rename the file on disk to match in-memory changes.
    ///
    /// Returns `None` without touching `fs`
    /// if the basename would not change.
    /// Never overwrites another file,
    /// and never leaves an element with neither name nor tags.
    pub fn commit<F>(&mut self, fs: &F) -> Result<Option<Rename>, CommitError>
    where
        F: Filesystem,
    {
        let target = self.target_basename();
        if target == self.basename {
            return Ok(None);
        }
        if self.name.is_empty() && self.tags.is_empty() {
            return Err(NamelessError(self.basename.clone()).into());
        }
        if target.len() > PATH_PART_MAX_LEN {
            return Err(TooLongError(target).into());
        }

        let from = self.collection.join(&self.basename);
        let to = self.collection.join(&target);
        if fs.exists(&to)? {
            return Err(DestinationExistsError { from, to }.into());
        }

        debug!(from = %from.display(), to = %to.display(), "Renaming element");
        fs.rename(&from, &to)?;

        let from = std::mem::replace(&mut self.basename, target.clone());
        Ok(Some(Rename { from, to: target }))
    }
}
