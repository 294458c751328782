use std::{
    collections::BTreeSet,
    path::{Path, PathBuf},
    time::SystemTime,
};

use derive_more::Display;

use crate::{Basename, ExtRef, NameRef, Tag, TagRef};

/// The kind of an element,
/// determined only by its extension.
#[derive(Clone, Copy, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ElementType {
    #[display(fmt = "image")]
    Image,
    #[display(fmt = "note")]
    Note,
    #[display(fmt = "link")]
    Link,
    #[display(fmt = "colors")]
    Colors,
}

impl ElementType {
    pub const ALL: [ElementType; 4] = [
        ElementType::Image,
        ElementType::Note,
        ElementType::Link,
        ElementType::Colors,
    ];

    /// Extensions of this type,
    /// the first being the one used for new elements.
    pub fn exts(self) -> &'static [&'static str] {
        match self {
            ElementType::Image => &["jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "avif"],
            ElementType::Note => &["md", "markdown", "txt"],
            ElementType::Link => &["url"],
            ElementType::Colors => &["colors"],
        }
    }

    /// Whether the content of this type is small text
    /// worth loading alongside the element.
    ///
    /// Images are served as files instead.
    pub fn should_load_content(self) -> bool {
        match self {
            ElementType::Image => false,
            ElementType::Note | ElementType::Link | ElementType::Colors => true,
        }
    }
}

/// A snapshot of one element in a collection,
/// derived from its basename and file metadata.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Element {
    basename: Basename,
    raw_basename: String,
    collection: PathBuf,
    size: u64,
    last_modified: SystemTime,
}

impl Element {
    pub(crate) fn new(
        basename: Basename,
        raw_basename: String,
        collection: PathBuf,
        size: u64,
        last_modified: SystemTime,
    ) -> Self {
        Self {
            basename,
            raw_basename,
            collection,
            size,
            last_modified,
        }
    }

    pub fn ty(&self) -> ElementType {
        self.basename.ty()
    }

    pub fn name(&self) -> &NameRef {
        self.basename.name()
    }

    pub fn tags(&self) -> impl Iterator<Item = &TagRef> {
        self.basename.tags()
    }

    pub fn has_tag<T>(&self, tag: T) -> bool
    where
        T: AsRef<TagRef>,
    {
        self.tags().any(|x| x == tag.as_ref())
    }

    pub fn tag_set(&self) -> BTreeSet<Tag> {
        self.tags().map(|tag| tag.to_owned()).collect()
    }

    pub fn ext(&self) -> &ExtRef {
        self.basename.ext()
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn last_modified(&self) -> SystemTime {
        self.last_modified
    }

    pub fn collection(&self) -> &Path {
        &self.collection
    }

    /// The basename as it is on disk,
    /// which may differ from the canonical encoding.
    pub fn basename(&self) -> &str {
        &self.raw_basename
    }

    pub fn path(&self) -> PathBuf {
        self.collection.join(&self.raw_basename)
    }
}
