use std::{borrow::Borrow, cmp::Ordering, ops::Deref, str::FromStr};

use derive_more::Display;
use ref_cast::{ref_cast_custom, RefCastCustom};

use crate::{NAME_SEPARATOR, TAG_FORBIDDEN, TAG_MARK, TAG_SPACE};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("Invalid tag name: `{0}`. Tags must contain a non-space character and cannot contain `{TAG_MARK}`, `{TAG_SPACE}`, line breaks, tabs, or any of `{forbidden}`.", forbidden = forbidden())]
pub struct TagError(String);

fn forbidden() -> String {
    TAG_FORBIDDEN.iter().collect()
}

/// A tag as it is displayed,
/// with spaces rather than their encoded form.
#[derive(Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(String);

#[derive(Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, RefCastCustom)]
#[repr(transparent)]
pub struct TagRef(str);

impl Tag {
    pub fn new(s: String) -> Result<Tag, TagError> {
        if is_valid(&s) {
            Ok(Tag(s))
        } else {
            Err(TagError(s))
        }
    }

    /// Decode a tag token as it appears in a basename,
    /// without the leading `TAG_MARK`.
    pub fn from_encoded(token: &str) -> Result<Tag, TagError> {
        Self::new(token.replace(TAG_SPACE, &NAME_SEPARATOR.to_string()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

fn is_valid(s: &str) -> bool {
    s.chars().any(|c| c != NAME_SEPARATOR)
        && s.chars().all(|c| {
            c != TAG_MARK
                && c != TAG_SPACE
                && !c.is_control()
                && (c == NAME_SEPARATOR || !c.is_whitespace())
                && !TAG_FORBIDDEN.contains(&c)
        })
}

impl FromStr for Tag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl TagRef {
    #[ref_cast_custom]
    pub(crate) const fn new(s: &str) -> &Self;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The tag as written in a basename,
    /// without the leading `TAG_MARK`.
    pub fn encoded(&self) -> String {
        self.0.replace(NAME_SEPARATOR, &TAG_SPACE.to_string())
    }
}

impl PartialOrd<&TagRef> for Tag {
    fn partial_cmp(&self, other: &&TagRef) -> Option<Ordering> {
        self.as_ref().partial_cmp(other)
    }
}

impl PartialOrd<Tag> for &TagRef {
    fn partial_cmp(&self, other: &Tag) -> Option<Ordering> {
        self.partial_cmp(&other.as_ref())
    }
}

impl PartialEq<&TagRef> for Tag {
    fn eq(&self, other: &&TagRef) -> bool {
        self.as_ref().eq(other)
    }
}

impl PartialEq<Tag> for &TagRef {
    fn eq(&self, other: &Tag) -> bool {
        self.eq(&other.as_ref())
    }
}

impl From<Tag> for String {
    fn from(value: Tag) -> Self {
        value.0
    }
}

impl Deref for Tag {
    type Target = TagRef;

    fn deref(&self) -> &Self::Target {
        self.borrow()
    }
}

impl AsRef<TagRef> for Tag {
    fn as_ref(&self) -> &TagRef {
        self.borrow()
    }
}

impl AsRef<TagRef> for TagRef {
    fn as_ref(&self) -> &TagRef {
        self
    }
}

impl Borrow<TagRef> for Tag {
    fn borrow(&self) -> &TagRef {
        TagRef::new(self.0.as_str())
    }
}

impl<'a> From<&'a TagRef> for Tag {
    fn from(value: &'a TagRef) -> Self {
        value.to_owned()
    }
}

impl ToOwned for TagRef {
    type Owned = Tag;

    fn to_owned(&self) -> Self::Owned {
        Tag(self.0.to_owned())
    }
}
