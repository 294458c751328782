use std::{borrow::Borrow, ops::Deref, str::FromStr};

use derive_more::Display;
use itertools::Itertools;
use ref_cast::{ref_cast_custom, RefCastCustom};

use crate::{basename::tag_tokens, DIR_SEPARATOR, NAME_SEPARATOR, TAG_MARK};

#[derive(Debug, thiserror::Error)]
#[error("Invalid name: `{0}`. Names cannot contain `{DIR_SEPARATOR}`, control characters, or `{TAG_MARK}` directly followed by a tag.")]
pub struct NameError(String);

/// The name of an element,
/// the part of a basename that is neither tags nor extension.
///
/// Names are always whitespace-normalized:
/// trimmed,
/// with every run of whitespace replaced by a single space.
/// An empty name is valid;
/// such elements are identified by their tags alone.
#[derive(Clone, Debug, Default, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(String);

#[derive(Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, RefCastCustom)]
#[repr(transparent)]
pub struct NameRef(str);

impl Name {
    /// Return a name if `s` is a valid, already normalized name.
    pub fn new(s: String) -> Result<Name, NameError> {
        if normalize(&s) == s && is_valid(&s) {
            Ok(Name(s))
        } else {
            Err(NameError(s))
        }
    }

    /// Normalize whitespace in `s`
    /// and return it as a name if valid.
    pub fn normalized(s: &str) -> Result<Name, NameError> {
        Self::new(normalize(s))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

pub(crate) fn normalize(s: &str) -> String {
    s.split_whitespace().join(&NAME_SEPARATOR.to_string())
}

fn is_valid(s: &str) -> bool {
    !s.contains(DIR_SEPARATOR)
        && !s.chars().any(|c| c.is_control())
        && tag_tokens(s).next().is_none()
}

impl FromStr for Name {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::normalized(s)
    }
}

impl NameRef {
    #[ref_cast_custom]
    pub(crate) const fn new(s: &str) -> &Self;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Deref for Name {
    type Target = NameRef;

    fn deref(&self) -> &Self::Target {
        self.borrow()
    }
}

impl AsRef<NameRef> for Name {
    fn as_ref(&self) -> &NameRef {
        self.borrow()
    }
}

impl Borrow<NameRef> for Name {
    fn borrow(&self) -> &NameRef {
        NameRef::new(self.0.as_str())
    }
}

impl<'a> From<&'a NameRef> for Name {
    fn from(value: &'a NameRef) -> Self {
        value.to_owned()
    }
}

impl AsRef<NameRef> for NameRef {
    fn as_ref(&self) -> &NameRef {
        self
    }
}

impl ToOwned for NameRef {
    type Owned = Name;

    fn to_owned(&self) -> Self::Owned {
        Name(self.0.to_owned())
    }
}
