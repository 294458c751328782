use std::{collections::BTreeSet, fmt, ops::Range, str::FromStr};

use itertools::Itertools;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    name::NameError, tag::TagError, ElementType, Ext, ExtRef, Name, NameRef, Tag, TagRef,
    EXT_SEPARATOR, NAME_SEPARATOR, TAG_FORBIDDEN, TAG_MARK, TAG_SPACE,
};

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("`{0}` is not a supported element: its extension is missing or unknown")]
pub struct UnsupportedTypeError(pub(crate) String);

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub enum DecodeError {
    UnsupportedType(#[from] UnsupportedTypeError),
    InvalidTag(#[from] TagError),
    InvalidName(#[from] NameError),
}

static TAG_TOKEN: Lazy<Regex> = Lazy::new(|| {
    let mark = regex::escape(TAG_MARK.encode_utf8(&mut [0; 4]));
    let forbidden = TAG_FORBIDDEN
        .iter()
        .map(|c| regex::escape(c.encode_utf8(&mut [0; 4])))
        .collect::<String>();
    Regex::new(&format!(r"{mark}([^\s{mark}{forbidden}]+)"))
        .expect("tag token pattern should be valid")
});

/// Find every tag token in `s`.
///
/// Yields the range of the whole token,
/// including `TAG_MARK`,
/// and the encoded tag following the mark.
/// Tokens made only of `TAG_SPACE` are not tags
/// and are left to the name.
pub(crate) fn tag_tokens(s: &str) -> impl Iterator<Item = (Range<usize>, &str)> {
    TAG_TOKEN.captures_iter(s).filter_map(|captures| {
        let token = captures.get(0)?;
        let tag = captures.get(1)?;
        if tag.as_str().chars().all(|c| c == TAG_SPACE) {
            None
        } else {
            Some((token.range(), tag.as_str()))
        }
    })
}

/// A decoded basename:
/// the name, tags, and extension of an element.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Basename {
    name: Name,
    tags: BTreeSet<Tag>,
    ext: Ext,
    ty: ElementType,
}

impl Basename {
    pub fn new(name: Name, tags: BTreeSet<Tag>, ext: Ext) -> Result<Self, UnsupportedTypeError> {
        let ty = ext
            .ty()
            .ok_or_else(|| UnsupportedTypeError(encode(&name, &tags, &ext)))?;
        Ok(Self { name, tags, ext, ty })
    }

    pub fn name(&self) -> &NameRef {
        &self.name
    }

    /// Tags in ascending order.
    pub fn tags(&self) -> impl Iterator<Item = &TagRef> {
        self.tags.iter().map(|tag| tag.as_ref())
    }

    pub fn ext(&self) -> &ExtRef {
        &self.ext
    }

    pub fn ty(&self) -> ElementType {
        self.ty
    }

    pub fn encode(&self) -> String {
        encode(&self.name, &self.tags, &self.ext)
    }

    pub fn into_parts(self) -> (Name, BTreeSet<Tag>, Ext) {
        (self.name, self.tags, self.ext)
    }
}

impl fmt::Display for Basename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.encode().fmt(f)
    }
}

impl FromStr for Basename {
    type Err = DecodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

/// Split a basename into name, tags, and extension.
///
/// The extension is everything after the last `EXT_SEPARATOR`
/// and must name a known element type.
/// Tags are deduplicated and sorted.
/// The name is what remains after removing tags,
/// whitespace-normalized.
pub fn decode(basename: &str) -> Result<Basename, DecodeError> {
    let (stem, ext) = basename
        .rsplit_once(EXT_SEPARATOR)
        .ok_or_else(|| UnsupportedTypeError(basename.to_owned()))?;
    let ext = Ext::new(ext).map_err(|_| UnsupportedTypeError(basename.to_owned()))?;
    let ty = ext.ty().ok_or_else(|| UnsupportedTypeError(basename.to_owned()))?;

    let mut tags = BTreeSet::new();
    let mut name = String::with_capacity(stem.len());
    let mut rest = 0;
    for (token, tag) in tag_tokens(stem) {
        tags.insert(Tag::from_encoded(tag)?);
        name.push_str(&stem[rest..token.start]);
        // Keep words on either side of a tag apart.
        name.push(NAME_SEPARATOR);
        rest = token.end;
    }
    name.push_str(&stem[rest..]);

    Ok(Basename {
        name: Name::normalized(&name)?,
        tags,
        ext,
        ty,
    })
}

/// Join a name, tags, and extension into a basename.
///
/// Tags are written in the order given.
pub fn encode<T>(name: &NameRef, tags: impl IntoIterator<Item = T>, ext: &ExtRef) -> String
where
    T: AsRef<TagRef>,
{
    let stem = (!name.is_empty())
        .then(|| name.as_str().to_owned())
        .into_iter()
        .chain(
            tags.into_iter()
                .map(|tag| format!("{TAG_MARK}{}", tag.as_ref().encoded())),
        )
        .join(&NAME_SEPARATOR.to_string());
    format!("{stem}{EXT_SEPARATOR}{ext}")
}
