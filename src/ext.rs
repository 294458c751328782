use std::{borrow::Borrow, ops::Deref};

use derive_more::Display;
use ref_cast::{ref_cast_custom, RefCastCustom};

use crate::{ElementType, DIR_SEPARATOR, EXT_SEPARATOR};

#[derive(Debug, thiserror::Error)]
pub enum ExtError {
    #[error("Invalid extension: `{0}`. Extensions cannot be empty or contain `{DIR_SEPARATOR}` or `{EXT_SEPARATOR}`.")]
    Invalid(String),
    #[error("`{0}` is not a supported element type")]
    Unsupported(Ext),
}

/// The extension of a basename,
/// without the leading `EXT_SEPARATOR`.
///
/// Case is kept as written;
/// only type lookup ignores it.
#[derive(Clone, Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ext(String);

#[derive(Debug, Display, PartialEq, Eq, PartialOrd, Ord, Hash, RefCastCustom)]
#[repr(transparent)]
pub struct ExtRef(str);

impl Ext {
    pub fn new<S>(s: S) -> Result<Ext, ExtError>
    where
        S: Into<String>,
    {
        let s = s.into();
        if s.is_empty() || s.contains(DIR_SEPARATOR) || s.contains(EXT_SEPARATOR) {
            Err(ExtError::Invalid(s))
        } else {
            Ok(Ext(s))
        }
    }

    /// An extension naming a known element type.
    pub fn supported<S>(s: S) -> Result<Ext, ExtError>
    where
        S: Into<String>,
    {
        let ext = Self::new(s)?;
        if ext.ty().is_some() {
            Ok(ext)
        } else {
            Err(ExtError::Unsupported(ext))
        }
    }
}

impl ExtRef {
    #[ref_cast_custom]
    pub(crate) const fn new(s: &str) -> &Self;

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The element type this extension stands for,
    /// ignoring ASCII case.
    pub fn ty(&self) -> Option<ElementType> {
        ElementType::ALL
            .into_iter()
            .find(|ty| ty.exts().iter().any(|x| x.eq_ignore_ascii_case(&self.0)))
    }
}

impl Deref for Ext {
    type Target = ExtRef;

    fn deref(&self) -> &Self::Target {
        self.borrow()
    }
}

impl Borrow<ExtRef> for Ext {
    fn borrow(&self) -> &ExtRef {
        ExtRef::new(self.0.as_str())
    }
}

impl ToOwned for ExtRef {
    type Owned = Ext;

    fn to_owned(&self) -> Self::Owned {
        Ext(self.0.to_owned())
    }
}
