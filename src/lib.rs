mod basename;
mod element;
mod element_file;
mod element_service;
pub mod encoding;
mod ext;
mod fs;
mod library;
mod name;
mod registry;
mod tag;
mod tag_service;
mod validation;

#[cfg(test)]
mod testing;

pub use crate::{
    basename::{decode, encode, Basename, DecodeError, UnsupportedTypeError},
    element::{Element, ElementType},
    element_file::{
        CommitError, DestinationExistsError, ElementFile, HasTagError, LacksTagError,
        NamelessError, Rename, TooLongError,
    },
    element_service::{
        BatchError, BatchFailure, BatchReport, ConflictError, ContentError, CreateElementError,
        CreateElementRequest, DeleteElementError, ElementNotFoundError, ElementService,
        GetElementError, MutateError, UpdateElementError, UpdateElementRequest,
    },
    encoding::BadEncodingError,
    ext::{Ext, ExtError, ExtRef},
    fs::{Entry, Filesystem, OsFilesystem},
    library::{CollectionLocks, Library},
    name::{Name, NameError, NameRef},
    registry::{
        CorruptRegistryError, DuplicateTagError, LoadRegistryError, TagNotFoundError, TagRegistry,
    },
    tag::{Tag, TagError, TagRef},
    tag_service::{
        CreateTagError, DeleteTagError, GetTagError, TagRequest, TagService, TagUpdate,
        UpdateTagError,
    },
    validation::{FieldError, ValidationErrors},
};

/// Marks the start of a tag inside a basename.
pub const TAG_MARK: char = '#';
/// Stands in for a space inside an encoded tag.
pub const TAG_SPACE: char = '_';
pub const NAME_SEPARATOR: char = ' ';
pub const EXT_SEPARATOR: char = '.';
pub const DIR_SEPARATOR: char = '/';

/// Characters that end a tag token
/// and can therefore never be part of a tag.
pub const TAG_FORBIDDEN: [char; 19] = [
    DIR_SEPARATOR,
    '\\',
    ':',
    '*',
    '?',
    '"',
    '<',
    '>',
    '|',
    ',',
    ';',
    '!',
    '(',
    ')',
    '[',
    ']',
    '{',
    '}',
    '\'',
];

/// Name of the tag registry file inside each collection.
pub const REGISTRY_FILE: &str = ".tags";

/// Files starting with this are never elements.
pub const HIDDEN_PREFIX: char = '.';

// Most filesystems limit a single path component to 255 bytes.
pub const PATH_PART_MAX_LEN: usize = 255;
