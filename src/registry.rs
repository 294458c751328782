use std::path::{Path, PathBuf};

use rustc_hash::FxHashSet;
use tracing::debug;

use crate::{tag::TagError, Filesystem, Tag, TagRef, REGISTRY_FILE};

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("Tag `{0}` already exists")]
pub struct DuplicateTagError(pub(crate) Tag);

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("Tag `{0}` does not exist")]
pub struct TagNotFoundError(pub(crate) String);

#[derive(Debug, thiserror::Error)]
#[error("Tag registry `{}` is corrupt: {reason}", path.display())]
pub struct CorruptRegistryError {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub enum LoadRegistryError {
    Corrupt(#[from] CorruptRegistryError),
    Filesystem(#[from] std::io::Error),
}

/// The ordered list of tags defined for one collection.
///
/// Changes are made in memory
/// and persisted with `save`.
/// No two tags share a name.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagRegistry {
    path: PathBuf,
    tags: Vec<Tag>,
}

impl TagRegistry {
    /// Load the registry of `collection`.
    ///
    /// A missing registry file is an empty registry.
    /// A registry file that cannot be parsed is an error,
    /// never an empty registry.
    pub fn load<F>(fs: &F, collection: &Path) -> Result<Self, LoadRegistryError>
    where
        F: Filesystem,
    {
        let path = collection.join(REGISTRY_FILE);
        let bytes = match fs.read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self {
                    path,
                    tags: Vec::new(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let tags = parse(&bytes).map_err(|reason| CorruptRegistryError {
            path: path.clone(),
            reason,
        })?;
        Ok(Self { path, tags })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn contains<T>(&self, name: T) -> bool
    where
        T: AsRef<TagRef>,
    {
        self.position(name).is_some()
    }

    pub fn get<T>(&self, name: T) -> Result<&Tag, TagNotFoundError>
    where
        T: AsRef<TagRef>,
    {
        match self.position(&name) {
            Some(i) => Ok(&self.tags[i]),
            None => Err(TagNotFoundError(name.as_ref().to_string())),
        }
    }

    pub fn add(&mut self, tag: Tag) -> Result<(), DuplicateTagError> {
        if self.contains(&tag) {
            Err(DuplicateTagError(tag))
        } else {
            self.tags.push(tag);
            Ok(())
        }
    }

    pub fn remove<T>(&mut self, name: T) -> Result<Tag, TagNotFoundError>
    where
        T: AsRef<TagRef>,
    {
        match self.position(&name) {
            Some(i) => Ok(self.tags.remove(i)),
            None => Err(TagNotFoundError(name.as_ref().to_string())),
        }
    }

    /// Replace the registry file with the in-memory registry.
    pub fn save<F>(&self, fs: &F) -> std::io::Result<()>
    where
        F: Filesystem,
    {
        debug!(path = %self.path.display(), tags = self.tags.len(), "Saving tag registry");
        fs.write(&self.path, serialize(&self.tags).as_bytes())
    }

    fn position<T>(&self, name: T) -> Option<usize>
    where
        T: AsRef<TagRef>,
    {
        self.tags.iter().position(|tag| *tag == name.as_ref())
    }
}

fn serialize(tags: &[Tag]) -> String {
    tags.iter().map(|tag| format!("{tag}\n")).collect()
}

fn parse(bytes: &[u8]) -> Result<Vec<Tag>, String> {
    let s = std::str::from_utf8(bytes).map_err(|e| e.to_string())?;
    if s.is_empty() {
        return Ok(Vec::new());
    }
    let Some(body) = s.strip_suffix('\n') else {
        return Err("last line is not terminated".to_owned());
    };

    let mut seen = FxHashSet::default();
    body.split('\n')
        .enumerate()
        .map(|(i, line)| {
            let tag = Tag::new(line.to_owned())
                .map_err(|e: TagError| format!("line {}: {e}", i + 1))?;
            if seen.insert(tag.clone()) {
                Ok(tag)
            } else {
                Err(format!("line {}: duplicate tag `{tag}`", i + 1))
            }
        })
        .collect()
}
