//! URL-safe tokens for collection paths and tag names.
//!
//! Callers outside the library,
//! such as a web frontend,
//! refer to collections and tags by these tokens
//! so arbitrary names survive a URL.

use std::path::{Component, Path, PathBuf};

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};

#[derive(Debug, PartialEq, thiserror::Error)]
#[error("`{token}` is not a valid encoded {kind}: {reason}")]
pub struct BadEncodingError {
    pub token: String,
    pub kind: &'static str,
    pub reason: String,
}

pub fn encode_str(s: &str) -> String {
    URL_SAFE_NO_PAD.encode(s)
}

pub fn decode_str(token: &str) -> Result<String, BadEncodingError> {
    decode_as(token, "string")
}

pub fn encode_path(path: &Path) -> String {
    encode_str(&path.to_string_lossy())
}

/// Decode a collection path.
///
/// Only relative paths that stay inside the library are accepted.
pub fn decode_path(token: &str) -> Result<PathBuf, BadEncodingError> {
    let path = PathBuf::from(decode_as(token, "collection path")?);
    check_inside(token, path)
}

/// Accept a collection path given as plain text,
/// as on a command line,
/// under the same rules as `decode_path`.
pub fn collection_path(s: &str) -> Result<PathBuf, BadEncodingError> {
    check_inside(s, PathBuf::from(s))
}

/// Whether `path` is relative
/// and never climbs above where it starts.
pub(crate) fn stays_inside(path: &Path) -> bool {
    path.components()
        .all(|component| matches!(component, Component::Normal(_) | Component::CurDir))
}

fn check_inside(token: &str, path: PathBuf) -> Result<PathBuf, BadEncodingError> {
    if stays_inside(&path) {
        Ok(path)
    } else {
        Err(BadEncodingError {
            token: token.to_owned(),
            kind: "collection path",
            reason: "path leaves the library".to_owned(),
        })
    }
}

fn decode_as(token: &str, kind: &'static str) -> Result<String, BadEncodingError> {
    let bad = |reason: String| BadEncodingError {
        token: token.to_owned(),
        kind,
        reason,
    };
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .map_err(|e| bad(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| bad(e.to_string()))
}
