//! Attachment locators
//!
//! A locator is decided once, when the attachment is created or when it is
//! read back from the list it was stored in, and carried as a tagged value
//! from then on. Nothing downstream re-guesses the shape from the string.

use crate::error::{AppError, Result};
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Kind of device-local media, each with its own namespace on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
}

impl MediaKind {
    pub const ALL: [MediaKind; 3] = [MediaKind::Photo, MediaKind::Video, MediaKind::Audio];

    /// Directory under the media root
    pub fn namespace(self) -> &'static str {
        match self {
            MediaKind::Photo => "images",
            MediaKind::Video => "videos",
            MediaKind::Audio => "audio",
        }
    }

    fn file_prefix(self) -> &'static str {
        match self {
            MediaKind::Photo => "img_",
            MediaKind::Video => "vid_",
            MediaKind::Audio => "aud_",
        }
    }

    fn extension(self) -> &'static str {
        match self {
            MediaKind::Photo => "jpg",
            MediaKind::Video => "mp4",
            MediaKind::Audio => "m4a",
        }
    }

    /// Fresh relative path `<namespace>/<prefix><unique>.<ext>`
    pub(crate) fn new_relative_path(self, unique: &str) -> String {
        format!(
            "{}/{}{}.{}",
            self.namespace(),
            self.file_prefix(),
            unique,
            self.extension()
        )
    }
}

/// URI of a user-picked resource living outside the app's storage
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ExternalUri(String);

impl ExternalUri {
    /// Parse `scheme:rest`. The scheme follows RFC 3986 (letter first, then
    /// letters, digits, `+`, `-`, `.`) and the remainder must be non-empty.
    pub fn parse(raw: &str) -> Result<Self> {
        let malformed = || AppError::MalformedLocator(raw.to_string());

        let (scheme, rest) = raw.split_once(':').ok_or_else(malformed)?;

        let mut chars = scheme.chars();
        let first_ok = chars.next().is_some_and(|c| c.is_ascii_alphabetic());
        let rest_ok = chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));

        if !first_ok || !rest_ok || rest.trim().is_empty() || raw.chars().any(char::is_whitespace)
        {
            return Err(malformed());
        }

        Ok(Self(raw.to_string()))
    }

    /// Lowercased scheme
    pub fn scheme(&self) -> String {
        self.0
            .split_once(':')
            .map(|(scheme, _)| scheme.to_ascii_lowercase())
            .unwrap_or_default()
    }

    /// Local filesystem path for `file:` URIs
    pub fn file_path(&self) -> Option<PathBuf> {
        if self.scheme() != "file" {
            return None;
        }
        let rest = &self.0["file:".len()..];
        let path = rest.strip_prefix("//").unwrap_or(rest);
        // file://localhost/... and file:///... both name local paths
        let path = path.strip_prefix("localhost").unwrap_or(path);
        if path.is_empty() {
            None
        } else {
            Some(PathBuf::from(path))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExternalUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an attachment's bytes live
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Locator {
    /// Relative path under the media root, owned by the app
    Internal { kind: MediaKind, path: String },
    /// User-picked resource reachable through a persisted access grant
    External(ExternalUri),
}

impl Locator {
    /// Build an internal locator, validating the relative path.
    pub fn internal(kind: MediaKind, path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        validate_relative(&path)?;
        Ok(Locator::Internal { kind, path })
    }

    pub fn external(raw: &str) -> Result<Self> {
        ExternalUri::parse(raw).map(Locator::External)
    }

    /// The string form stored in the record's path list
    pub fn as_str(&self) -> &str {
        match self {
            Locator::Internal { path, .. } => path,
            Locator::External(uri) => uri.as_str(),
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reject absolute paths, parent references and empty paths.
pub(crate) fn validate_relative(path: &str) -> Result<()> {
    use std::path::Component;

    let p = Path::new(path);
    if path.is_empty() || !p.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(AppError::MalformedLocator(path.to_string()));
    }
    Ok(())
}

/// A staged capture target: the handle an external capture activity writes
/// into, and the relative path that gets committed on success.
///
/// Deliberately not `Clone`: committing consumes it, so a staged file can
/// be committed at most once.
#[derive(Debug)]
pub struct MediaFile {
    kind: MediaKind,
    handle: PathBuf,
    relative_path: String,
}

impl MediaFile {
    pub(crate) fn new(kind: MediaKind, handle: PathBuf, relative_path: String) -> Self {
        Self {
            kind,
            handle,
            relative_path,
        }
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    /// Absolute path the capture activity writes into
    pub fn handle(&self) -> &Path {
        &self.handle
    }

    pub fn relative_path(&self) -> &str {
        &self.relative_path
    }

    pub(crate) fn into_locator(self) -> Locator {
        Locator::Internal {
            kind: self.kind,
            path: self.relative_path,
        }
    }
}
