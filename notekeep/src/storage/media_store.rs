//! Device-local media storage
//!
//! Captured photos, videos and audio live under a media root, one
//! namespace directory per kind:
//!
//! `media/images/img_<uuid>.jpg`, `media/videos/vid_<uuid>.mp4`,
//! `media/audio/aud_<uuid>.m4a`
//!
//! Records only ever hold the relative part.

use super::locator::{validate_relative, MediaFile, MediaKind};
use crate::error::Result;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs;
use uuid::Uuid;

/// A file found under the media root
#[derive(Debug, Clone)]
pub struct StoredMedia {
    pub relative_path: String,
    pub modified: SystemTime,
}

/// Media file store rooted at one directory
#[derive(Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    /// Create a new media store at the given root directory
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Create the root and the per-kind namespace directories
    pub async fn initialize(&self) -> Result<()> {
        for kind in MediaKind::ALL {
            fs::create_dir_all(self.root.join(kind.namespace())).await?;
        }
        tracing::info!("Media store initialized at: {:?}", self.root);
        Ok(())
    }

    /// Reserve a new, empty file for a capture of `kind`.
    pub async fn allocate(&self, kind: MediaKind) -> Result<MediaFile> {
        let relative = kind.new_relative_path(&Uuid::new_v4().simple().to_string());
        let path = self.resolve(&relative)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Creating the file up front reserves the name
        fs::File::create(&path).await?;

        tracing::debug!("Allocated media file: {}", relative);

        Ok(MediaFile::new(kind, path, relative))
    }

    /// Absolute path for a relative media path.
    ///
    /// Absolute paths and `..` components are rejected.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        validate_relative(relative)?;
        Ok(self.root.join(relative))
    }

    /// Check if a media file exists
    pub async fn exists(&self, relative: &str) -> Result<bool> {
        let path = self.resolve(relative)?;
        Ok(fs::try_exists(&path).await?)
    }

    /// Delete a media file. Returns `false` when it was already gone.
    pub async fn delete(&self, relative: &str) -> Result<bool> {
        let path = self.resolve(relative)?;

        match fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Deleted media file: {}", relative);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// List every file under the media root
    pub async fn list_all(&self) -> Result<Vec<StoredMedia>> {
        let mut found = Vec::new();
        self.scan_directory(&self.root, &mut found).await?;
        Ok(found)
    }

    fn scan_directory<'a>(
        &'a self,
        dir: &'a Path,
        found: &'a mut Vec<StoredMedia>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if !fs::try_exists(dir).await? {
                return Ok(());
            }

            let mut entries = fs::read_dir(dir).await?;

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let metadata = entry.metadata().await?;

                if metadata.is_dir() {
                    self.scan_directory(&path, found).await?;
                } else if metadata.is_file() {
                    if let Some(relative) = self.relative_of(&path) {
                        found.push(StoredMedia {
                            relative_path: relative,
                            modified: metadata.modified()?,
                        });
                    }
                }
            }

            Ok(())
        })
    }

    /// Relative path with `/` separators, as stored in records
    fn relative_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
        parts.map(|p| p.join("/"))
    }

    /// Get media root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}
