//! Attachments service
//!
//! Owns the lifecycle of a record's attachments:
//! `staged -> committed -> referenced -> deleted`.
//!
//! Device-local media lives in the `MediaStore`; user-picked files stay
//! where they are and are reached through a persisted access grant.
//! Physical cleanup failures are logged and never block list edits.

use crate::database::Record;
use crate::error::Result;
use crate::services::grants::GrantPort;
use crate::storage::{ExternalUri, Locator, MediaFile, MediaKind, MediaStore};
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Where an attachment can be opened from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAttachment {
    File(PathBuf),
    Uri(ExternalUri),
}

/// Outcome of releasing every attachment of a record
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub deleted_files: usize,
    pub released_grants: usize,
    pub failures: usize,
}

/// Service for managing attachments
#[derive(Clone)]
pub struct AttachmentStore {
    media: MediaStore,
    grants: Arc<dyn GrantPort>,
}

impl AttachmentStore {
    pub fn new(media: MediaStore, grants: Arc<dyn GrantPort>) -> Self {
        Self { media, grants }
    }

    pub fn media(&self) -> &MediaStore {
        &self.media
    }

    /// Reserve a capture target for `kind`
    pub async fn stage_capture(&self, kind: MediaKind) -> Result<MediaFile> {
        let file = self.media.allocate(kind).await?;
        tracing::info!("Staged {:?} capture at {}", kind, file.relative_path());
        Ok(file)
    }

    /// Promote a staged file into the record on success.
    ///
    /// A failed capture appends nothing and leaves whatever was written for
    /// `sweep_unreferenced`. Consumes the `MediaFile`, so one staging commits
    /// at most once.
    pub async fn commit_capture(
        &self,
        record: &mut Record,
        file: MediaFile,
        success: bool,
    ) -> Option<Locator> {
        if !success {
            tracing::info!("Capture failed, leaving {} for cleanup", file.relative_path());
            return None;
        }

        let kind = file.kind();
        let path = file.relative_path().to_string();
        let paths = record.media_paths_mut(kind);
        if !paths.contains(&path) {
            paths.push(path);
        }

        let locator = file.into_locator();
        tracing::info!("Committed {:?} attachment {}", kind, locator);
        Some(locator)
    }

    /// Drop a staged file without committing it
    pub async fn discard(&self, file: MediaFile) {
        if let Err(e) = self.media.delete(file.relative_path()).await {
            tracing::warn!("Failed to discard staged file {}: {}", file.relative_path(), e);
        }
    }

    /// Attach a user-picked file by URI.
    ///
    /// The read grant is taken first; if that fails nothing is appended.
    pub async fn stage_external_file(&self, record: &mut Record, raw: &str) -> Result<Locator> {
        let uri = ExternalUri::parse(raw)?;

        self.grants.take_persistable(&uri).await.map_err(|e| {
            tracing::warn!("Could not take a read grant for {}: {}", uri, e);
            e
        })?;

        if !record.file_paths.iter().any(|p| p == uri.as_str()) {
            record.file_paths.push(uri.as_str().to_string());
        }

        tracing::info!("Attached external file {}", uri);
        Ok(Locator::External(uri))
    }

    /// Remove one attachment from the record and release its resource.
    ///
    /// The list entry is always removed; a missing file or grant counts as
    /// success. Returns whether the record referenced the locator.
    pub async fn delete(&self, record: &mut Record, locator: &Locator) -> bool {
        if let Err(e) = self.release(locator).await {
            tracing::warn!("Failed to release attachment {}: {}", locator, e);
        }
        self.detach(record, locator)
    }

    /// Remove every list entry for `locator` without touching its resource
    pub fn detach(&self, record: &mut Record, locator: &Locator) -> bool {
        let removed = match locator {
            Locator::Internal { kind, path } => remove_all(record.media_paths_mut(*kind), path),
            Locator::External(uri) => remove_all(&mut record.file_paths, uri.as_str()),
        };

        if removed {
            tracing::info!("Removed attachment {} from item {}", locator, record.id);
        }
        removed
    }

    /// Release every attachment of a record. Per-item failures are counted
    /// and logged; the batch always runs to the end.
    pub async fn delete_all(&self, record: &Record) -> CleanupReport {
        let mut report = CleanupReport::default();

        for locator in record.locators() {
            match self.release(&locator).await {
                Ok(true) => match locator {
                    Locator::Internal { .. } => report.deleted_files += 1,
                    Locator::External(_) => report.released_grants += 1,
                },
                Ok(false) => {
                    tracing::debug!("Attachment {} was already gone", locator);
                }
                Err(e) if e.is_item_local() => {
                    tracing::warn!("Failed to release attachment {}: {}", locator, e);
                    report.failures += 1;
                }
                Err(e) => {
                    tracing::error!("Failed to release attachment {}: {}", locator, e);
                    report.failures += 1;
                }
            }
        }

        tracing::info!(
            "Released attachments of item {}: {} file(s), {} grant(s), {} failure(s)",
            record.id,
            report.deleted_files,
            report.released_grants,
            report.failures
        );

        report
    }

    /// Whether the bytes behind a locator are still reachable
    pub async fn exists(&self, locator: &Locator) -> bool {
        match locator {
            Locator::Internal { path, .. } => self.media.exists(path).await.unwrap_or_else(|e| {
                tracing::warn!("Treating {} as missing: {}", path, e);
                false
            }),
            Locator::External(uri) => match uri.file_path() {
                Some(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
                None => self.grants.is_granted(uri).await.unwrap_or(false),
            },
        }
    }

    /// Where to open an attachment from; `None` if it cannot be reached
    pub async fn resolve(&self, locator: &Locator) -> Option<ResolvedAttachment> {
        if !self.exists(locator).await {
            return None;
        }

        match locator {
            Locator::Internal { path, .. } => self.media.resolve(path).ok().map(ResolvedAttachment::File),
            Locator::External(uri) => Some(ResolvedAttachment::Uri(uri.clone())),
        }
    }

    /// Release grants that no record references any more.
    ///
    /// Returns the number of grants released.
    pub async fn reconcile_grants(&self, records: &[Record]) -> Result<usize> {
        let referenced: HashSet<&str> = records
            .iter()
            .flat_map(|r| r.file_paths.iter().map(String::as_str))
            .collect();

        let mut released = 0;

        for raw in self.grants.persisted().await? {
            if referenced.contains(raw.as_str()) {
                continue;
            }

            let uri = match ExternalUri::parse(&raw) {
                Ok(uri) => uri,
                Err(e) => {
                    tracing::warn!("Skipping unparseable grant {}: {}", raw, e);
                    continue;
                }
            };

            match self.grants.release_persistable(&uri).await {
                Ok(true) => released += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!("Failed to release orphaned grant {}: {}", uri, e),
            }
        }

        if released > 0 {
            tracing::info!("Released {} orphaned grant(s)", released);
        }

        Ok(released)
    }

    /// Delete media files that no record references and that are at least
    /// `min_age` old. Returns the number of files deleted.
    pub async fn sweep_unreferenced(&self, records: &[Record], min_age: Duration) -> Result<usize> {
        let referenced: HashSet<&str> = records
            .iter()
            .flat_map(|r| {
                MediaKind::ALL
                    .into_iter()
                    .flat_map(move |kind| r.media_paths(kind).iter().map(String::as_str))
            })
            .collect();

        let mut deleted = 0;

        for stored in self.media.list_all().await? {
            if referenced.contains(stored.relative_path.as_str()) {
                continue;
            }

            let age = stored.modified.elapsed().unwrap_or_default();
            if age < min_age {
                continue;
            }

            match self.media.delete(&stored.relative_path).await {
                Ok(true) => deleted += 1,
                Ok(false) => {}
                Err(e) => tracing::warn!("Failed to sweep {}: {}", stored.relative_path, e),
            }
        }

        tracing::info!("Swept {} unreferenced media file(s)", deleted);
        Ok(deleted)
    }

    /// Delete the bytes or drop the grant behind a locator.
    ///
    /// Ok(true) when something was actually released.
    pub async fn release(&self, locator: &Locator) -> Result<bool> {
        match locator {
            Locator::Internal { path, .. } => self.media.delete(path).await,
            Locator::External(uri) => self.grants.release_persistable(uri).await,
        }
    }
}

fn remove_all(list: &mut Vec<String>, entry: &str) -> bool {
    let before = list.len();
    list.retain(|p| p != entry);
    before != list.len()
}
