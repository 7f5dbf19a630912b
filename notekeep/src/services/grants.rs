//! Access grants for user-picked files
//!
//! A grant is a durable (restart-surviving) permission to read a resource
//! the app does not own. The registry is persisted in the database so
//! grants can be reconciled against the records that reference them.

use crate::config::GRANTABLE_SCHEMES;
use crate::database::Repository;
use crate::error::{AppError, Result};
use crate::storage::ExternalUri;
use async_trait::async_trait;

/// Durable read-access grants on external locators
#[async_trait]
pub trait GrantPort: Send + Sync {
    /// Acquire a persisted read grant. Fails with `CapabilityDenied` when
    /// the resource cannot be granted.
    async fn take_persistable(&self, uri: &ExternalUri) -> Result<()>;

    /// Release a grant. Returns `false` if none was held.
    async fn release_persistable(&self, uri: &ExternalUri) -> Result<bool>;

    async fn is_granted(&self, uri: &ExternalUri) -> Result<bool>;

    /// Every grant currently held, in string form
    async fn persisted(&self) -> Result<Vec<String>>;
}

/// Grant registry stored in the `access_grants` table
#[derive(Clone)]
pub struct PersistedGrants {
    repo: Repository,
}

impl PersistedGrants {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl GrantPort for PersistedGrants {
    async fn take_persistable(&self, uri: &ExternalUri) -> Result<()> {
        let scheme = uri.scheme();
        if !GRANTABLE_SCHEMES.contains(&scheme.as_str()) {
            return Err(AppError::CapabilityDenied(format!(
                "cannot take a persistent grant for scheme '{}'",
                scheme
            )));
        }

        if let Some(path) = uri.file_path() {
            // Read access is proven by opening the file
            tokio::fs::File::open(&path).await.map_err(|e| {
                AppError::CapabilityDenied(format!("cannot read {}: {}", path.display(), e))
            })?;
        }

        self.repo.insert_grant(uri.as_str()).await?;
        tracing::info!("Persistent read grant taken for {}", uri);
        Ok(())
    }

    async fn release_persistable(&self, uri: &ExternalUri) -> Result<bool> {
        let released = self.repo.delete_grant(uri.as_str()).await?;
        if released {
            tracing::info!("Persistent read grant released for {}", uri);
        }
        Ok(released)
    }

    async fn is_granted(&self, uri: &ExternalUri) -> Result<bool> {
        self.repo.has_grant(uri.as_str()).await
    }

    async fn persisted(&self) -> Result<Vec<String>> {
        Ok(self
            .repo
            .list_grants()
            .await?
            .into_iter()
            .map(|g| g.uri)
            .collect())
    }
}
