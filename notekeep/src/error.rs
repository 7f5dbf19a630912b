//! Error types for notekeep
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to the frontend.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    /// The persistence layer failed on read or write.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Item not found: {0}")]
    ItemNotFound(i64),

    /// The platform refused exact scheduling or an access grant.
    #[error("Capability denied: {0}")]
    CapabilityDenied(String),

    #[error("Malformed locator: {0}")]
    MalformedLocator(String),

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// True for failures local to one reminder or attachment that batch
    /// operations skip instead of surfacing.
    pub fn is_item_local(&self) -> bool {
        matches!(
            self,
            AppError::CapabilityDenied(_) | AppError::MalformedLocator(_) | AppError::Io(_)
        )
    }

    /// True when the persistence layer itself is unavailable.
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, AppError::Database(_))
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
