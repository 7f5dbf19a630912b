//! Storage module
//!
//! Device-local media storage and attachment locators.

pub mod locator;
pub mod media_store;

pub use locator::{ExternalUri, Locator, MediaFile, MediaKind};
pub use media_store::{MediaStore, StoredMedia};
