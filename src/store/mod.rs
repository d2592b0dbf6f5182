//! Storage backends for news records and images.
//!
//! [`ContentStore`] is the one capability both the remote service and the
//! on-device store implement; the synchronizer and the feed loader are
//! written against it and never against a concrete backend.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{Backend, Config};
use crate::db::{LocalCache, Pool};
use crate::model::{NewRecord, NewsId, NewsRecord, RecordPatch};

pub mod local;
pub mod model;
pub mod ready;
pub mod supabase;

pub use local::LocalStore;
pub use ready::ReadyStore;
pub use supabase::SupabaseStore;

/// Failure reported by a backend. `code` is either one of the constants in
/// [`codes`] or the code the remote service returned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} (code: {code})")]
pub struct StoreError {
    pub code: String,
    pub message: String,
}

pub mod codes {
    pub const UNAVAILABLE: &str = "unavailable";
    pub const NOT_FOUND: &str = "not_found";
    pub const TRANSPORT: &str = "transport";
    pub const DECODE: &str = "decode";
    pub const LOCAL: &str = "local";
    pub const INVALID: &str = "invalid";
    pub const CONFLICT: &str = "conflict";
}

impl StoreError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(codes::UNAVAILABLE, message)
    }

    pub fn not_found(id: &NewsId) -> Self {
        Self::new(codes::NOT_FOUND, format!("no news record with id {}", id))
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID, message)
    }

    pub fn is_unavailable(&self) -> bool {
        self.code == codes::UNAVAILABLE
    }

    pub fn is_not_found(&self) -> bool {
        self.code == codes::NOT_FOUND
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::new(codes::DECODE, err.to_string())
        } else {
            Self::new(codes::TRANSPORT, err.to_string())
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::new(codes::LOCAL, err.to_string())
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::AlreadyExists {
            Self::new(codes::CONFLICT, err.to_string())
        } else {
            Self::new(codes::LOCAL, err.to_string())
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(codes::DECODE, err.to_string())
    }
}

/// Result of a delete: callers decide whether a missing row matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Missing,
}

#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert one record and return the stored row with its generated id
    /// and timestamps.
    async fn insert(&self, record: &NewRecord) -> Result<NewsRecord, StoreError>;

    /// All records, newest `created_at` first. An empty list is not an error.
    async fn list_all(&self) -> Result<Vec<NewsRecord>, StoreError>;

    /// Merge `patch` into the row with `id`. Fails with a `not_found` code
    /// when no such row exists.
    async fn update_by_id(&self, id: &NewsId, patch: &RecordPatch)
        -> Result<NewsRecord, StoreError>;

    async fn delete_by_id(&self, id: &NewsId) -> Result<DeleteOutcome, StoreError>;

    /// Store image bytes under a fresh object path and return a public URL.
    /// Existing objects are never overwritten.
    async fn upload_image(&self, bytes: &[u8], ext: &str) -> Result<String, StoreError>;
}

#[async_trait]
impl<T: ContentStore + ?Sized> ContentStore for Arc<T> {
    async fn insert(&self, record: &NewRecord) -> Result<NewsRecord, StoreError> {
        (**self).insert(record).await
    }

    async fn list_all(&self) -> Result<Vec<NewsRecord>, StoreError> {
        (**self).list_all().await
    }

    async fn update_by_id(
        &self,
        id: &NewsId,
        patch: &RecordPatch,
    ) -> Result<NewsRecord, StoreError> {
        (**self).update_by_id(id, patch).await
    }

    async fn delete_by_id(&self, id: &NewsId) -> Result<DeleteOutcome, StoreError> {
        (**self).delete_by_id(id).await
    }

    async fn upload_image(&self, bytes: &[u8], ext: &str) -> Result<String, StoreError> {
        (**self).upload_image(bytes, ext).await
    }
}

/// The backend selected by `app.backend`. The remote store connects lazily;
/// the local one keeps its list under `feed.cache_key` in `pool`.
pub fn from_config(cfg: &Config, pool: &Pool) -> Arc<dyn ContentStore> {
    match cfg.app.backend {
        Backend::Remote => Arc::new(SupabaseStore::connect(cfg)),
        Backend::Local => Arc::new(LocalStore::in_data_dir(
            LocalCache::new(pool.clone(), cfg.feed.cache_key.clone()),
            &cfg.app.data_dir,
        )),
    }
}
