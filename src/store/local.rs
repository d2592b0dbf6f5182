//! On-device backend: the whole news list lives under one key of the local
//! key/value table and images are written below a media directory.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};

use super::{ContentStore, DeleteOutcome, StoreError};
use crate::db::{CachedNews, LocalCache};
use crate::media;
use crate::model::{NewRecord, NewsId, NewsRecord, RecordPatch};

#[derive(Debug)]
pub struct LocalStore {
    cache: LocalCache,
    media_dir: PathBuf,
    // Serializes read-modify-write cycles on the single list value.
    write: Mutex<()>,
}

impl LocalStore {
    pub fn new(cache: LocalCache, media_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache,
            media_dir: media_dir.into(),
            write: Mutex::new(()),
        }
    }

    /// Images go to `<data_dir>/media/<object path>`.
    pub fn in_data_dir(cache: LocalCache, data_dir: impl AsRef<Path>) -> Self {
        Self::new(cache, data_dir.as_ref().join("media"))
    }

    pub fn cache(&self) -> &LocalCache {
        &self.cache
    }

    // Writes go through raw values so entries this build cannot read are
    // written back as they were.
    async fn load(&self) -> Result<Vec<Value>, StoreError> {
        self.cache.load_values().await.map_err(local_error)
    }

    async fn save(&self, entries: &[Value]) -> Result<(), StoreError> {
        self.cache.save_values(entries).await.map_err(local_error)
    }

    fn file_url(&self, path: &Path) -> Result<String, StoreError> {
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };
        Url::from_file_path(&absolute)
            .map(|u| u.to_string())
            .map_err(|_| StoreError::invalid(format!("not a file path: {}", absolute.display())))
    }
}

fn local_error(err: anyhow::Error) -> StoreError {
    StoreError::new(super::codes::LOCAL, format!("{:#}", err))
}

fn local_id() -> NewsId {
    NewsId::new(format!(
        "news_{}_{}",
        Utc::now().timestamp_millis(),
        media::random_token(9)
    ))
}

fn entry(value: &Value) -> Option<CachedNews> {
    CachedNews::deserialize(value).ok()
}

fn position(entries: &[Value], id: &NewsId) -> Option<(usize, CachedNews)> {
    entries.iter().enumerate().find_map(|(index, value)| {
        entry(value)
            .filter(|e| e.id() == Some(id))
            .map(|e| (index, e))
    })
}

#[async_trait]
impl ContentStore for LocalStore {
    #[instrument(skip_all)]
    async fn insert(&self, record: &NewRecord) -> Result<NewsRecord, StoreError> {
        if record.title.trim().is_empty() {
            return Err(StoreError::invalid("missing required column: title"));
        }
        if record.content.trim().is_empty() {
            return Err(StoreError::invalid("missing required column: content"));
        }
        let _guard = self.write.lock().await;
        let mut entries = self.load().await?;
        let now = Utc::now();
        let row = NewsRecord {
            id: local_id(),
            title: record.title.clone(),
            image_url: record.image_url.clone(),
            author: record.author.clone(),
            content: record.content.clone(),
            created_at: now,
            updated_at: Some(now),
        };
        entries.insert(0, serde_json::to_value(CachedNews::Record(row.clone()))?);
        self.save(&entries).await?;
        info!(id = %row.id, "news stored locally");
        Ok(row)
    }

    #[instrument(skip_all)]
    async fn list_all(&self) -> Result<Vec<NewsRecord>, StoreError> {
        let entries = self.load().await?;
        let mut rows: Vec<NewsRecord> = entries
            .iter()
            .filter_map(entry)
            .filter_map(|e| e.to_record())
            .collect();
        if rows.len() < entries.len() {
            warn!(
                skipped = entries.len() - rows.len(),
                "unreadable local entries or entries without id are not listed"
            );
        }
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn update_by_id(
        &self,
        id: &NewsId,
        patch: &RecordPatch,
    ) -> Result<NewsRecord, StoreError> {
        let _guard = self.write.lock().await;
        let mut entries = self.load().await?;
        let (index, found) = position(&entries, id).ok_or_else(|| StoreError::not_found(id))?;
        let mut row = found.to_record().ok_or_else(|| StoreError::not_found(id))?;
        patch.apply(&mut row);
        row.updated_at = Some(Utc::now());
        entries[index] = serde_json::to_value(CachedNews::Record(row.clone()))?;
        self.save(&entries).await?;
        info!("news updated locally");
        Ok(row)
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn delete_by_id(&self, id: &NewsId) -> Result<DeleteOutcome, StoreError> {
        let _guard = self.write.lock().await;
        let mut entries = self.load().await?;
        let Some((index, _)) = position(&entries, id) else {
            return Ok(DeleteOutcome::Missing);
        };
        entries.remove(index);
        self.save(&entries).await?;
        info!("news deleted locally");
        Ok(DeleteOutcome::Deleted)
    }

    #[instrument(skip_all, fields(size = bytes.len()))]
    async fn upload_image(&self, bytes: &[u8], ext: &str) -> Result<String, StoreError> {
        let object = media::object_path(ext, Utc::now());
        let path = self.media_dir.join(&object);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        // create_new: an existing object is a conflict, never overwritten.
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        info!(path = %path.display(), "image stored locally");
        self.file_url(&path)
    }
}
