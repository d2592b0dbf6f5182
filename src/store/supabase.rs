use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, Request, RequestBuilder, Response, StatusCode, Url};
use serde_json::Value;
use std::fmt;
use tracing::{debug, info, instrument, warn};

use super::model::{RemoteErrorBody, UploadResp};
use super::{codes, ContentStore, DeleteOutcome, ReadyStore, StoreError};
use crate::config::Config;
use crate::media;
use crate::model::{NewRecord, NewsId, NewsRecord, RecordPatch};

const REST_PREFIX: &str = "rest/v1/";
const STORAGE_PREFIX: &str = "storage/v1/object/";

/// Remote backend: hosted table API for records, object storage for images.
#[derive(Clone)]
pub struct SupabaseStore {
    http: Client,
    base_url: Url,
    anon_key: String,
    table: String,
    bucket: String,
}

impl fmt::Debug for SupabaseStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseStore")
            .field("base_url", &self.base_url)
            .field("table", &self.table)
            .field("bucket", &self.bucket)
            .finish_non_exhaustive()
    }
}

impl SupabaseStore {
    pub fn new(
        base_url: Url,
        anon_key: String,
        table: String,
        bucket: String,
    ) -> Result<Self, StoreError> {
        let http = Client::builder()
            .user_agent("abu-news/0.1")
            .build()
            .map_err(|e| StoreError::new(codes::TRANSPORT, e.to_string()))?;
        // `Url::join` drops the last segment unless the base ends in '/'.
        let mut base_url = base_url;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self {
            http,
            base_url,
            anon_key,
            table,
            bucket,
        })
    }

    pub fn from_config(cfg: &Config) -> Result<Self, StoreError> {
        let base_url = Url::parse(&cfg.store.url)
            .map_err(|e| StoreError::invalid(format!("invalid store url: {}", e)))?;
        Self::new(
            base_url,
            cfg.store.anon_key.clone(),
            cfg.store.table.clone(),
            cfg.store.bucket.clone(),
        )
    }

    /// Lazily connect: the first operation waits until the table answers a
    /// ping, polling within the configured readiness window.
    pub fn connect(cfg: &Config) -> ReadyStore<Self> {
        let poll = cfg.ready_poll();
        let timeout = cfg.ready_timeout();
        let cfg = cfg.clone();
        ReadyStore::connect(
            move || {
                let cfg = cfg.clone();
                async move {
                    let store = SupabaseStore::from_config(&cfg)?;
                    store.ping().await?;
                    Ok(store)
                }
            },
            poll,
            timeout,
        )
    }

    /// Cheap readiness check against the news table.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("select", "id")
            .append_pair("limit", "1");
        let request = self.authed(self.http.get(url)).build()?;
        let res = self.http.execute(request).await?;
        if !res.status().is_success() {
            return Err(error_from_response(res).await);
        }
        Ok(())
    }

    fn join(&self, path: &str) -> Result<Url, StoreError> {
        self.base_url
            .join(path)
            .map_err(|e| StoreError::invalid(format!("invalid store path {}: {}", path, e)))
    }

    fn table_url(&self) -> Result<Url, StoreError> {
        self.join(&format!("{}{}", REST_PREFIX, self.table))
    }

    fn row_url(&self, id: &NewsId) -> Result<Url, StoreError> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{}", id));
        Ok(url)
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    pub fn build_insert_request(&self, record: &NewRecord) -> Result<Request, StoreError> {
        let url = self.table_url()?;
        Ok(self
            .authed(self.http.post(url))
            .header("Prefer", "return=representation")
            .json(&[record])
            .build()?)
    }

    pub fn build_list_request(&self) -> Result<Request, StoreError> {
        let mut url = self.table_url()?;
        url.query_pairs_mut()
            .append_pair("select", "*")
            .append_pair("order", "created_at.desc");
        Ok(self.authed(self.http.get(url)).build()?)
    }

    pub fn build_update_request(
        &self,
        id: &NewsId,
        patch: &RecordPatch,
    ) -> Result<Request, StoreError> {
        let url = self.row_url(id)?;
        Ok(self
            .authed(self.http.patch(url))
            .header("Prefer", "return=representation")
            .json(patch)
            .build()?)
    }

    pub fn build_delete_request(&self, id: &NewsId) -> Result<Request, StoreError> {
        let url = self.row_url(id)?;
        Ok(self
            .authed(self.http.delete(url))
            .header("Prefer", "return=representation")
            .build()?)
    }

    pub fn build_upload_request(
        &self,
        path: &str,
        bytes: &[u8],
        content_type: &str,
    ) -> Result<Request, StoreError> {
        let url = self.join(&format!("{}{}/{}", STORAGE_PREFIX, self.bucket, path))?;
        Ok(self
            .authed(self.http.post(url))
            .header("Content-Type", content_type)
            .header("cache-control", "max-age=3600")
            .header("x-upsert", "false")
            .body(bytes.to_vec())
            .build()?)
    }

    /// Public address of an object in the configured bucket.
    pub fn public_url(&self, path: &str) -> Result<String, StoreError> {
        Ok(self
            .join(&format!("{}public/{}/{}", STORAGE_PREFIX, self.bucket, path))?
            .to_string())
    }

    async fn execute_rows(&self, request: Request) -> Result<Vec<NewsRecord>, StoreError> {
        debug!(method = %request.method(), url = %request.url(), "sending store request");
        let res = self.http.execute(request).await?;
        if !res.status().is_success() {
            return Err(error_from_response(res).await);
        }
        let rows: Vec<NewsRecord> = res.json().await?;
        Ok(rows)
    }
}

async fn error_from_response(res: Response) -> StoreError {
    let status = res.status();
    let body = res.text().await.unwrap_or_default();
    warn!(%status, body = %body, "store request failed");
    remote_error(status, &body)
}

/// Map an error response onto a [`StoreError`], preferring the service's own
/// code and message over the HTTP status.
pub fn remote_error(status: StatusCode, body: &str) -> StoreError {
    let parsed: RemoteErrorBody = serde_json::from_str(body).unwrap_or_default();
    let status_code = parsed.status_code.and_then(|v| match v {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let code = parsed
        .code
        .or(status_code)
        .unwrap_or_else(|| status.as_u16().to_string());
    let mut message = parsed
        .message
        .or(parsed.error)
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                status.to_string()
            } else {
                body.to_string()
            }
        });
    if let Some(details) = parsed.details.filter(|d| !d.is_empty()) {
        message = format!("{} ({})", message, details);
    }
    if let Some(hint) = parsed.hint.filter(|h| !h.is_empty()) {
        message = format!("{}; hint: {}", message, hint);
    }
    StoreError::new(code, message)
}

#[async_trait]
impl ContentStore for SupabaseStore {
    #[instrument(skip_all)]
    async fn insert(&self, record: &NewRecord) -> Result<NewsRecord, StoreError> {
        let request = self.build_insert_request(record)?;
        let row = self
            .execute_rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::new(codes::DECODE, "insert returned no row"))?;
        info!(id = %row.id, title = %row.title, "news inserted");
        Ok(row)
    }

    #[instrument(skip_all)]
    async fn list_all(&self) -> Result<Vec<NewsRecord>, StoreError> {
        let request = self.build_list_request()?;
        let rows = self.execute_rows(request).await?;
        debug!(count = rows.len(), "news listed");
        Ok(rows)
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn update_by_id(
        &self,
        id: &NewsId,
        patch: &RecordPatch,
    ) -> Result<NewsRecord, StoreError> {
        let request = self.build_update_request(id, patch)?;
        let row = self
            .execute_rows(request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StoreError::not_found(id))?;
        info!("news updated");
        Ok(row)
    }

    #[instrument(skip_all, fields(id = %id))]
    async fn delete_by_id(&self, id: &NewsId) -> Result<DeleteOutcome, StoreError> {
        let request = self.build_delete_request(id)?;
        let rows = self.execute_rows(request).await?;
        if rows.is_empty() {
            warn!("delete matched no row");
            Ok(DeleteOutcome::Missing)
        } else {
            info!("news deleted");
            Ok(DeleteOutcome::Deleted)
        }
    }

    #[instrument(skip_all, fields(size = bytes.len()))]
    async fn upload_image(&self, bytes: &[u8], ext: &str) -> Result<String, StoreError> {
        let path = media::object_path(ext, Utc::now());
        let request = self.build_upload_request(&path, bytes, media::content_type(ext))?;
        let res = self.http.execute(request).await?;
        if !res.status().is_success() {
            return Err(error_from_response(res).await);
        }
        let uploaded: Option<UploadResp> = res.json().await.ok();
        debug!(key = ?uploaded.and_then(|u| u.key), "object stored");
        let url = self.public_url(&path)?;
        info!(%path, "image uploaded");
        Ok(url)
    }
}
