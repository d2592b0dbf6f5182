#![allow(dead_code)]

use abu_news::model::{NewRecord, NewsId, NewsRecord, RecordPatch};
use abu_news::payload::NewsPayload;
use abu_news::store::{ContentStore, DeleteOutcome, StoreError};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;

pub async fn setup_pool() -> sqlx::SqlitePool {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Insert(NewRecord),
    List,
    Update(NewsId, RecordPatch),
    Delete(NewsId),
    Upload { size: usize, ext: String },
}

/// In-memory table that records every call. Scripted outcomes are consumed
/// one per call; a queued error is returned before the table is touched.
#[derive(Clone, Default)]
pub struct RecordingStore {
    rows: Arc<Mutex<Vec<NewsRecord>>>,
    script: Arc<Mutex<VecDeque<Option<StoreError>>>>,
    calls: Arc<Mutex<Vec<Call>>>,
    next_id: Arc<Mutex<u64>>,
}

impl RecordingStore {
    pub fn with_rows(rows: Vec<NewsRecord>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows)),
            next_id: Arc::new(Mutex::new(100)),
            ..Default::default()
        }
    }

    pub async fn fail_next(&self, err: StoreError) {
        self.script.lock().await.push_back(Some(err));
    }

    pub async fn pass_next(&self) {
        self.script.lock().await.push_back(None);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    pub async fn rows(&self) -> Vec<NewsRecord> {
        self.rows.lock().await.clone()
    }

    async fn record(&self, call: Call) -> Result<(), StoreError> {
        self.calls.lock().await.push(call);
        match self.script.lock().await.pop_front() {
            Some(Some(err)) => Err(err),
            _ => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl ContentStore for RecordingStore {
    async fn insert(&self, record: &NewRecord) -> Result<NewsRecord, StoreError> {
        self.record(Call::Insert(record.clone())).await?;
        let mut next = self.next_id.lock().await;
        *next += 1;
        let row = NewsRecord {
            id: NewsId::new(next.to_string()),
            title: record.title.clone(),
            image_url: record.image_url.clone(),
            author: record.author.clone(),
            content: record.content.clone(),
            created_at: Utc::now(),
            updated_at: None,
        };
        self.rows.lock().await.insert(0, row.clone());
        Ok(row)
    }

    async fn list_all(&self) -> Result<Vec<NewsRecord>, StoreError> {
        self.record(Call::List).await?;
        let mut rows = self.rows.lock().await.clone();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }

    async fn update_by_id(
        &self,
        id: &NewsId,
        patch: &RecordPatch,
    ) -> Result<NewsRecord, StoreError> {
        self.record(Call::Update(id.clone(), patch.clone())).await?;
        let mut rows = self.rows.lock().await;
        let row = rows
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| StoreError::not_found(id))?;
        patch.apply(row);
        row.updated_at = Some(Utc::now());
        Ok(row.clone())
    }

    async fn delete_by_id(&self, id: &NewsId) -> Result<DeleteOutcome, StoreError> {
        self.record(Call::Delete(id.clone())).await?;
        let mut rows = self.rows.lock().await;
        let before = rows.len();
        rows.retain(|r| &r.id != id);
        Ok(if rows.len() < before {
            DeleteOutcome::Deleted
        } else {
            DeleteOutcome::Missing
        })
    }

    async fn upload_image(&self, bytes: &[u8], ext: &str) -> Result<String, StoreError> {
        self.record(Call::Upload {
            size: bytes.len(),
            ext: ext.to_string(),
        })
        .await?;
        Ok(format!("https://cdn.test/news/upload-{}.{}", bytes.len(), ext))
    }
}

pub fn at(day: &str) -> DateTime<Utc> {
    let date = chrono::NaiveDate::parse_from_str(day, "%Y-%m-%d").unwrap();
    Utc.from_utc_datetime(&date.and_hms_opt(9, 0, 0).unwrap())
}

/// A stored row whose payload carries `date` and the neutral texts.
pub fn record(id: &str, title: &str, date: &str, image_url: Option<&str>) -> NewsRecord {
    let mut payload = NewsPayload {
        main: format!("{} body", title),
        description: format!("{} summary", title),
        date: date.to_string(),
        ..NewsPayload::default()
    };
    payload.fill_fallbacks(title);
    NewsRecord {
        id: NewsId::new(id),
        title: title.to_string(),
        image_url: image_url.map(str::to_string),
        author: "Admin".into(),
        content: payload.encode().unwrap(),
        created_at: at(date),
        updated_at: None,
    }
}
