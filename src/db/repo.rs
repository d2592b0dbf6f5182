use super::model::CachedNews;
use anyhow::{Context, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{instrument, warn};

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized)
        .await
        .with_context(|| format!("failed to open {}", normalized))?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/`, ask SQLite to
/// create the file, and ensure the parent directory exists. Leaves in-memory
/// URLs untouched. Returns possibly-updated URL.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") {
        return url.to_string();
    }

    // In-memory URLs like sqlite::memory: or sqlite::memory:?cache=shared
    if url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);

    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };

    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match path_part.strip_prefix("~/") {
        Some(rest) => match std::env::var("HOME") {
            Ok(home) => format!("{}/{}", home.trim_end_matches('/'), rest),
            Err(_) => path_part.to_string(),
        },
        None => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }

    let mut rebuilt = String::from("sqlite://");
    rebuilt.push_str(&expanded_path);
    match query_part {
        Some(q) if q.contains("mode=") => {
            rebuilt.push('?');
            rebuilt.push_str(q);
        }
        Some(q) => {
            rebuilt.push('?');
            rebuilt.push_str(q);
            rebuilt.push_str("&mode=rwc");
        }
        None => rebuilt.push_str("?mode=rwc"),
    }
    rebuilt
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all, fields(key = %key))]
pub async fn get_value(pool: &Pool, key: &str) -> Result<Option<String>> {
    let value = sqlx::query_scalar::<_, String>("SELECT value FROM local_storage WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

#[instrument(skip_all, fields(key = %key))]
pub async fn put_value(pool: &Pool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO local_storage (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

#[instrument(skip_all, fields(key = %key))]
pub async fn remove_value(pool: &Pool, key: &str) -> Result<()> {
    sqlx::query("DELETE FROM local_storage WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;
    Ok(())
}

/// The JSON news list kept under one key of the local key/value table.
#[derive(Debug, Clone)]
pub struct LocalCache {
    pool: Pool,
    key: String,
}

impl LocalCache {
    pub fn new(pool: Pool, key: impl Into<String>) -> Self {
        Self {
            pool,
            key: key.into(),
        }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Raw JSON entries in stored order, readable or not. A missing key is an
    /// empty list.
    pub async fn load_values(&self) -> Result<Vec<serde_json::Value>> {
        let Some(raw) = get_value(&self.pool, &self.key).await? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw)
            .with_context(|| format!("local news list under '{}' is not a JSON array", self.key))
    }

    /// Load every entry. Entries that match neither known shape are skipped
    /// with a warning; they stay in storage untouched.
    pub async fn load(&self) -> Result<Vec<CachedNews>> {
        let values = self.load_values().await?;
        let mut out = Vec::with_capacity(values.len());
        for (index, value) in values.iter().enumerate() {
            match CachedNews::deserialize(value) {
                Ok(entry) => out.push(entry),
                Err(err) => warn!(index, %err, "skipping unreadable local news entry"),
            }
        }
        Ok(out)
    }

    pub async fn save(&self, entries: &[CachedNews]) -> Result<()> {
        let raw = serde_json::to_string(entries)?;
        put_value(&self.pool, &self.key, &raw).await
    }

    pub async fn save_values(&self, values: &[serde_json::Value]) -> Result<()> {
        let raw = serde_json::to_string(values)?;
        put_value(&self.pool, &self.key, &raw).await
    }

    pub async fn clear(&self) -> Result<()> {
        remove_value(&self.pool, &self.key).await
    }
}
