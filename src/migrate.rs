//! Copy the local news list into the remote store.
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use tracing::{info, instrument, warn};

use crate::db::{CachedNews, LocalCache};
use crate::model::NewRecord;
use crate::payload::PayloadError;
use crate::store::ContentStore;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub migrated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub total: usize,
}

/// Legacy entries are re-encoded as a validated payload. An entry with no
/// date of its own is dated `now`.
fn to_new_record(
    entry: &CachedNews,
    author: &str,
    now: DateTime<Utc>,
) -> Result<NewRecord, PayloadError> {
    match entry {
        CachedNews::Record(record) => Ok(NewRecord {
            title: record.title.clone(),
            image_url: record.image_url.clone(),
            author: if record.author.is_empty() {
                author.to_string()
            } else {
                record.author.clone()
            },
            content: record.content.clone(),
        }),
        CachedNews::Legacy(legacy) => {
            let mut payload = legacy.payload();
            if payload.date.trim().is_empty() {
                payload.date = now.to_rfc3339();
            }
            Ok(NewRecord {
                title: legacy.title.clone(),
                image_url: legacy.image_source(),
                author: author.to_string(),
                content: payload.encode()?,
            })
        }
    }
}

/// Insert every local entry whose title is not already in the store.
/// A failing entry is counted and the run continues; only failing to read
/// either side aborts.
#[instrument(skip_all)]
pub async fn migrate_local_to_remote<S: ContentStore>(
    local: &LocalCache,
    remote: &S,
    author: &str,
) -> anyhow::Result<MigrationReport> {
    let entries = local.load().await?;
    let mut report = MigrationReport {
        total: entries.len(),
        ..Default::default()
    };
    if entries.is_empty() {
        info!("no local news to migrate");
        return Ok(report);
    }

    let existing = remote.list_all().await?;
    let mut titles: HashSet<String> = existing.into_iter().map(|r| r.title).collect();
    let now = Utc::now();

    for entry in &entries {
        let title = entry.title().to_string();
        if titles.contains(&title) {
            info!(%title, "already in store; skipped");
            report.skipped += 1;
            continue;
        }
        if let CachedNews::Legacy(legacy) = entry {
            if legacy.has_inline_image() {
                warn!(%title, "inline image must be uploaded manually");
            }
        }
        let record = match to_new_record(entry, author, now) {
            Ok(record) => record,
            Err(err) => {
                warn!(%title, %err, "could not build record");
                report.failed += 1;
                continue;
            }
        };
        match remote.insert(&record).await {
            Ok(row) => {
                info!(id = %row.id, %title, "migrated");
                titles.insert(title);
                report.migrated += 1;
            }
            Err(err) => {
                warn!(%title, %err, "failed to migrate");
                report.failed += 1;
            }
        }
    }

    info!(
        migrated = report.migrated,
        skipped = report.skipped,
        failed = report.failed,
        total = report.total,
        "migration finished"
    );
    Ok(report)
}
