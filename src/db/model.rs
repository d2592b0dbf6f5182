//! Entries of the local news list.
//!
//! The list may hold rows written by the local backend (record shape, with a
//! serialized payload in `content`) next to older flat entries whose fields
//! were stored already split per locale, with `image` sometimes holding an
//! inline `data:` URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{parse_logical_date, DisplayNews, NewsId, NewsRecord};
use crate::payload::NewsPayload;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CachedNews {
    Record(NewsRecord),
    Legacy(LegacyNews),
}

impl CachedNews {
    pub fn id(&self) -> Option<&NewsId> {
        match self {
            CachedNews::Record(record) => Some(&record.id),
            CachedNews::Legacy(legacy) => legacy.id.as_ref(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            CachedNews::Record(record) => &record.title,
            CachedNews::Legacy(legacy) => &legacy.title,
        }
    }

    /// Record view of the entry; legacy entries without an id have none.
    pub fn to_record(&self) -> Option<NewsRecord> {
        match self {
            CachedNews::Record(record) => Some(record.clone()),
            CachedNews::Legacy(legacy) => legacy.to_record(),
        }
    }

    pub fn to_display(&self) -> DisplayNews {
        match self {
            CachedNews::Record(record) => DisplayNews::from_record(record),
            CachedNews::Legacy(legacy) => legacy.to_display(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LegacyNews {
    pub id: Option<NewsId>,
    pub title: String,
    pub title_ru: Option<String>,
    pub title_en: Option<String>,
    pub title_kz: Option<String>,
    pub description: String,
    pub description_ru: Option<String>,
    pub description_en: Option<String>,
    pub description_kz: Option<String>,
    pub content: String,
    pub image: Option<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    pub date: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: Option<String>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<String>,
}

fn pick(value: &Option<String>, neutral: &str) -> String {
    value
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or(neutral)
        .to_string()
}

fn parse_ts(raw: &Option<String>) -> Option<DateTime<Utc>> {
    raw.as_deref().and_then(parse_logical_date)
}

impl LegacyNews {
    /// Preferred image: explicit URL first, then the inline/legacy `image`.
    pub fn image_source(&self) -> Option<String> {
        self.image_url
            .clone()
            .filter(|u| !u.trim().is_empty())
            .or_else(|| self.image.clone().filter(|u| !u.trim().is_empty()))
    }

    pub fn has_inline_image(&self) -> bool {
        self.image_source()
            .map(|src| src.starts_with("data:"))
            .unwrap_or(false)
    }

    /// Payload equivalent of the flat fields, with localized fallbacks filled.
    pub fn payload(&self) -> NewsPayload {
        let display = self.to_display();
        NewsPayload {
            main: display.content,
            description: display.description,
            date: display.date,
            title_ru: display.title_ru,
            title_en: display.title_en,
            title_kz: display.title_kz,
            description_ru: display.description_ru,
            description_en: display.description_en,
            description_kz: display.description_kz,
            ..NewsPayload::default()
        }
    }

    pub fn to_record(&self) -> Option<NewsRecord> {
        let id = self.id.clone()?;
        let content = serde_json::to_string(&self.payload()).ok()?;
        Some(NewsRecord {
            id,
            title: self.title.clone(),
            image_url: self.image_source(),
            author: String::new(),
            content,
            created_at: parse_ts(&self.created_at).unwrap_or_default(),
            updated_at: parse_ts(&self.updated_at),
        })
    }

    pub fn to_display(&self) -> DisplayNews {
        let image = self.image_source();
        let date = self
            .date
            .clone()
            .filter(|d| !d.trim().is_empty())
            .or_else(|| self.created_at.clone())
            .unwrap_or_default();
        DisplayNews {
            id: self.id.clone().unwrap_or_else(|| NewsId::new("")),
            title: self.title.clone(),
            title_ru: pick(&self.title_ru, &self.title),
            title_en: pick(&self.title_en, &self.title),
            title_kz: pick(&self.title_kz, &self.title),
            description: self.description.clone(),
            description_ru: pick(&self.description_ru, &self.description),
            description_en: pick(&self.description_en, &self.description),
            description_kz: pick(&self.description_kz, &self.description),
            content: self.content.clone(),
            image: image.clone(),
            image_url: image,
            date,
            author: String::new(),
            created_at: parse_ts(&self.created_at),
            updated_at: parse_ts(&self.updated_at),
        }
    }
}
