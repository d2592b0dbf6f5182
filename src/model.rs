use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use crate::locale::{self, Locale};
use crate::media;
use crate::payload::NewsPayload;
use crate::slug;

/// Image shown when a news entry carries none.
pub const PLACEHOLDER_IMAGE: &str = "img/news_first_card.jpg";

/// Form field names shared with the admin markup. Renaming any of these
/// breaks the editing UI.
pub mod fields {
    pub const TITLE: &str = "title";
    pub const DATE: &str = "date";
    pub const DESCRIPTION: &str = "description";
    pub const CONTENT: &str = "content";
    pub const IMAGE: &str = "image";
    pub const IMAGE_URL: &str = "imageUrl";
    pub const TITLE_RU: &str = "title_ru";
    pub const TITLE_EN: &str = "title_en";
    pub const TITLE_KZ: &str = "title_kz";
    pub const DESCRIPTION_RU: &str = "description_ru";
    pub const DESCRIPTION_EN: &str = "description_en";
    pub const DESCRIPTION_KZ: &str = "description_kz";
}

/// Store-assigned identifier. Remote rows may carry numeric or string ids;
/// both are kept as their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NewsId(String);

impl NewsId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NewsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NewsId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NewsId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl<'de> Deserialize<'de> for NewsId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Int(i64),
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Text(s) => NewsId(s),
            Raw::Int(n) => NewsId(n.to_string()),
        })
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// A row of the `news` table as the store returns it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewsRecord {
    pub id: NewsId,
    pub title: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub author: String,
    /// Serialized [`NewsPayload`].
    #[serde(default, deserialize_with = "null_as_empty")]
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Columns supplied on insert; id and timestamps come from the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NewRecord {
    pub title: String,
    pub image_url: Option<String>,
    pub author: String,
    pub content: String,
}

/// Partial update. `None` fields are left untouched by the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl RecordPatch {
    pub fn apply(&self, record: &mut NewsRecord) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(url) = &self.image_url {
            record.image_url = Some(url.clone());
        }
        if let Some(content) = &self.content {
            record.content = content.clone();
        }
    }
}

/// Raw bytes picked from the image file input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFile {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl ImageFile {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn extension(&self) -> String {
        media::extension_of(&self.file_name)
    }

    pub fn content_type(&self) -> &'static str {
        media::content_type(&self.extension())
    }
}

/// Snapshot of the editing form. Text fields hold exactly what the inputs
/// contain; blank means "not supplied".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NewsForm {
    pub title: String,
    pub date: String,
    pub description: String,
    pub content: String,
    #[serde(skip)]
    pub image: Option<ImageFile>,
    #[serde(rename = "imageUrl")]
    pub image_url: String,
    pub title_ru: String,
    pub title_en: String,
    pub title_kz: String,
    pub description_ru: String,
    pub description_en: String,
    pub description_kz: String,
}

impl NewsForm {
    /// Build a form from `(field name, value)` pairs as submitted by the markup.
    /// Unknown names are ignored; the file input is attached separately.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut form = NewsForm::default();
        for (name, value) in pairs {
            let value = value.into();
            match name.as_ref() {
                fields::TITLE => form.title = value,
                fields::DATE => form.date = value,
                fields::DESCRIPTION => form.description = value,
                fields::CONTENT => form.content = value,
                fields::IMAGE_URL => form.image_url = value,
                fields::TITLE_RU => form.title_ru = value,
                fields::TITLE_EN => form.title_en = value,
                fields::TITLE_KZ => form.title_kz = value,
                fields::DESCRIPTION_RU => form.description_ru = value,
                fields::DESCRIPTION_EN => form.description_en = value,
                fields::DESCRIPTION_KZ => form.description_kz = value,
                _ => {}
            }
        }
        form
    }

    pub fn with_image(mut self, image: ImageFile) -> Self {
        self.image = Some(image);
        self
    }

    /// The picked file, if it has any bytes.
    pub fn image_file(&self) -> Option<&ImageFile> {
        self.image.as_ref().filter(|f| !f.is_empty())
    }

    /// The typed image URL, if non-blank.
    pub fn image_url(&self) -> Option<&str> {
        let url = self.image_url.trim();
        (!url.is_empty()).then_some(url)
    }

    pub fn has_image_source(&self) -> bool {
        self.image_file().is_some() || self.image_url().is_some()
    }
}

/// One value per site locale.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Localized {
    pub ru: String,
    pub en: String,
    pub kz: String,
}

impl Localized {
    pub fn get(&self, locale: Locale) -> &str {
        match locale {
            Locale::Ru => &self.ru,
            Locale::En => &self.en,
            Locale::Kz => &self.kz,
        }
    }

    pub fn from_fn(mut f: impl FnMut(Locale) -> String) -> Self {
        Self {
            ru: f(Locale::Ru),
            en: f(Locale::En),
            kz: f(Locale::Kz),
        }
    }
}

/// Flattened, render-ready projection of a record and its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayNews {
    pub id: NewsId,
    pub title: String,
    pub title_ru: String,
    pub title_en: String,
    pub title_kz: String,
    pub description: String,
    pub description_ru: String,
    pub description_en: String,
    pub description_kz: String,
    pub content: String,
    pub image: Option<String>,
    #[serde(rename = "imageUrl")]
    pub image_url: Option<String>,
    pub date: String,
    #[serde(default)]
    pub author: String,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DisplayNews {
    pub fn from_record(record: &NewsRecord) -> Self {
        let payload = NewsPayload::decode_or_neutral(&record.content, &record.title);
        let date = if payload.date.trim().is_empty() {
            record.created_at.to_rfc3339()
        } else {
            payload.date.clone()
        };
        let image = record.image_url.clone().filter(|u| !u.trim().is_empty());
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            title_ru: payload.title_ru,
            title_en: payload.title_en,
            title_kz: payload.title_kz,
            description: payload.description,
            description_ru: payload.description_ru,
            description_en: payload.description_en,
            description_kz: payload.description_kz,
            content: payload.main,
            image_url: image.clone(),
            image,
            date,
            author: record.author.clone(),
            created_at: Some(record.created_at),
            updated_at: record.updated_at,
        }
    }

    pub fn titles(&self) -> Localized {
        Localized {
            ru: self.title_ru.clone(),
            en: self.title_en.clone(),
            kz: self.title_kz.clone(),
        }
    }

    pub fn descriptions(&self) -> Localized {
        Localized {
            ru: self.description_ru.clone(),
            en: self.description_en.clone(),
            kz: self.description_kz.clone(),
        }
    }

    pub fn image_or_placeholder(&self) -> &str {
        self.image
            .as_deref()
            .or(self.image_url.as_deref())
            .unwrap_or(PLACEHOLDER_IMAGE)
    }

    /// Logical publication instant used for feed ordering.
    pub fn sort_key(&self) -> Option<DateTime<Utc>> {
        parse_logical_date(&self.date).or(self.created_at)
    }
}

/// Parse an RFC 3339 timestamp or a plain `YYYY-MM-DD` date.
pub fn parse_logical_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    let day = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?))
}

/// Card shown in the public feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewsCard {
    pub id: NewsId,
    pub title: Localized,
    pub date: Localized,
    pub description: Localized,
    pub image: String,
    pub detail_url: String,
}

impl NewsCard {
    pub fn from_display(news: &DisplayNews) -> Self {
        Self {
            id: news.id.clone(),
            title: news.titles(),
            date: Localized::from_fn(|l| locale::format_date_str(&news.date, l)),
            description: news.descriptions(),
            image: news.image_or_placeholder().to_string(),
            detail_url: slug::detail_url(&news.title, &news.id),
        }
    }
}

/// Where a preview takes its image from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// Bytes read straight from the file input; never uploaded.
    Inline {
        content_type: &'static str,
        bytes: Vec<u8>,
    },
    Url(String),
    Placeholder,
}

impl ImageSource {
    /// Address usable as an image `src`, when the source has one.
    pub fn src(&self) -> Option<&str> {
        match self {
            ImageSource::Inline { .. } => None,
            ImageSource::Url(url) => Some(url),
            ImageSource::Placeholder => Some(PLACEHOLDER_IMAGE),
        }
    }
}

/// View model for the admin preview pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewView {
    pub title: Localized,
    pub description: Localized,
    pub content: String,
    pub date: String,
    pub date_label: Localized,
    pub image: ImageSource,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn news_id_accepts_numbers_and_strings() {
        let a: NewsId = serde_json::from_value(json!(42)).unwrap();
        let b: NewsId = serde_json::from_value(json!("news_1_abc")).unwrap();
        assert_eq!(a.as_str(), "42");
        assert_eq!(b.as_str(), "news_1_abc");
        assert_eq!(serde_json::to_value(&a).unwrap(), json!("42"));
    }

    #[test]
    fn record_tolerates_null_columns() {
        let rec: NewsRecord = serde_json::from_value(json!({
            "id": 7,
            "title": "T",
            "image_url": null,
            "author": null,
            "content": null,
            "created_at": "2025-05-01T10:00:00.123456+00:00",
            "updated_at": null
        }))
        .unwrap();
        assert_eq!(rec.author, "");
        assert_eq!(rec.content, "");
        assert!(rec.image_url.is_none());
    }

    #[test]
    fn form_from_pairs_uses_markup_names() {
        let form = NewsForm::from_pairs([
            ("title", "Open Day"),
            ("imageUrl", "http://x/a.jpg"),
            ("title_kz", "Ашық есік күні"),
            ("unrelated", "ignored"),
        ]);
        assert_eq!(form.title, "Open Day");
        assert_eq!(form.image_url(), Some("http://x/a.jpg"));
        assert_eq!(form.title_kz, "Ашық есік күні");
        assert!(form.has_image_source());
    }

    #[test]
    fn empty_file_is_not_an_image_source() {
        let form = NewsForm::default().with_image(ImageFile::new("a.png", vec![]));
        assert!(!form.has_image_source());
    }

    #[test]
    fn patch_leaves_absent_fields() {
        let mut rec = NewsRecord {
            id: "1".into(),
            title: "old".into(),
            image_url: Some("http://x/old.jpg".into()),
            author: "Admin".into(),
            content: "{}".into(),
            created_at: Utc::now(),
            updated_at: None,
        };
        RecordPatch {
            title: Some("new".into()),
            ..Default::default()
        }
        .apply(&mut rec);
        assert_eq!(rec.title, "new");
        assert_eq!(rec.image_url.as_deref(), Some("http://x/old.jpg"));
    }

    #[test]
    fn display_defaults_date_to_created_at() {
        let created = Utc.with_ymd_and_hms(2024, 3, 2, 8, 0, 0).unwrap();
        let rec = NewsRecord {
            id: "1".into(),
            title: "Hello".into(),
            image_url: Some("http://x/a.jpg".into()),
            author: "Admin".into(),
            content: r#"{"main":"body","description":"d"}"#.into(),
            created_at: created,
            updated_at: None,
        };
        let news = DisplayNews::from_record(&rec);
        assert_eq!(news.sort_key(), Some(created));
        assert_eq!(news.image, news.image_url);
        assert_eq!(news.title_en, "Hello");
        assert_eq!(news.description_kz, "d");
        assert_eq!(news.content, "body");
    }

    #[test]
    fn logical_date_parses_plain_days() {
        let d = parse_logical_date("2025-05-01").unwrap();
        assert_eq!(d, Utc.with_ymd_and_hms(2025, 5, 1, 0, 0, 0).unwrap());
        assert!(parse_logical_date("soon").is_none());
    }
}
