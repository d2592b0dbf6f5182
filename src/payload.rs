//! Multilingual news payload stored in the record's `content` column.
//!
//! The store treats the column as opaque text. Payloads carry a schema
//! version `v`; rows written before versioning have no `v` and read as
//! version 1. Every localized field is filled from its neutral counterpart
//! before encoding, so a stored payload never has an empty localized value
//! when a neutral one exists.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::model::NewsForm;

pub const PAYLOAD_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported payload version {0}")]
    UnsupportedVersion(u32),
    #[error("payload field `{0}` must be non-empty")]
    Missing(&'static str),
}

fn current_version() -> u32 {
    PAYLOAD_VERSION
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsPayload {
    #[serde(rename = "v", default = "current_version")]
    pub version: u32,
    #[serde(default)]
    pub main: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub title_ru: String,
    #[serde(default)]
    pub title_en: String,
    #[serde(default)]
    pub title_kz: String,
    #[serde(default)]
    pub description_ru: String,
    #[serde(default)]
    pub description_en: String,
    #[serde(default)]
    pub description_kz: String,
}

impl Default for NewsPayload {
    fn default() -> Self {
        Self {
            version: PAYLOAD_VERSION,
            main: String::new(),
            description: String::new(),
            date: String::new(),
            title_ru: String::new(),
            title_en: String::new(),
            title_kz: String::new(),
            description_ru: String::new(),
            description_en: String::new(),
            description_kz: String::new(),
        }
    }
}

fn or_neutral(value: &str, neutral: &str) -> String {
    if value.trim().is_empty() {
        neutral.to_string()
    } else {
        value.to_string()
    }
}

impl NewsPayload {
    /// Build the payload for a submitted form, filling localized fallbacks.
    pub fn from_form(form: &NewsForm) -> Self {
        let mut payload = Self {
            version: PAYLOAD_VERSION,
            main: form.content.clone(),
            description: form.description.clone(),
            date: form.date.trim().to_string(),
            title_ru: form.title_ru.clone(),
            title_en: form.title_en.clone(),
            title_kz: form.title_kz.clone(),
            description_ru: form.description_ru.clone(),
            description_en: form.description_en.clone(),
            description_kz: form.description_kz.clone(),
        };
        payload.fill_fallbacks(form.title.trim());
        payload
    }

    /// Replace blank localized titles with `title` and blank localized
    /// descriptions with the neutral description.
    pub fn fill_fallbacks(&mut self, title: &str) {
        self.title_ru = or_neutral(&self.title_ru, title);
        self.title_en = or_neutral(&self.title_en, title);
        self.title_kz = or_neutral(&self.title_kz, title);
        self.description_ru = or_neutral(&self.description_ru, &self.description);
        self.description_en = or_neutral(&self.description_en, &self.description);
        self.description_kz = or_neutral(&self.description_kz, &self.description);
    }

    /// Write-side validation.
    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.version > PAYLOAD_VERSION {
            return Err(PayloadError::UnsupportedVersion(self.version));
        }
        let required = [
            ("main", &self.main),
            ("description", &self.description),
            ("date", &self.date),
            ("title_ru", &self.title_ru),
            ("title_en", &self.title_en),
            ("title_kz", &self.title_kz),
            ("description_ru", &self.description_ru),
            ("description_en", &self.description_en),
            ("description_kz", &self.description_kz),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(PayloadError::Missing(name));
            }
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<String, PayloadError> {
        self.validate()?;
        Ok(serde_json::to_string(self)?)
    }

    /// Read-side decoding. Only the schema version is checked; missing fields
    /// decode as empty and are filled by [`NewsPayload::fill_fallbacks`].
    pub fn decode(raw: &str) -> Result<Self, PayloadError> {
        let payload: NewsPayload = serde_json::from_str(raw)?;
        if payload.version > PAYLOAD_VERSION {
            return Err(PayloadError::UnsupportedVersion(payload.version));
        }
        Ok(payload)
    }

    /// Decode for display. A malformed column becomes a neutral payload whose
    /// body is the raw text, so one bad row never breaks a whole list.
    pub fn decode_or_neutral(raw: &str, title: &str) -> Self {
        let mut payload = match Self::decode(raw) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(%err, title, "unreadable news payload; showing raw content");
                Self {
                    main: raw.to_string(),
                    ..Self::default()
                }
            }
        };
        payload.fill_fallbacks(title);
        payload
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_day() -> NewsForm {
        NewsForm {
            title: "Open Day".into(),
            date: "2025-05-01".into(),
            description: "Come visit".into(),
            content: "Details...".into(),
            image_url: "http://x/a.jpg".into(),
            ..Default::default()
        }
    }

    #[test]
    fn absent_localized_fields_fall_back_to_neutral() {
        let payload = NewsPayload::from_form(&open_day());
        let back = NewsPayload::decode(&payload.encode().unwrap()).unwrap();
        assert_eq!(back.title_ru, "Open Day");
        assert_eq!(back.title_en, "Open Day");
        assert_eq!(back.title_kz, "Open Day");
        assert_eq!(back.description_ru, "Come visit");
        assert_eq!(back.description_en, "Come visit");
        assert_eq!(back.description_kz, "Come visit");
        assert_eq!(back, payload);
    }

    #[test]
    fn supplied_localized_fields_survive_round_trip() {
        let mut form = open_day();
        form.title_ru = "День открытых дверей".into();
        form.description_kz = "Келіңіздер".into();
        let back = NewsPayload::decode(&NewsPayload::from_form(&form).encode().unwrap()).unwrap();
        assert_eq!(back.title_ru, "День открытых дверей");
        assert_eq!(back.title_en, "Open Day");
        assert_eq!(back.description_kz, "Келіңіздер");
        assert_eq!(back.description_ru, "Come visit");
    }

    #[test]
    fn encoded_payload_is_versioned() {
        let raw = NewsPayload::from_form(&open_day()).encode().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["v"], 1);
        assert_eq!(value["main"], "Details...");
        assert_eq!(value["date"], "2025-05-01");
    }

    #[test]
    fn encode_rejects_missing_body() {
        let mut form = open_day();
        form.content = "  ".into();
        let err = NewsPayload::from_form(&form).encode().unwrap_err();
        assert!(matches!(err, PayloadError::Missing("main")));
    }

    #[test]
    fn unversioned_rows_read_as_v1() {
        let p = NewsPayload::decode(r#"{"main":"m","description":"d"}"#).unwrap();
        assert_eq!(p.version, 1);
        assert_eq!(p.title_en, "");
    }

    #[test]
    fn future_versions_are_rejected() {
        let err = NewsPayload::decode(r#"{"v":9,"main":"m"}"#).unwrap_err();
        assert!(matches!(err, PayloadError::UnsupportedVersion(9)));
    }

    #[test]
    fn malformed_content_recovers_to_neutral() {
        let p = NewsPayload::decode_or_neutral("plain old text", "Title");
        assert_eq!(p.main, "plain old text");
        assert_eq!(p.description, "");
        assert_eq!(p.title_kz, "Title");
    }

    #[test]
    fn fallback_titles_are_trimmed() {
        let form = NewsForm {
            title: "  Open Day ".into(),
            ..open_day()
        };
        let payload = NewsPayload::from_form(&form);
        assert_eq!(payload.title_ru, "Open Day");
        assert_eq!(payload.title_en, "Open Day");
        assert_eq!(payload.title_kz, "Open Day");
    }
}
