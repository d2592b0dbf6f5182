//! Site locales and long-form date labels.
use chrono::{DateTime, Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    Ru,
    En,
    Kz,
}

impl Locale {
    pub const ALL: [Locale; 3] = [Locale::Ru, Locale::En, Locale::Kz];

    pub fn as_str(&self) -> &'static str {
        match self {
            Locale::Ru => "ru",
            Locale::En => "en",
            Locale::Kz => "kz",
        }
    }
}

const MONTHS_RU: [&str; 12] = [
    "января", "февраля", "марта", "апреля", "мая", "июня", "июля", "августа", "сентября",
    "октября", "ноября", "декабря",
];
const MONTHS_EN: [&str; 12] = [
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December",
];
const MONTHS_KZ: [&str; 12] = [
    "қаңтар", "ақпан", "наурыз", "сәуір", "мамыр", "маусым", "шілде", "тамыз", "қыркүйек",
    "қазан", "қараша", "желтоқсан",
];

pub fn format_date(date: NaiveDate, locale: Locale) -> String {
    let month = date.month0() as usize;
    match locale {
        Locale::Ru => format!("{} {} {} г.", date.day(), MONTHS_RU[month], date.year()),
        Locale::En => format!("{} {}, {}", MONTHS_EN[month], date.day(), date.year()),
        Locale::Kz => format!("{} ж. {} {}", date.year(), date.day(), MONTHS_KZ[month]),
    }
}

/// Format a stored date string (`YYYY-MM-DD` or RFC 3339). Anything else is
/// returned unchanged.
pub fn format_date_str(raw: &str, locale: Locale) -> String {
    let trimmed = raw.trim();
    let day = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(trimmed).ok().map(|ts| ts.date_naive()));
    match day {
        Some(day) => format_date(day, locale),
        None => raw.to_string(),
    }
}
