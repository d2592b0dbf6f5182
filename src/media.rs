//! Object naming and content types for uploaded news images.
use chrono::{DateTime, Utc};
use std::path::Path;
use uuid::Uuid;

/// Folder inside the bucket that holds news images.
pub const OBJECT_PREFIX: &str = "news";

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Lowercase base-36 rendering of `n`.
pub fn base36(mut n: u128) -> String {
    if n == 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Random lowercase base-36 token of at most `len` characters.
pub fn random_token(len: usize) -> String {
    let mut token = base36(Uuid::new_v4().as_u128());
    token.truncate(len);
    token
}

/// `news/<epoch_ms>_<random_base36>.<ext>`
pub fn object_path(ext: &str, now: DateTime<Utc>) -> String {
    object_path_with(ext, now, &random_token(11))
}

pub(crate) fn object_path_with(ext: &str, now: DateTime<Utc>, token: &str) -> String {
    format!(
        "{}/{}_{}.{}",
        OBJECT_PREFIX,
        now.timestamp_millis(),
        token,
        ext
    )
}

/// Extension after the last dot, lowercased; `bin` when there is none.
pub fn extension_of(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

pub fn content_type(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg" => "image/svg+xml",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}
