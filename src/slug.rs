use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::NewsId;

static DISALLOWED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\s-]").expect("valid slug filter regex"));
static SEPARATOR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s-]+").expect("valid slug separator regex"));

/// Lowercase, drop everything outside `[a-z0-9\s-]`, collapse whitespace and
/// hyphen runs into one hyphen, trim edge hyphens.
pub fn slugify(title: &str) -> String {
    let lower = title.to_lowercase();
    let kept = DISALLOWED_RE.replace_all(&lower, "");
    let joined = SEPARATOR_RE.replace_all(&kept, "-");
    joined.trim_matches('-').to_string()
}

/// Public detail page for a news entry: `news-detail-<slug>.html?id=<id>`.
pub fn detail_url(title: &str, id: &NewsId) -> String {
    format!("news-detail-{}.html?id={}", slugify(title), id)
}
