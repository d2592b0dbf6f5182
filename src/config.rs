//! Configuration loader and validator for the news admin and feed tools.
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const ENV_STORE_URL: &str = "NEXT_PUBLIC_SUPABASE_URL";
pub const ENV_STORE_KEY: &str = "NEXT_PUBLIC_SUPABASE_ANON_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema exactly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    pub store: Store,
    pub feed: Feed,
}

/// Which persistence backend the admin tools write to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Remote,
    Local,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    #[serde(default)]
    pub backend: Backend,
    #[serde(default = "default_author")]
    pub author: String,
}

/// Remote content store and object store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Store {
    pub url: String,
    pub anon_key: String,
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_ready_poll_ms")]
    pub ready_poll_ms: u64,
    #[serde(default = "default_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
}

/// Public feed settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feed {
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default = "default_cache_key")]
    pub cache_key: String,
}

fn default_author() -> String {
    "Admin".into()
}

fn default_table() -> String {
    "news".into()
}

fn default_bucket() -> String {
    "news-images".into()
}

fn default_ready_poll_ms() -> u64 {
    100
}

fn default_ready_timeout_ms() -> u64 {
    3000
}

fn default_refresh_interval_secs() -> u64 {
    30
}

fn default_limit() -> usize {
    6
}

fn default_cache_key() -> String {
    "abu_news".into()
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(&self.app.data_dir)
    }

    /// SQLite URL for the local key/value table; `DATABASE_URL` wins when set.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .unwrap_or_else(|_| format!("sqlite://{}/news.db", self.app.data_dir))
    }

    pub fn ready_poll(&self) -> Duration {
        Duration::from_millis(self.store.ready_poll_ms)
    }

    pub fn ready_timeout(&self) -> Duration {
        Duration::from_millis(self.store.ready_timeout_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.feed.refresh_interval_secs)
    }

    /// Replace store credentials with the public environment overrides, if set.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            std::env::var(ENV_STORE_URL).ok(),
            std::env::var(ENV_STORE_KEY).ok(),
        );
    }

    fn apply_overrides(&mut self, url: Option<String>, key: Option<String>) {
        if let Some(url) = url.filter(|v| !v.trim().is_empty()) {
            self.store.url = url;
        }
        if let Some(key) = key.filter(|v| !v.trim().is_empty()) {
            self.store.anon_key = key;
        }
    }
}

/// Load configuration from a YAML file, apply env overrides and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let mut cfg: Config = serde_yaml::from_str(&content)?;
    cfg.apply_env();
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }
    if cfg.app.author.trim().is_empty() {
        return Err(ConfigError::Invalid("app.author must be non-empty"));
    }

    if cfg.store.url.trim().is_empty() {
        return Err(ConfigError::Invalid("store.url must be non-empty"));
    }
    if Url::parse(&cfg.store.url).is_err() {
        return Err(ConfigError::Invalid("store.url must be an absolute URL"));
    }
    if cfg.store.anon_key.trim().is_empty() {
        return Err(ConfigError::Invalid("store.anon_key must be non-empty"));
    }
    if cfg.store.table.trim().is_empty() {
        return Err(ConfigError::Invalid("store.table must be non-empty"));
    }
    if cfg.store.bucket.trim().is_empty() {
        return Err(ConfigError::Invalid("store.bucket must be non-empty"));
    }
    if cfg.store.ready_poll_ms == 0 {
        return Err(ConfigError::Invalid("store.ready_poll_ms must be > 0"));
    }
    if cfg.store.ready_timeout_ms < cfg.store.ready_poll_ms {
        return Err(ConfigError::Invalid(
            "store.ready_timeout_ms must be >= store.ready_poll_ms",
        ));
    }

    if cfg.feed.refresh_interval_secs == 0 {
        return Err(ConfigError::Invalid("feed.refresh_interval_secs must be > 0"));
    }
    if cfg.feed.limit == 0 {
        return Err(ConfigError::Invalid("feed.limit must be > 0"));
    }
    if cfg.feed.cache_key.trim().is_empty() {
        return Err(ConfigError::Invalid("feed.cache_key must be non-empty"));
    }

    Ok(())
}

/// Returns the canonical example YAML.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"
  backend: remote
  author: "Admin"

store:
  url: "https://PROJECT.supabase.co"
  anon_key: "SUPABASE_ANON_KEY"
  table: "news"
  bucket: "news-images"
  ready_poll_ms: 100
  ready_timeout_ms: 3000

feed:
  refresh_interval_secs: 30
  limit: 6
  cache_key: "abu_news"
"#
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample() -> Config {
        serde_yaml::from_str(example()).unwrap()
    }

    #[test]
    fn parse_example_ok() {
        let cfg = sample();
        validate(&cfg).unwrap();
        assert_eq!(cfg.app.backend, Backend::Remote);
        assert_eq!(cfg.refresh_interval(), Duration::from_secs(30));
        assert_eq!(cfg.feed.limit, 6);
    }

    #[test]
    fn defaults_fill_optional_sections() {
        let yaml = r#"app:
  data_dir: "./data"
store:
  url: "https://x.supabase.co"
  anon_key: "k"
feed: {}
"#;
        let cfg: Config = serde_yaml::from_str(yaml).unwrap();
        validate(&cfg).unwrap();
        assert_eq!(cfg.app.author, "Admin");
        assert_eq!(cfg.store.table, "news");
        assert_eq!(cfg.store.bucket, "news-images");
        assert_eq!(cfg.ready_poll(), Duration::from_millis(100));
        assert_eq!(cfg.feed.cache_key, "abu_news");
    }

    #[test]
    fn invalid_store_settings() {
        let mut cfg = sample();
        cfg.store.anon_key = "".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("store.anon_key")),
            _ => panic!("wrong error"),
        }

        let mut cfg = sample();
        cfg.store.url = "not a url".into();
        let err = validate(&cfg).unwrap_err();
        match err {
            ConfigError::Invalid(msg) => assert!(msg.contains("store.url")),
            _ => panic!("wrong error"),
        }

        let mut cfg = sample();
        cfg.store.ready_timeout_ms = 50;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = sample();
        cfg.store.ready_poll_ms = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn invalid_feed_settings() {
        let mut cfg = sample();
        cfg.feed.limit = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = sample();
        cfg.feed.refresh_interval_secs = 0;
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));

        let mut cfg = sample();
        cfg.feed.cache_key = " ".into();
        assert!(matches!(validate(&cfg), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn overrides_replace_only_non_blank_values() {
        let mut cfg = sample();
        cfg.apply_overrides(Some("https://other.supabase.co".into()), Some("  ".into()));
        assert_eq!(cfg.store.url, "https://other.supabase.co");
        assert_eq!(cfg.store.anon_key, "SUPABASE_ANON_KEY");
    }

    #[test]
    fn ensure_dirs_creates_data_dir() {
        let td = tempdir().unwrap();
        let data_path = td.path().join("data");
        let mut cfg = sample();
        cfg.app.data_dir = data_path.to_string_lossy().to_string();
        cfg.ensure_dirs().unwrap();
        assert!(data_path.exists());
    }

    #[test]
    fn load_from_file_ok() {
        let td = tempdir().unwrap();
        let p = td.path().join("config.yaml");
        fs::write(&p, example()).unwrap();
        let cfg = load(Some(&p)).unwrap();
        assert_eq!(cfg.store.bucket, "news-images");
    }
}
