//! Public news feed: periodic read-only refresh with a local fallback.
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::db::LocalCache;
use crate::model::{DisplayNews, NewsCard, NewsId};
use crate::store::ContentStore;

pub const DEFAULT_LIMIT: usize = 6;

/// Where the current feed contents came from after a refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedSource {
    Remote,
    Fallback,
    /// Neither source had entries; the previous list was kept.
    Unchanged,
}

pub struct FeedLoader<S> {
    store: S,
    fallback: Option<LocalCache>,
    news: Vec<DisplayNews>,
    limit: usize,
}

impl<S: ContentStore> FeedLoader<S> {
    pub fn new(store: S, fallback: Option<LocalCache>) -> Self {
        Self {
            store,
            fallback,
            news: Vec::new(),
            limit: DEFAULT_LIMIT,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn news(&self) -> &[DisplayNews] {
        &self.news
    }

    pub fn find(&self, id: &NewsId) -> Option<&DisplayNews> {
        self.news.iter().find(|n| &n.id == id)
    }

    /// Fetch the remote list and replace the feed wholesale. An empty or
    /// failed fetch falls back to the local list; if that is empty too, the
    /// current feed stays as it is.
    #[instrument(skip_all)]
    pub async fn refresh(&mut self) -> FeedSource {
        match self.store.list_all().await {
            Ok(rows) if !rows.is_empty() => {
                self.news = rows.iter().map(DisplayNews::from_record).collect();
                debug!(count = self.news.len(), "feed refreshed from store");
                return FeedSource::Remote;
            }
            Ok(_) => info!("store has no news; trying local list"),
            Err(err) => warn!(%err, "failed to load news from store; trying local list"),
        }

        let local = self.load_fallback().await;
        if local.is_empty() {
            info!(kept = self.news.len(), "no local news either; keeping current feed");
            return FeedSource::Unchanged;
        }
        info!(count = local.len(), "feed refreshed from local list");
        self.news = local;
        FeedSource::Fallback
    }

    async fn load_fallback(&self) -> Vec<DisplayNews> {
        let Some(cache) = &self.fallback else {
            return Vec::new();
        };
        match cache.load().await {
            Ok(entries) => entries.iter().map(|e| e.to_display()).collect(),
            Err(err) => {
                warn!(err = %format!("{:#}", err), "failed to read local news list");
                Vec::new()
            }
        }
    }

    /// Newest `limit` entries by logical date, as cards.
    pub fn render(&self) -> Vec<NewsCard> {
        let mut sorted: Vec<&DisplayNews> = self.news.iter().collect();
        // Entries without a usable date sort last.
        sorted.sort_by(|a, b| b.sort_key().cmp(&a.sort_key()));
        sorted
            .into_iter()
            .take(self.limit)
            .map(NewsCard::from_display)
            .collect()
    }

    /// Refresh and render now, then every `every`, for as long as the task
    /// lives.
    pub async fn run<F>(mut self, every: Duration, mut on_render: F)
    where
        F: FnMut(FeedSource, &[NewsCard]),
    {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let source = self.refresh().await;
            let cards = self.render();
            on_render(source, &cards);
        }
    }
}
