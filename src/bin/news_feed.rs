use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing::{error, info};

use abu_news::config;
use abu_news::db::{self, LocalCache};
use abu_news::feed::{FeedLoader, FeedSource};
use abu_news::model::NewsCard;
use abu_news::store;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Keep the public news feed fresh and print its cards as JSON"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Refresh and print once, then exit
    #[arg(long)]
    once: bool,

    /// Override `feed.limit`
    #[arg(long)]
    limit: Option<usize>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;

    let pool = db::init_pool(&cfg.database_url()).await?;
    db::run_migrations(&pool).await?;

    let fallback = LocalCache::new(pool.clone(), cfg.feed.cache_key.clone());
    let mut loader = FeedLoader::new(store::from_config(&cfg, &pool), Some(fallback))
        .with_limit(args.limit.unwrap_or(cfg.feed.limit));

    if args.once {
        let source = loader.refresh().await;
        print_cards(source, &loader.render());
        return Ok(());
    }

    info!(
        every_secs = cfg.feed.refresh_interval_secs,
        backend = ?cfg.app.backend,
        "starting feed refresh loop"
    );
    loader.run(cfg.refresh_interval(), print_cards).await;
    Ok(())
}

fn print_cards(source: FeedSource, cards: &[NewsCard]) {
    info!(?source, count = cards.len(), "feed rendered");
    match serde_json::to_string(cards) {
        Ok(json) => println!("{}", json),
        Err(err) => error!(%err, "failed to encode feed cards"),
    }
}
