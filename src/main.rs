use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use abu_news::config::{self, Config};
use abu_news::db::{self, LocalCache, Pool};
use abu_news::locale::Locale;
use abu_news::migrate;
use abu_news::model::{ImageFile, ImageSource, NewsForm, NewsId, PreviewView};
use abu_news::store::{self, ContentStore, SupabaseStore};
use abu_news::sync::{RemoveOutcome, Synchronizer};

#[derive(Debug, Parser)]
#[command(author, version, about = "Manage news entries for the university site")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List stored news, newest first
    List,
    /// Create a news entry from a YAML form
    Add {
        /// YAML file with the form fields (title, date, description, content, imageUrl, ...)
        #[arg(long)]
        form: PathBuf,
        /// Image file to upload instead of `imageUrl`
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Update an entry; blank form fields keep their stored values
    Edit {
        #[arg(long)]
        id: String,
        #[arg(long)]
        form: PathBuf,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Delete an entry
    Delete {
        #[arg(long)]
        id: String,
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Show how a form would render without saving it
    Preview {
        #[arg(long)]
        form: PathBuf,
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Show how a stored entry renders
    Show {
        #[arg(long)]
        id: String,
    },
    /// Copy the local news list into the remote store
    Migrate,
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

    match args.command {
        Command::List => {
            let sync = open(&cfg, &pool).await?;
            for record in sync.records() {
                println!(
                    "{}\t{}\t{}",
                    record.id,
                    record.created_at.format("%Y-%m-%d %H:%M"),
                    record.title
                );
            }
        }
        Command::Add { form, image } => {
            let form = read_form(&form, image.as_deref()).await?;
            let mut sync = open(&cfg, &pool).await?;
            let row = sync.submit(&form).await?;
            println!("created {}", row.id);
        }
        Command::Edit { id, form, image } => {
            let id = NewsId::new(id);
            let edits = read_form(&form, image.as_deref()).await?;
            let mut sync = open(&cfg, &pool).await?;
            let stored = sync
                .begin_edit(&id)
                .ok_or_else(|| anyhow!("no news with id {}", id))?;
            match sync.submit(&overlay(stored, edits)).await {
                Ok(row) => println!("updated {}", row.id),
                Err(err) => {
                    sync.cancel_edit();
                    return Err(err.into());
                }
            }
        }
        Command::Delete { id, yes } => {
            let id = NewsId::new(id);
            let mut sync = open(&cfg, &pool).await?;
            let confirm = |prompt: &str| yes || ask(prompt);
            match sync.remove(&id, &confirm).await? {
                RemoveOutcome::Removed => println!("deleted {}", id),
                RemoveOutcome::Missing => warn!(%id, "no such news in the store"),
                RemoveOutcome::Declined => println!("cancelled"),
            }
        }
        Command::Preview { form, image } => {
            let form = read_form(&form, image.as_deref()).await?;
            // Previews never reach the store, so nothing is loaded.
            let sync = Synchronizer::new(store::from_config(&cfg, &pool), cfg.app.author.clone());
            print_preview(&sync.render_preview(&form));
        }
        Command::Show { id } => {
            let id = NewsId::new(id);
            let sync = open(&cfg, &pool).await?;
            let view = sync
                .preview_record(&id)
                .ok_or_else(|| anyhow!("no news with id {}", id))?;
            print_preview(&view);
        }
        Command::Migrate => {
            let local = LocalCache::new(pool.clone(), cfg.feed.cache_key.clone());
            let remote = SupabaseStore::connect(&cfg);
            let report =
                migrate::migrate_local_to_remote(&local, &remote, &cfg.app.author).await?;
            println!(
                "migrated {} of {} (skipped {}, failed {})",
                report.migrated, report.total, report.skipped, report.failed
            );
        }
    }

    Ok(())
}

async fn open(cfg: &Config, pool: &Pool) -> Result<Synchronizer<Arc<dyn ContentStore>>> {
    let mut sync = Synchronizer::new(store::from_config(cfg, pool), cfg.app.author.clone());
    info!(backend = ?cfg.app.backend, "loading news");
    sync.load().await?;
    Ok(sync)
}

async fn read_form(path: &Path, image: Option<&Path>) -> Result<NewsForm> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read form {}", path.display()))?;
    let mut form: NewsForm = serde_yaml::from_str(&raw)
        .with_context(|| format!("failed to parse form {}", path.display()))?;
    if let Some(image) = image {
        let bytes = tokio::fs::read(image)
            .await
            .with_context(|| format!("failed to read image {}", image.display()))?;
        if bytes.is_empty() {
            bail!("image {} is empty", image.display());
        }
        let name = image
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        form = form.with_image(ImageFile::new(name, bytes));
    }
    Ok(form)
}

/// Non-blank fields of `edits` replace those of `stored`.
fn overlay(stored: NewsForm, edits: NewsForm) -> NewsForm {
    fn pick(stored: String, edit: String) -> String {
        if edit.trim().is_empty() {
            stored
        } else {
            edit
        }
    }
    NewsForm {
        title: pick(stored.title, edits.title),
        date: pick(stored.date, edits.date),
        description: pick(stored.description, edits.description),
        content: pick(stored.content, edits.content),
        image: edits.image,
        image_url: edits.image_url,
        title_ru: pick(stored.title_ru, edits.title_ru),
        title_en: pick(stored.title_en, edits.title_en),
        title_kz: pick(stored.title_kz, edits.title_kz),
        description_ru: pick(stored.description_ru, edits.description_ru),
        description_en: pick(stored.description_en, edits.description_en),
        description_kz: pick(stored.description_kz, edits.description_kz),
    }
}

fn ask(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if std::io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if std::io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn print_preview(view: &PreviewView) {
    for locale in Locale::ALL {
        println!("[{}] {}", locale.as_str(), view.title.get(locale));
        println!("     {}", view.date_label.get(locale));
        println!("     {}", view.description.get(locale));
    }
    match &view.image {
        ImageSource::Inline {
            content_type,
            bytes,
        } => println!("image: inline {} ({} bytes)", content_type, bytes.len()),
        other => println!("image: {}", other.src().unwrap_or_default()),
    }
    println!();
    println!("{}", view.content);
}
