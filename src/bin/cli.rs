//! Notion blog CLI
//!
//! Runs the HTTP server or one-off content commands against the configured
//! database.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use notion_blog::{
    cache::ContentCache,
    config::load_config,
    error::{AppError, Result},
    models::Config,
    notion::HttpNotionClient,
    pipeline,
    revalidate::sign_payload,
    services::ContentFetcher,
    storage::LocalStorage,
};
use serde::Serialize;
use serde_json::json;

/// Notion-backed blog backend
#[derive(Parser, Debug)]
#[command(name = "notion-blog", version, about = "Notion-backed blog backend")]
struct Cli {
    /// Path to the TOML configuration file (optional)
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Path to a .env file (optional)
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve pages, webhook, revalidation and media routes
    #[cfg(feature = "server")]
    Serve {
        /// Bind address, overrides BIND_ADDR
        #[arg(long)]
        bind: Option<String>,
    },

    /// List posts as JSON
    Posts {
        /// Include unpublished rows
        #[arg(long)]
        drafts: bool,
    },

    /// Show one post with its derived data
    Post { slug: String },

    /// Dump the block tree of a page
    Blocks { page_id: String },

    /// Print the search index
    SearchIndex,

    /// Write posts.json, search-index.json and sitemap.xml
    Export {
        /// Output directory
        #[arg(short, long, default_value = "out")]
        out: PathBuf,
    },

    /// Print the x-notion-signature header value for a payload file
    Sign {
        file: PathBuf,

        /// Signing secret, defaults to the configured webhook token
        #[arg(long)]
        secret: Option<String>,
    },

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Server logging; `log` records are bridged into the subscriber.
#[cfg(feature = "server")]
fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let level = if verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn build_fetcher(config: &Config) -> Result<ContentFetcher> {
    let (_, database_id) = config.require_notion()?;
    let source = Arc::new(HttpNotionClient::new(&config.notion)?);
    let cache = Arc::new(ContentCache::new(&config.cache));
    Ok(ContentFetcher::new(source, cache, database_id, config))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        #[cfg(feature = "server")]
        Command::Serve { .. } => init_tracing(cli.verbose),
        _ => init_logging(cli.verbose),
    }

    let config = load_config(&cli.config, &cli.dotenv)?;

    match cli.command {
        #[cfg(feature = "server")]
        Command::Serve { bind } => {
            let mut config = config;
            if let Some(bind) = bind {
                config.server.bind_addr = bind;
            }
            notion_blog::server::serve(config).await?;
        }

        Command::Posts { drafts } => {
            let fetcher = build_fetcher(&config)?;
            let posts = fetcher.list_posts(!drafts).await?;
            log::info!("{} posts", posts.len());
            print_json(posts.as_slice())?;
        }

        Command::Post { slug } => {
            let fetcher = build_fetcher(&config)?;
            let post = fetcher
                .get_post_by_slug(&slug)
                .await?
                .ok_or_else(|| AppError::not_found(format!("post '{}'", slug)))?;
            let blocks = fetcher.get_block_tree(&post.id).await?;
            let posts = fetcher.posts().await?;
            let text = pipeline::extract_plain_text(&blocks);

            print_json(&json!({
                "post": post,
                "reading": pipeline::estimate_reading_stats(&text, config.content.words_per_minute),
                "toc": pipeline::extract_toc(&blocks),
                "related": pipeline::related_posts(&post, &posts, config.content.related_limit),
            }))?;
        }

        Command::Blocks { page_id } => {
            let fetcher = build_fetcher(&config)?;
            let blocks = fetcher.get_block_tree(&page_id).await?;
            log::info!("{} top-level blocks", blocks.len());
            print_json(blocks.as_slice())?;
        }

        Command::SearchIndex => {
            let fetcher = build_fetcher(&config)?;
            let documents = fetcher.search_documents().await?;
            print_json(documents.as_slice())?;
        }

        Command::Export { out } => {
            let fetcher = build_fetcher(&config)?;
            let storage = LocalStorage::new(&out);
            let summary = pipeline::run_export(&config, &fetcher, &storage).await?;
            log::info!(
                "Exported {} posts and {} search documents to {}",
                summary.post_count,
                summary.document_count,
                out.display()
            );
        }

        Command::Sign { file, secret } => {
            let secret = secret
                .or_else(|| config.secrets.webhook_secret.clone())
                .ok_or_else(|| AppError::config("NOTION_WEBHOOK_VERIFICATION_TOKEN is not configured"))?;
            let body = std::fs::read(&file)?;
            println!("{}", sign_payload(&secret, &body)?);
        }

        Command::Validate => {
            log::info!("Validating configuration...");
            log::info!("✓ Config values OK");

            match config.require_notion() {
                Ok(_) => log::info!("✓ Content API credentials present"),
                Err(e) => {
                    log::error!("{}", e);
                    return Err(e);
                }
            }
            for (name, value) in [
                ("NOTION_WEBHOOK_VERIFICATION_TOKEN", &config.secrets.webhook_secret),
                ("NOTION_REVALIDATE_SECRET", &config.secrets.revalidate_secret),
                ("ADMIN_GITHUB_LOGIN", &config.secrets.admin_github_login),
            ] {
                if value.is_none() {
                    log::warn!("{} is not set; features using it are disabled", name);
                }
            }

            log::info!("All validations passed!");
        }
    }

    Ok(())
}
