// src/pipeline/export.rs

//! Static export of published content.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::models::Config;
use crate::pipeline::sitemap::{render_sitemap, sitemap_entries};
use crate::services::ContentFetcher;
use crate::storage::ExportStorage;

pub const POSTS_KEY: &str = "posts.json";
pub const SEARCH_INDEX_KEY: &str = "search-index.json";
pub const SITEMAP_KEY: &str = "sitemap.xml";

/// Result of an export run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSummary {
    pub post_count: usize,
    pub document_count: usize,
    pub files: Vec<String>,
    pub exported_at: DateTime<Utc>,
}

/// Write posts, search index and sitemap through `storage`.
pub async fn run_export(
    config: &Config,
    fetcher: &ContentFetcher,
    storage: &dyn ExportStorage,
) -> Result<ExportSummary> {
    let start = Utc::now();
    log::info!("Exporting content from database {}", fetcher.database_id());

    let posts = fetcher.posts().await?;
    log::info!("Fetched {} published posts", posts.len());

    let documents = fetcher.search_documents().await?;
    log::info!("Built {} search documents", documents.len());

    let sitemap = render_sitemap(&sitemap_entries(&config.server.site_url, &posts, start));

    storage.write_json(POSTS_KEY, &serde_json::to_value(posts.as_ref())?).await?;
    storage
        .write_json(SEARCH_INDEX_KEY, &serde_json::to_value(documents.as_ref())?)
        .await?;
    storage.write_text(SITEMAP_KEY, &sitemap).await?;

    let summary = ExportSummary {
        post_count: posts.len(),
        document_count: documents.len(),
        files: vec![
            storage.location(POSTS_KEY),
            storage.location(SEARCH_INDEX_KEY),
            storage.location(SITEMAP_KEY),
        ],
        exported_at: Utc::now(),
    };

    log::info!(
        "Export complete in {}ms: {} files",
        (summary.exported_at - start).num_milliseconds(),
        summary.files.len()
    );
    Ok(summary)
}
