// src/server/state.rs

//! Shared application state.

use std::sync::Arc;

use crate::cache::{CacheController, ContentCache, PageCache};
use crate::error::{AppError, Result};
use crate::models::Config;
use crate::notion::{ContentSource, HttpNotionClient};
use crate::services::{BookmarkResolver, ContentFetcher};

/// Shared state available to all request handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// Absent when the content API is not configured
    fetcher: Option<Arc<ContentFetcher>>,
    /// Sole writer of cache invalidations
    pub controller: CacheController,
    pub bookmarks: Arc<BookmarkResolver>,
}

impl AppState {
    /// State backed by the content API.
    ///
    /// Missing credentials do not fail construction: routes that need content
    /// answer with the configuration error instead.
    pub fn new(config: Config) -> Result<Self> {
        let source: Option<Arc<dyn ContentSource>> = match config.require_notion() {
            Ok(_) => Some(Arc::new(HttpNotionClient::new(&config.notion)?)),
            Err(e) => {
                tracing::warn!(error = %e, "content API unavailable, serving without it");
                None
            }
        };
        Self::build(config, source)
    }

    pub fn with_source(config: Config, source: Arc<dyn ContentSource>) -> Result<Self> {
        Self::build(config, Some(source))
    }

    fn build(config: Config, source: Option<Arc<dyn ContentSource>>) -> Result<Self> {
        let content = Arc::new(ContentCache::new(&config.cache));
        let database_id = config.notion.database_id.as_deref();
        let fetcher = match (source, database_id) {
            (Some(source), Some(database_id)) => Some(Arc::new(ContentFetcher::new(
                source,
                content.clone(),
                database_id,
                &config,
            ))),
            _ => None,
        };
        let controller = CacheController::new(content, PageCache::new(&config.cache));
        let bookmarks = BookmarkResolver::new(&config.bookmark)?;

        tracing::info!(
            database_id = ?database_id,
            content_api = fetcher.is_some(),
            environment = ?config.cache.environment,
            ttl_secs = config.cache.ttl().as_secs(),
            "application state ready"
        );

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            controller,
            bookmarks: Arc::new(bookmarks),
        })
    }

    /// Content fetcher, or the configuration error explaining its absence.
    pub fn fetcher(&self) -> Result<&ContentFetcher> {
        match &self.fetcher {
            Some(fetcher) => Ok(fetcher),
            None => Err(self
                .config
                .require_notion()
                .err()
                .unwrap_or_else(|| AppError::config("content API is not configured"))),
        }
    }

    pub fn pages(&self) -> &PageCache {
        self.controller.pages()
    }
}
