// src/cache.rs

//! Tagged content caches and the rendered page cache.
//!
//! Content caches hold API results keyed by request and grouped under
//! [`CacheTag`]s. The page cache holds rendered route output keyed by path.
//! Both are cleared only through [`CacheController`], which is what the
//! revalidation endpoints drive.
//!
//! | Cache | Key | Tags |
//! |-------|-----|------|
//! | schema | database id | schema |
//! | posts | `all`, `tag:<name>` | posts |
//! | post by slug | slug | posts |
//! | blocks | block id | blocks |
//! | search | `all` | posts, blocks |

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use moka::future::Cache;

use crate::error::Result;
use crate::models::{Block, CacheConfig, DatabaseSchema, Post, SearchDocument};

/// Invalidation group for content caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheTag {
    Schema,
    Posts,
    Blocks,
}

impl CacheTag {
    pub const ALL: [CacheTag; 3] = [CacheTag::Schema, CacheTag::Posts, CacheTag::Blocks];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheTag::Schema => "notion:schema",
            CacheTag::Posts => "notion:posts",
            CacheTag::Blocks => "notion:blocks",
        }
    }

    fn index(&self) -> usize {
        match self {
            CacheTag::Schema => 0,
            CacheTag::Posts => 1,
            CacheTag::Blocks => 2,
        }
    }
}

impl std::fmt::Display for CacheTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

fn build<V: Clone + Send + Sync + 'static>(capacity: u64, ttl: Duration) -> Cache<String, V> {
    Cache::builder()
        .max_capacity(capacity)
        .time_to_live(ttl)
        .build()
}

/// Typed caches for API results.
pub struct ContentCache {
    pub schema: Cache<String, DatabaseSchema>,
    pub posts: Cache<String, Arc<Vec<Post>>>,
    pub post_by_slug: Cache<String, Option<Post>>,
    pub blocks: Cache<String, Arc<Vec<Block>>>,
    pub search: Cache<String, Arc<Vec<SearchDocument>>>,
    generations: [AtomicU64; 3],
}

impl ContentCache {
    pub fn new(config: &CacheConfig) -> Self {
        let ttl = config.ttl();
        let capacity = config.max_capacity;
        Self {
            schema: build(capacity, ttl),
            posts: build(capacity, ttl),
            post_by_slug: build(capacity, ttl),
            blocks: build(capacity, ttl),
            search: build(capacity, config.content_ttl()),
            generations: Default::default(),
        }
    }

    /// Combined generation of a tag set. Changes whenever any tag is invalidated.
    fn stamp(&self, tags: &[CacheTag]) -> u64 {
        tags.iter()
            .map(|tag| self.generations[tag.index()].load(Ordering::SeqCst))
            .sum()
    }

    /// Return the cached value or compute and store it.
    ///
    /// Loader errors are returned unmodified and never cached. A value whose
    /// tags were invalidated while it was being computed is returned but not
    /// stored.
    pub async fn get_or_compute<V, F, Fut>(
        &self,
        cache: &Cache<String, V>,
        tags: &[CacheTag],
        key: &str,
        compute: F,
    ) -> Result<V>
    where
        V: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = cache.get(key).await {
            log::debug!("cache hit: {}", key);
            return Ok(value);
        }

        log::debug!("cache miss: {}", key);
        let stamp = self.stamp(tags);
        let value = compute().await?;

        if self.stamp(tags) == stamp {
            cache.insert(key.to_string(), value.clone()).await;
        } else {
            log::debug!("not caching {}: invalidated during load", key);
        }
        Ok(value)
    }

    /// Drop every entry carrying `tag`. Idempotent.
    pub fn invalidate(&self, tag: CacheTag) {
        self.generations[tag.index()].fetch_add(1, Ordering::SeqCst);
        match tag {
            CacheTag::Schema => self.schema.invalidate_all(),
            CacheTag::Posts => {
                self.posts.invalidate_all();
                self.post_by_slug.invalidate_all();
                self.search.invalidate_all();
            }
            CacheTag::Blocks => {
                self.blocks.invalidate_all();
                self.search.invalidate_all();
            }
        }
    }
}

/// A rendered route output.
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub body: String,
    pub content_type: &'static str,
    pub rendered_at: DateTime<Utc>,
}

impl CachedPage {
    pub fn json(body: String) -> Self {
        Self {
            body,
            content_type: "application/json",
            rendered_at: Utc::now(),
        }
    }

    pub fn xml(body: String) -> Self {
        Self {
            body,
            content_type: "application/xml",
            rendered_at: Utc::now(),
        }
    }
}

/// Rendered outputs keyed by request path.
#[derive(Clone)]
pub struct PageCache {
    cache: Cache<String, Arc<CachedPage>>,
    generation: Arc<AtomicU64>,
}

impl PageCache {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(config.max_capacity)
                .time_to_live(config.ttl())
                .support_invalidation_closures()
                .build(),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn get(&self, path: &str) -> Option<Arc<CachedPage>> {
        self.cache.get(path).await
    }

    pub async fn insert(&self, path: &str, page: CachedPage) -> Arc<CachedPage> {
        let page = Arc::new(page);
        self.cache.insert(path.to_string(), page.clone()).await;
        page
    }

    /// Cached output for `path`, rendering it on a miss.
    ///
    /// Output rendered while any page invalidation ran is served but not stored.
    pub async fn get_or_render<F, Fut, E>(&self, path: &str, render: F) -> std::result::Result<Arc<CachedPage>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<CachedPage, E>>,
    {
        if let Some(page) = self.cache.get(path).await {
            return Ok(page);
        }

        let stamp = self.generation.load(Ordering::SeqCst);
        let page = Arc::new(render().await?);
        if self.generation.load(Ordering::SeqCst) == stamp {
            self.cache.insert(path.to_string(), page.clone()).await;
        }
        Ok(page)
    }

    pub async fn invalidate(&self, path: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate(path).await;
    }

    /// Drop every path starting with `prefix`.
    pub fn invalidate_prefix(&self, prefix: &str) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let prefix = prefix.to_string();
        if let Err(e) = self
            .cache
            .invalidate_entries_if(move |path, _| path.starts_with(&prefix))
        {
            log::warn!("Page cache prefix invalidation failed: {}", e);
        }
    }
}

/// Turns revalidation requests into cache invalidations.
#[derive(Clone)]
pub struct CacheController {
    content: Arc<ContentCache>,
    pages: PageCache,
}

impl CacheController {
    pub fn new(content: Arc<ContentCache>, pages: PageCache) -> Self {
        Self { content, pages }
    }

    pub fn pages(&self) -> &PageCache {
        &self.pages
    }

    pub fn revalidate_tag(&self, tag: CacheTag) {
        log::info!("Revalidating tag {}", tag);
        self.content.invalidate(tag);
    }

    /// Invalidate a concrete path, or every path of a route pattern such as
    /// `/posts/[slug]`.
    pub async fn revalidate_path(&self, path: &str) {
        match route_prefix(path) {
            Some(prefix) => {
                log::info!("Revalidating route {}", path);
                self.pages.invalidate_prefix(&prefix);
            }
            None => {
                log::info!("Revalidating path {}", path);
                self.pages.invalidate(path).await;
            }
        }
    }
}

/// Static prefix of a route pattern, `None` for concrete paths.
fn route_prefix(path: &str) -> Option<String> {
    let start = path.find('[')?;
    path.ends_with(']').then(|| path[..start].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    fn content() -> ContentCache {
        ContentCache::new(&CacheConfig::default())
    }

    #[test]
    fn test_route_prefix() {
        assert_eq!(route_prefix("/posts/[slug]").as_deref(), Some("/posts/"));
        assert_eq!(route_prefix("/posts/hello"), None);
        assert_eq!(route_prefix("/"), None);
    }

    #[tokio::test]
    async fn test_get_or_compute_caches_value() {
        let cache = content();
        let first = cache
            .get_or_compute(&cache.schema, &[CacheTag::Schema], "db", || async {
                Ok(DatabaseSchema {
                    title: Some("Name".into()),
                    ..Default::default()
                })
            })
            .await
            .unwrap();

        let second = cache
            .get_or_compute(&cache.schema, &[CacheTag::Schema], "db", || async {
                Err(AppError::config("loader should not run"))
            })
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_errors_propagate_and_are_not_cached() {
        let cache = content();
        let err = cache
            .get_or_compute(&cache.posts, &[CacheTag::Posts], "all", || async {
                Err(AppError::not_found("db"))
            })
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(cache.posts.get("all").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate_tag_clears_related_caches() {
        let cache = content();
        cache.posts.insert("all".into(), Arc::new(vec![])).await;
        cache.search.insert("all".into(), Arc::new(vec![])).await;
        cache.schema.insert("db".into(), DatabaseSchema::default()).await;

        cache.invalidate(CacheTag::Posts);
        cache.invalidate(CacheTag::Posts);

        assert!(cache.posts.get("all").await.is_none());
        assert!(cache.search.get("all").await.is_none());
        assert!(cache.schema.get("db").await.is_some());
    }

    #[tokio::test]
    async fn test_invalidated_during_load_is_not_stored() {
        let cache = content();
        let value = cache
            .get_or_compute(&cache.blocks, &[CacheTag::Blocks], "page", || async {
                cache.invalidate(CacheTag::Blocks);
                Ok(Arc::new(vec![]))
            })
            .await
            .unwrap();
        assert!(value.is_empty());
        assert!(cache.blocks.get("page").await.is_none());
    }

    #[tokio::test]
    async fn test_controller_paths_and_patterns() {
        let pages = PageCache::new(&CacheConfig::default());
        let controller = CacheController::new(Arc::new(content()), pages.clone());

        pages.insert("/", CachedPage::json("[]".into())).await;
        pages.insert("/posts/a", CachedPage::json("{}".into())).await;
        pages.insert("/posts/b", CachedPage::json("{}".into())).await;
        pages.insert("/tags/rust", CachedPage::json("[]".into())).await;

        controller.revalidate_path("/").await;
        assert!(pages.get("/").await.is_none());
        assert!(pages.get("/posts/a").await.is_some());

        controller.revalidate_path("/posts/[slug]").await;
        // closures run lazily; reads must not see invalidated entries
        assert!(pages.get("/posts/a").await.is_none());
        assert!(pages.get("/posts/b").await.is_none());
        assert!(pages.get("/tags/rust").await.is_some());
    }

    #[tokio::test]
    async fn test_get_or_render() {
        let pages = PageCache::new(&CacheConfig::default());

        let first = pages
            .get_or_render("/", || async { Ok::<_, AppError>(CachedPage::json("[1]".into())) })
            .await
            .unwrap();
        let second = pages
            .get_or_render("/", || async { Err(AppError::config("render should not run")) })
            .await
            .unwrap();
        assert_eq!(first.body, second.body);

        let raced = pages
            .get_or_render("/sitemap.xml", || async {
                pages.invalidate("/").await;
                Ok::<_, AppError>(CachedPage::xml("<urlset/>".into()))
            })
            .await
            .unwrap();
        assert_eq!(raced.content_type, "application/xml");
        assert!(pages.get("/sitemap.xml").await.is_none());
    }
}
