// src/services/fetcher.rs

//! Content fetcher.
//!
//! Paginates the content API for rows and block trees, mapping results into
//! domain models. Every read goes through [`ContentCache`] so repeated renders
//! cost one upstream request per cache lifetime. Upstream errors propagate
//! unmodified; callers decide whether to degrade.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, try_join_all};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheTag, ContentCache};
use crate::error::Result;
use crate::models::{Block, BlockKind, Config, DatabaseSchema, Post, SearchDocument, contains_block};
use crate::notion::{self, ContentSource, DatabaseQuery, PageObject};
use crate::pipeline::derive::{extract_plain_text, truncate_chars};
use crate::services::mapper::{normalize_slug, page_to_post};
use crate::services::schema::resolve_schema;

/// Concurrent block tree loads when building search documents.
const SEARCH_CONCURRENCY: usize = 4;

/// Current media URLs of a post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMediaUrls {
    pub cover: Option<String>,
    pub icon_url: Option<String>,
}

/// Cached, paginated reads of the content database.
pub struct ContentFetcher {
    source: Arc<dyn ContentSource>,
    cache: Arc<ContentCache>,
    database_id: String,
    page_size: u32,
    max_depth: usize,
    search_content_chars: usize,
}

impl ContentFetcher {
    pub fn new(
        source: Arc<dyn ContentSource>,
        cache: Arc<ContentCache>,
        database_id: impl Into<String>,
        config: &Config,
    ) -> Self {
        Self {
            source,
            cache,
            database_id: database_id.into(),
            page_size: config.notion.page_size,
            max_depth: config.content.max_block_depth,
            search_content_chars: config.content.search_content_chars,
        }
    }

    pub fn database_id(&self) -> &str {
        &self.database_id
    }

    /// Resolved schema of the configured database.
    pub async fn schema(&self) -> Result<DatabaseSchema> {
        self.cache
            .get_or_compute(
                &self.cache.schema,
                &[CacheTag::Schema],
                &self.database_id,
                || async {
                    let database = self.source.retrieve_database(&self.database_id).await?;
                    let schema = resolve_schema(&database)?;
                    log::info!("Resolved schema for database {}: {:?}", self.database_id, schema);
                    Ok(schema)
                },
            )
            .await
    }

    /// Run a query to exhaustion, keeping only full page objects.
    async fn query_all(&self, filter: Option<Value>, sorts: Vec<Value>) -> Result<Vec<PageObject>> {
        let mut pages = Vec::new();
        let mut cursor = None;

        loop {
            let query = DatabaseQuery::new(self.page_size)
                .filter(filter.clone())
                .sorts(sorts.clone())
                .cursor(cursor);
            let response = self.source.query_database(&self.database_id, &query).await?;
            cursor = response.next();
            pages.extend(response.results.into_iter().filter_map(PageObject::from_raw));

            if cursor.is_none() {
                break;
            }
        }

        log::debug!("Query returned {} rows", pages.len());
        Ok(pages)
    }

    /// All rows as posts, newest first. With `filter_published`, rows whose
    /// published box is unchecked are left out.
    pub async fn list_posts(&self, filter_published: bool) -> Result<Arc<Vec<Post>>> {
        let key = if filter_published { "all" } else { "all:drafts" };
        self.cache
            .get_or_compute(&self.cache.posts, &[CacheTag::Posts], key, || async {
                let schema = self.schema().await?;
                let filter = match (&schema.published, filter_published) {
                    (Some(published), true) => Some(notion::checkbox_true(published)),
                    _ => None,
                };
                let pages = self
                    .query_all(filter, notion::newest_first(schema.date.as_deref()))
                    .await?;
                let posts: Vec<Post> = pages.iter().map(|page| page_to_post(page, &schema)).collect();
                log::info!("Loaded {} posts", posts.len());
                Ok(Arc::new(posts))
            })
            .await
    }

    /// Published posts, newest first.
    pub async fn posts(&self) -> Result<Arc<Vec<Post>>> {
        self.list_posts(true).await
    }

    /// Single published post by slug (raw or percent-encoded).
    ///
    /// Tries a filtered query on the slug property first, then scans the
    /// cached listing for a derived slug.
    pub async fn get_post_by_slug(&self, slug: &str) -> Result<Option<Post>> {
        self.cache
            .get_or_compute(&self.cache.post_by_slug, &[CacheTag::Posts], slug, || async {
                let schema = self.schema().await?;
                let decoded = normalize_slug(slug);

                if let Some(slug_property) = &schema.slug {
                    let mut filters = vec![notion::rich_text_equals(slug_property, &decoded)];
                    if let Some(published) = &schema.published {
                        filters.push(notion::checkbox_true(published));
                    }
                    let query = DatabaseQuery::new(1).filter(notion::and(filters));
                    let response = self.source.query_database(&self.database_id, &query).await?;
                    if let Some(page) = response.results.into_iter().find_map(PageObject::from_raw) {
                        return Ok(Some(page_to_post(&page, &schema)));
                    }
                }

                let posts = self.posts().await?;
                Ok(posts
                    .iter()
                    .find(|post| post.slug == decoded || post.slug == slug)
                    .cloned())
            })
            .await
    }

    /// Published posts carrying `tag`; empty when the database has no tags property.
    pub async fn posts_by_tag(&self, tag: &str) -> Result<Arc<Vec<Post>>> {
        let key = format!("tag:{}", tag);
        self.cache
            .get_or_compute(&self.cache.posts, &[CacheTag::Posts], &key, || async {
                let schema = self.schema().await?;
                let Some(tags_property) = &schema.tags else {
                    return Ok(Arc::new(Vec::new()));
                };

                let mut filters = vec![notion::multi_select_contains(tags_property, tag)];
                if let Some(published) = &schema.published {
                    filters.push(notion::checkbox_true(published));
                }
                let pages = self
                    .query_all(
                        notion::and(filters),
                        notion::newest_first(schema.date.as_deref()),
                    )
                    .await?;
                Ok(Arc::new(
                    pages.iter().map(|page| page_to_post(page, &schema)).collect(),
                ))
            })
            .await
    }

    pub async fn posts_by_series(&self, series: &str) -> Result<Vec<Post>> {
        let posts = self.posts().await?;
        Ok(posts
            .iter()
            .filter(|post| post.series.as_deref() == Some(series))
            .cloned()
            .collect())
    }

    /// Distinct tags over published posts, sorted.
    pub async fn all_tags(&self) -> Result<Vec<String>> {
        let posts = self.posts().await?;
        let tags: BTreeSet<&String> = posts.iter().flat_map(|post| &post.tags).collect();
        Ok(tags.into_iter().cloned().collect())
    }

    /// Distinct series over published posts, sorted.
    pub async fn all_series(&self) -> Result<Vec<String>> {
        let posts = self.posts().await?;
        let series: BTreeSet<&String> = posts.iter().filter_map(|post| post.series.as_ref()).collect();
        Ok(series.into_iter().cloned().collect())
    }

    /// Distinct non-empty slugs in listing order.
    pub async fn all_slugs(&self) -> Result<Vec<String>> {
        let posts = self.posts().await?;
        let mut seen = BTreeSet::new();
        Ok(posts
            .iter()
            .map(|post| post.slug.clone())
            .filter(|slug| !slug.is_empty() && seen.insert(slug.clone()))
            .collect())
    }

    /// Full block tree under a page or block, children in source order.
    pub async fn get_block_tree(&self, root_id: &str) -> Result<Arc<Vec<Block>>> {
        self.block_children(root_id.to_string(), 1).await
    }

    /// Children of one block, cached per block id.
    fn block_children(&self, block_id: String, depth: usize) -> BoxFuture<'_, Result<Arc<Vec<Block>>>> {
        async move {
            self.cache
                .get_or_compute(&self.cache.blocks, &[CacheTag::Blocks], &block_id, || {
                    self.load_children(&block_id, depth)
                })
                .await
        }
        .boxed()
    }

    async fn load_children(&self, block_id: &str, depth: usize) -> Result<Arc<Vec<Block>>> {
        let mut blocks = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let response = self
                .source
                .list_block_children(block_id, cursor.as_deref(), self.page_size)
                .await?;
            cursor = response.next();

            let parsed: Vec<Block> = response.results.into_iter().filter_map(Block::from_raw).collect();
            // siblings resolve concurrently; try_join_all keeps input order
            let resolved = try_join_all(parsed.into_iter().map(|block| self.resolve_children(block, depth))).await?;
            blocks.extend(resolved);

            if cursor.is_none() {
                break;
            }
        }

        Ok(Arc::new(blocks))
    }

    async fn resolve_children(&self, mut block: Block, depth: usize) -> Result<Block> {
        if !block.has_children {
            return Ok(block);
        }
        if depth >= self.max_depth {
            log::warn!(
                "Block {} exceeds max depth {}; children not fetched",
                block.id,
                self.max_depth
            );
            block.children = Some(Vec::new());
            return Ok(block);
        }

        let children = self.block_children(block.id.clone(), depth + 1).await?;
        block.children = Some(children.as_ref().clone());
        Ok(block)
    }

    /// Post for an arbitrary page id. Pages from another database are rejected.
    pub async fn post_by_page_id(&self, page_id: &str) -> Result<Option<Post>> {
        let raw = self.source.retrieve_page(page_id).await?;
        let Some(page) = PageObject::from_raw(raw) else {
            return Ok(None);
        };

        if let Some(parent) = page.parent_database_id() {
            if !notion::same_id(parent, &self.database_id) {
                log::debug!("Page {} belongs to database {}, ignoring", page_id, parent);
                return Ok(None);
            }
        }

        let schema = self.schema().await?;
        Ok(Some(page_to_post(&page, &schema)))
    }

    /// Fresh cover and icon URLs, read uncached from the page.
    pub async fn post_media_urls(&self, post_id: &str) -> Result<Option<PostMediaUrls>> {
        let raw = self.source.retrieve_page(post_id).await?;
        Ok(PageObject::from_raw(raw).map(|page| PostMediaUrls {
            cover: page.cover_url(),
            icon_url: page.icon().and_then(|icon| icon.image_url().map(str::to_string)),
        }))
    }

    /// Fresh URL of an image block, only if the block belongs to the post.
    pub async fn image_block_url(&self, post_id: &str, block_id: &str) -> Result<Option<String>> {
        let tree = self.get_block_tree(post_id).await?;
        if !contains_block(&tree, block_id) {
            return Ok(None);
        }

        let raw = self.source.retrieve_block(block_id).await?;
        Ok(Block::from_raw(raw).and_then(|block| match block.kind {
            BlockKind::Image(image) => Some(image.source.url().to_string()),
            _ => None,
        }))
    }

    /// Search documents for every published post.
    pub async fn search_documents(&self) -> Result<Arc<Vec<SearchDocument>>> {
        self.cache
            .get_or_compute(
                &self.cache.search,
                &[CacheTag::Posts, CacheTag::Blocks],
                "all",
                || async {
                    let posts = self.posts().await?;
                    let documents: Vec<SearchDocument> = stream::iter(posts.iter().cloned())
                        .map(|post| async move {
                            let tree = self.get_block_tree(&post.id).await?;
                            let text = extract_plain_text(&tree);
                            Ok::<_, crate::error::AppError>(SearchDocument::from_post(
                                &post,
                                truncate_chars(&text, self.search_content_chars),
                            ))
                        })
                        .buffered(SEARCH_CONCURRENCY)
                        .try_collect()
                        .await?;
                    log::info!("Built {} search documents", documents.len());
                    Ok(Arc::new(documents))
                },
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notion::testing::{FakeSource, DATABASE_ID, image_block, page, text_block, with_series};
    use serde_json::json;

    fn fetcher_with(source: Arc<FakeSource>, config: &Config) -> ContentFetcher {
        let cache = Arc::new(ContentCache::new(&config.cache));
        ContentFetcher::new(source, cache, DATABASE_ID, config)
    }

    fn fetcher(source: Arc<FakeSource>) -> ContentFetcher {
        fetcher_with(source, &Config::default())
    }

    fn seeded() -> Arc<FakeSource> {
        let source = Arc::new(FakeSource::with_page_size(2));
        source.add_page(page("p1", "First Post", "first", &["rust", "web"], true, "2024-03-01"));
        source.add_page(with_series(
            page("p2", "Second Post", "", &["rust"], true, "2024-02-01"),
            "Async",
        ));
        source.add_page(page("p3", "Draft", "draft", &["zig"], false, "2024-01-15"));
        source.add_page(with_series(
            page("p4", "러스트 입문", "", &["web"], true, "2024-01-01"),
            "Async",
        ));
        source.add_page(page("p5", "Dup", "first", &[], true, "2023-12-01"));
        source
    }

    #[tokio::test]
    async fn test_list_posts_paginates_and_filters() {
        let source = seeded();
        let fetcher = fetcher(source.clone());

        let posts = fetcher.posts().await.unwrap();
        let slugs: Vec<&str> = posts.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["first", "second-post", "러스트-입문", "first"]);
        // 4 matching rows at page size 2
        assert_eq!(FakeSource::calls(&source.query_calls), 2);

        let all = fetcher.list_posts(false).await.unwrap();
        assert_eq!(all.len(), 5);
    }

    #[tokio::test]
    async fn test_posts_are_cached() {
        let source = seeded();
        let fetcher = fetcher(source.clone());

        fetcher.posts().await.unwrap();
        fetcher.posts().await.unwrap();
        fetcher.all_tags().await.unwrap();
        assert_eq!(FakeSource::calls(&source.query_calls), 2);
        assert_eq!(FakeSource::calls(&source.database_calls), 1);
    }

    #[tokio::test]
    async fn test_aggregates() {
        let fetcher = fetcher(seeded());
        assert_eq!(fetcher.all_tags().await.unwrap(), vec!["rust", "web"]);
        assert_eq!(fetcher.all_series().await.unwrap(), vec!["Async"]);
        assert_eq!(
            fetcher.all_slugs().await.unwrap(),
            vec!["first", "second-post", "러스트-입문"]
        );

        let series = fetcher.posts_by_series("Async").await.unwrap();
        assert_eq!(series.len(), 2);
    }

    #[tokio::test]
    async fn test_posts_by_tag_excludes_drafts() {
        let fetcher = fetcher(seeded());
        let rust = fetcher.posts_by_tag("rust").await.unwrap();
        assert_eq!(rust.len(), 2);
        assert!(fetcher.posts_by_tag("zig").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_posts_by_tag_without_tags_property() {
        let source = seeded();
        *source.database.lock() = json!({"properties": {"Name": {"type": "title"}}});
        let fetcher = fetcher(source.clone());
        assert!(fetcher.posts_by_tag("rust").await.unwrap().is_empty());
        assert_eq!(FakeSource::calls(&source.query_calls), 0);
    }

    #[tokio::test]
    async fn test_get_post_by_slug_direct_and_fallback() {
        let source = seeded();
        let fetcher = fetcher(source.clone());

        let post = fetcher.get_post_by_slug("first").await.unwrap().unwrap();
        assert_eq!(post.id, "p1");

        // derived slug has no stored value, found by scanning the listing
        let encoded = "%EB%9F%AC%EC%8A%A4%ED%8A%B8-%EC%9E%85%EB%AC%B8";
        let post = fetcher.get_post_by_slug(encoded).await.unwrap().unwrap();
        assert_eq!(post.id, "p4");

        assert!(fetcher.get_post_by_slug("draft").await.unwrap().is_none());
        assert!(fetcher.get_post_by_slug("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_errors_propagate() {
        let source = seeded();
        source.fail.store(true, std::sync::atomic::Ordering::SeqCst);
        let fetcher = fetcher(source);
        let err = fetcher.posts().await.unwrap_err();
        assert!(matches!(err, crate::error::AppError::Notion { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_block_tree_recursive_and_ordered() {
        let source = Arc::new(FakeSource::with_page_size(2));
        source.set_children(
            "page",
            vec![
                text_block("a", "paragraph", "one", false),
                text_block("b", "toggle", "two", true),
                text_block("c", "paragraph", "three", false),
                json!({"object": "block", "id": "partial"}),
            ],
        );
        source.set_children(
            "b",
            vec![
                text_block("b1", "bulleted_list_item", "nested", true),
                text_block("b2", "paragraph", "after", false),
                text_block("b3", "paragraph", "last", false),
            ],
        );
        source.set_children("b1", vec![text_block("b1a", "quote", "deep", false)]);
        let fetcher = fetcher(source.clone());

        let tree = fetcher.get_block_tree("page").await.unwrap();
        let ids: Vec<&str> = tree.iter().map(|b| b.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let toggle = &tree[1];
        let child_ids: Vec<&str> = toggle.children().iter().map(|b| b.id.as_str()).collect();
        assert_eq!(child_ids, vec!["b1", "b2", "b3"]);
        assert_eq!(toggle.children()[0].children()[0].id, "b1a");
        assert!(tree[0].children.is_none());

        let calls = FakeSource::calls(&source.children_calls);
        fetcher.get_block_tree("page").await.unwrap();
        assert_eq!(FakeSource::calls(&source.children_calls), calls);
    }

    #[tokio::test]
    async fn test_block_tree_depth_cap() {
        let source = Arc::new(FakeSource::new());
        source.set_children("page", vec![text_block("l1", "toggle", "1", true)]);
        source.set_children("l1", vec![text_block("l2", "toggle", "2", true)]);
        source.set_children("l2", vec![text_block("l3", "toggle", "3", true)]);

        let mut config = Config::default();
        config.content.max_block_depth = 2;
        let fetcher = fetcher_with(source, &config);

        let tree = fetcher.get_block_tree("page").await.unwrap();
        let l2 = &tree[0].children()[0];
        assert_eq!(l2.id, "l2");
        assert_eq!(l2.children, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_post_by_page_id_checks_parent() {
        let source = seeded();
        let mut foreign = page("x1", "Elsewhere", "x", &[], true, "");
        foreign["parent"] = json!({"type": "database_id", "database_id": "other-db"});
        source.add_page(foreign);
        let fetcher = fetcher(source);

        assert_eq!(fetcher.post_by_page_id("p2").await.unwrap().unwrap().slug, "second-post");
        assert!(fetcher.post_by_page_id("x1").await.unwrap().is_none());
        assert!(fetcher.post_by_page_id("nope").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_media_urls() {
        let source = seeded();
        let mut with_media = page("m1", "Media", "media", &[], true, "");
        with_media["cover"] = json!({"type": "file", "file": {"url": "https://files/cover.png"}});
        with_media["icon"] = json!({"type": "emoji", "emoji": "🔥"});
        source.add_page(with_media);
        source.set_children(
            "m1",
            vec![
                image_block("img1", "https://files/one.png"),
                text_block("t1", "paragraph", "text", false),
            ],
        );
        source.set_children("other", vec![image_block("img2", "https://files/two.png")]);
        let fetcher = fetcher(source);

        let urls = fetcher.post_media_urls("m1").await.unwrap().unwrap();
        assert_eq!(urls.cover.as_deref(), Some("https://files/cover.png"));
        assert_eq!(urls.icon_url, None);

        assert_eq!(
            fetcher.image_block_url("m1", "img1").await.unwrap().as_deref(),
            Some("https://files/one.png")
        );
        assert_eq!(fetcher.image_block_url("m1", "t1").await.unwrap(), None);
        // block from another page is not served
        assert_eq!(fetcher.image_block_url("m1", "img2").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_search_documents() {
        let source = seeded();
        source.set_children("p1", vec![text_block("a", "paragraph", "alpha body", false)]);
        let mut config = Config::default();
        config.content.search_content_chars = 5;
        let fetcher = fetcher_with(source, &config);

        let documents = fetcher.search_documents().await.unwrap();
        assert_eq!(documents.len(), 4);
        assert_eq!(documents[0].id, "p1");
        assert_eq!(documents[0].content, "alpha");
        assert_eq!(documents[0].tags, vec!["rust", "web"]);
        assert_eq!(documents[1].content, "");
        assert_eq!(documents[1].series.as_deref(), Some("Async"));
    }
}
