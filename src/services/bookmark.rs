// src/services/bookmark.rs

//! Link preview metadata for bookmark blocks.
//!
//! Fetches the target page once per cache lifetime and reads OpenGraph,
//! Twitter card and plain HTML metadata from it. Any failure yields `None`;
//! a broken preview never breaks a page render.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use moka::future::Cache;
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use scraper::{Html, Selector};
use serde::Serialize;
use url::Url;

use crate::error::Result;
use crate::models::{Block, BlockKind, BookmarkConfig};
use crate::utils::http::{create_async_client, is_html};
use crate::utils::url::{BookmarkUrl, is_blocked_host, parse_bookmark_url, resolve_url};

/// Preview data of a linked page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub icon: Option<String>,
    pub site_name: Option<String>,
    /// Canonical URL, falling back to the final fetched URL
    pub url: String,
}

/// Everything a bookmark card needs.
#[derive(Debug, Clone, Serialize)]
pub struct BookmarkPreview {
    #[serde(flatten)]
    pub link: BookmarkUrl,
    pub metadata: Option<BookmarkMetadata>,
}

/// Fetches and caches bookmark metadata.
pub struct BookmarkResolver {
    client: Client,
    cache: Cache<String, Option<Arc<BookmarkMetadata>>>,
    max_bytes: usize,
}

impl BookmarkResolver {
    pub fn new(config: &BookmarkConfig) -> Result<Self> {
        let client = create_async_client(&config.user_agent, Duration::from_millis(config.timeout_ms))?;
        let cache = Cache::builder()
            .max_capacity(2_000)
            .time_to_live(Duration::from_secs(config.ttl_secs))
            .build();
        Ok(Self {
            client,
            cache,
            max_bytes: config.max_bytes,
        })
    }

    /// Metadata for `raw_url`, or `None` when the URL is unsafe or the fetch fails.
    pub async fn metadata(&self, raw_url: &str) -> Option<Arc<BookmarkMetadata>> {
        let safe = sanitize_url(raw_url)?;
        self.cache
            .get_with(safe.to_string(), async {
                match self.fetch(&safe).await {
                    Ok(found) => found.map(Arc::new),
                    Err(e) => {
                        log::debug!("Bookmark fetch failed for {}: {}", safe, e);
                        None
                    }
                }
            })
            .await
    }

    /// Link parts plus metadata for one bookmark block.
    pub async fn preview(&self, raw_url: &str) -> BookmarkPreview {
        BookmarkPreview {
            link: parse_bookmark_url(raw_url),
            metadata: self.metadata(raw_url).await.map(|m| m.as_ref().clone()),
        }
    }

    /// Previews for every bookmark in a block tree, in document order.
    pub async fn previews(&self, blocks: &[Block]) -> Vec<BookmarkPreview> {
        join_all(bookmark_urls(blocks).into_iter().map(|url| self.preview(url))).await
    }

    async fn fetch(&self, url: &Url) -> Result<Option<BookmarkMetadata>> {
        let mut response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/html,application/xhtml+xml")
            .send()
            .await?;

        if !response.status().is_success() {
            return Ok(None);
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok());
        if !is_html(content_type) {
            return Ok(None);
        }

        let final_url = response.url().clone();
        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            body.extend_from_slice(&chunk);
            if body.len() >= self.max_bytes {
                body.truncate(self.max_bytes);
                break;
            }
        }

        let html = String::from_utf8_lossy(&body);
        Ok(Some(extract_metadata(&html, &final_url)))
    }
}

/// Distinct bookmark URLs of a tree, depth first.
pub fn bookmark_urls(blocks: &[Block]) -> Vec<&str> {
    fn walk<'a>(blocks: &'a [Block], urls: &mut Vec<&'a str>) {
        for block in blocks {
            if let BlockKind::Bookmark(bookmark) = &block.kind {
                let url = bookmark.url.trim();
                if !url.is_empty() && !urls.contains(&url) {
                    urls.push(url);
                }
            }
            walk(block.children(), urls);
        }
    }

    let mut urls = Vec::new();
    walk(blocks, &mut urls);
    urls
}

/// Only http(s) URLs to public hosts.
pub fn sanitize_url(raw: &str) -> Option<Url> {
    let url = Url::parse(raw.trim()).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }
    if is_blocked_host(url.host_str()?) {
        return None;
    }
    Some(url)
}

/// Read preview fields from an HTML document.
pub fn extract_metadata(html: &str, base: &Url) -> BookmarkMetadata {
    let document = Html::parse_document(html);
    let absolute = |value: Option<String>| value.and_then(|v| resolve_url(base, &v));

    let title = meta_content(&document, &["og:title", "twitter:title"]).or_else(|| page_title(&document));
    let description = meta_content(&document, &["og:description", "twitter:description", "description"]);
    let image = absolute(meta_content(
        &document,
        &["og:image:secure_url", "og:image", "twitter:image"],
    ));
    let icon = absolute(icon_href(&document));
    let site_name = meta_content(&document, &["og:site_name", "twitter:site"]);
    let url = absolute(meta_content(&document, &["og:url"])).unwrap_or_else(|| base.to_string());

    BookmarkMetadata {
        title,
        description,
        image,
        icon,
        site_name,
        url,
    }
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First non-empty `content` of a meta tag whose property or name matches, in key order.
fn meta_content(document: &Html, keys: &[&str]) -> Option<String> {
    let selector = Selector::parse("meta[content]").ok()?;

    keys.iter().find_map(|key| {
        document.select(&selector).find_map(|meta| {
            let element = meta.value();
            let named = [element.attr("property"), element.attr("name")]
                .into_iter()
                .flatten()
                .any(|value| value.eq_ignore_ascii_case(key));
            if !named {
                return None;
            }
            let content = collapse_whitespace(element.attr("content")?);
            (!content.is_empty()).then_some(content)
        })
    })
}

fn page_title(document: &Html) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let title = document.select(&selector).next()?;
    let text = collapse_whitespace(&title.text().collect::<String>());
    (!text.is_empty()).then_some(text)
}

fn icon_href(document: &Html) -> Option<String> {
    let selector = Selector::parse("link[rel][href]").ok()?;
    document.select(&selector).find_map(|link| {
        let element = link.value();
        let rel = element.attr("rel")?.to_ascii_lowercase();
        if !rel.contains("icon") {
            return None;
        }
        let href = element.attr("href")?.trim();
        (!href.is_empty()).then(|| href.to_string())
    })
}
