//! Page data routes.
//!
//! Each route renders JSON (or XML for the sitemap) from the content caches
//! and keeps the output in the page cache under its request path, so
//! revalidating a path forces the next request to render again.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde::Serialize;

use crate::cache::CachedPage;
use crate::error::AppError;
use crate::models::{Block, Post, ReadingStats, TocHeading};
use crate::pipeline::{
    estimate_reading_stats, extract_plain_text, extract_toc, related_posts, render_sitemap,
    sitemap_entries,
};
use crate::server::error::ApiError;
use crate::server::state::AppState;
use crate::services::BookmarkPreview;
use crate::utils::{post_path, series_path, tag_path};

pub const SEARCH_INDEX_CACHE_CONTROL: &str = "s-maxage=3600, stale-while-revalidate=86400";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PostPage<'a> {
    post: &'a Post,
    blocks: &'a [Block],
    reading: ReadingStats,
    toc: Vec<TocHeading>,
    related: Vec<Post>,
    bookmarks: Vec<BookmarkPreview>,
}

#[derive(Debug, Serialize)]
struct TagPage<'a> {
    tag: &'a str,
    posts: &'a [Post],
}

#[derive(Debug, Serialize)]
struct SeriesPage<'a> {
    series: &'a str,
    posts: &'a [Post],
}

fn json_page<T: Serialize + ?Sized>(value: &T) -> Result<CachedPage, ApiError> {
    let body = serde_json::to_string(value).map_err(AppError::from)?;
    Ok(CachedPage::json(body))
}

fn respond(page: &CachedPage) -> Response {
    ([(header::CONTENT_TYPE, page.content_type)], page.body.clone()).into_response()
}

/// `GET /`: published posts, newest first.
pub async fn home(State(state): State<AppState>) -> Result<Response, ApiError> {
    let page = state
        .pages()
        .get_or_render("/", || async {
            let posts = state.fetcher()?.posts().await?;
            json_page(posts.as_slice())
        })
        .await?;
    Ok(respond(&page))
}

/// `GET /posts/{slug}`
pub async fn post(State(state): State<AppState>, Path(slug): Path<String>) -> Result<Response, ApiError> {
    let page = state
        .pages()
        .get_or_render(&post_path(&slug), || render_post(&state, &slug))
        .await?;
    Ok(respond(&page))
}

/// Upstream failures on the post itself read as a missing post.
async fn render_post(state: &AppState, slug: &str) -> Result<CachedPage, ApiError> {
    let not_found = || ApiError::NotFound("Post not found".to_string());
    let fetcher = state.fetcher()?;

    let post = match fetcher.get_post_by_slug(slug).await {
        Ok(Some(post)) => post,
        Ok(None) => return Err(not_found()),
        Err(e) => {
            tracing::warn!(slug, error = %e, "failed to load post");
            return Err(not_found());
        }
    };

    let blocks = fetcher.get_block_tree(&post.id).await.map_err(|e| {
        tracing::warn!(slug, error = %e, "failed to load post content");
        not_found()
    })?;

    let posts = match fetcher.posts().await {
        Ok(posts) => posts,
        Err(e) => {
            tracing::warn!(error = %e, "related posts unavailable");
            Arc::new(Vec::new())
        }
    };

    let content = &state.config.content;
    let text = extract_plain_text(&blocks);
    let page = PostPage {
        post: &post,
        blocks: &blocks,
        reading: estimate_reading_stats(&text, content.words_per_minute),
        toc: extract_toc(&blocks),
        related: related_posts(&post, &posts, content.related_limit),
        bookmarks: state.bookmarks.previews(&blocks).await,
    };
    json_page(&page)
}

/// `GET /tags/{tag}`
pub async fn tag(State(state): State<AppState>, Path(tag): Path<String>) -> Result<Response, ApiError> {
    let page = state
        .pages()
        .get_or_render(&tag_path(&tag), || async {
            let posts = state.fetcher()?.posts_by_tag(&tag).await?;
            json_page(&TagPage { tag: &tag, posts: &posts })
        })
        .await?;
    Ok(respond(&page))
}

/// `GET /series/{series}`
pub async fn series(
    State(state): State<AppState>,
    Path(series): Path<String>,
) -> Result<Response, ApiError> {
    let page = state
        .pages()
        .get_or_render(&series_path(&series), || async {
            let posts = state.fetcher()?.posts_by_series(&series).await?;
            json_page(&SeriesPage { series: &series, posts: &posts })
        })
        .await?;
    Ok(respond(&page))
}

/// `GET /sitemap.xml`
pub async fn sitemap(State(state): State<AppState>) -> Result<Response, ApiError> {
    let page = state
        .pages()
        .get_or_render("/sitemap.xml", || async {
            let posts = state.fetcher()?.posts().await?;
            let entries = sitemap_entries(&state.config.server.site_url, &posts, Utc::now());
            Ok::<_, ApiError>(CachedPage::xml(render_sitemap(&entries)))
        })
        .await?;
    Ok(respond(&page))
}

/// `GET /api/search-index`
pub async fn search_index(State(state): State<AppState>) -> Result<Response, ApiError> {
    let page = state
        .pages()
        .get_or_render("/api/search-index", || async {
            let documents = state.fetcher()?.search_documents().await?;
            json_page(documents.as_slice())
        })
        .await?;

    let mut response = respond(&page);
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(SEARCH_INDEX_CACHE_CONTROL),
    );
    Ok(response)
}
