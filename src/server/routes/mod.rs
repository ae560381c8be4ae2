// src/server/routes/mod.rs

//! Route definitions.

mod health;
mod media;
mod pages;
mod revalidate;

use axum::Router;
use axum::routing::get;

use crate::server::state::AppState;

/// Build the complete router.
///
/// # Route Structure
///
/// ## Pages (cached per path)
/// - `GET /` - Published posts
/// - `GET /posts/{slug}` - Post, content tree and derived data
/// - `GET /tags/{tag}` - Posts with a tag
/// - `GET /series/{series}` - Posts in a series
/// - `GET /sitemap.xml` - Sitemap
///
/// ## API
/// - `GET|POST /api/notion-webhook` - Signed change events
/// - `GET|POST /api/revalidate` - Secret-gated revalidation
/// - `GET /api/notion-media` - Fresh media URL, never cached
/// - `GET /api/search-index` - Search documents
///
/// ## Public
/// - `GET /health` - Health check
pub fn router(state: AppState) -> Router {
    let api = Router::new()
        .route(
            "/notion-webhook",
            get(revalidate::webhook_usage).post(revalidate::webhook),
        )
        .route(
            "/revalidate",
            get(revalidate::revalidate_get).post(revalidate::revalidate_post),
        )
        .route("/notion-media", get(media::media))
        .route("/search-index", get(pages::search_index));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/", get(pages::home))
        .route("/posts/{slug}", get(pages::post))
        .route("/tags/{tag}", get(pages::tag))
        .route("/series/{series}", get(pages::series))
        .route("/sitemap.xml", get(pages::sitemap))
        .nest("/api", api)
        .with_state(state)
}
