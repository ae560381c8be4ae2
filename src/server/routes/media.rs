//! Fresh media URL endpoint.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::media::{MediaRef, MediaTarget};
use crate::notion::same_id;
use crate::server::state::AppState;

/// Every response of this route, success or not.
pub const NO_STORE: &str = "no-store, max-age=0";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaQuery {
    post_id: Option<String>,
    kind: Option<String>,
    block_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct MediaReply {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    url: Option<String>,
}

/// `GET /api/notion-media`
pub async fn media(
    State(state): State<AppState>,
    query: std::result::Result<Query<MediaQuery>, QueryRejection>,
) -> Response {
    // an unparseable query is answered like a missing one
    let query = query.map(|Query(query)| query).unwrap_or_default();
    let (status, message, url) = match resolve(&state, &query).await {
        Ok(Some(url)) => (StatusCode::OK, None, Some(url)),
        Ok(None) => (StatusCode::NOT_FOUND, Some("Media not found".to_string()), None),
        Err(AppError::Validation(message)) => (StatusCode::BAD_REQUEST, Some(message), None),
        Err(AppError::NotFound(message)) => (StatusCode::NOT_FOUND, Some(message), None),
        Err(e) => {
            tracing::error!(error = %e, post_id = ?query.post_id, "media refresh failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Some("Failed to refresh notion media".to_string()),
                None,
            )
        }
    };

    let reply = MediaReply {
        ok: status == StatusCode::OK,
        message,
        url,
    };
    (status, [(header::CACHE_CONTROL, NO_STORE)], Json(reply)).into_response()
}

/// Current URL for a published post's media, read past every cache.
async fn resolve(state: &AppState, query: &MediaQuery) -> Result<Option<String>> {
    let media = MediaRef::parse(
        query.post_id.as_deref(),
        query.kind.as_deref(),
        query.block_id.as_deref(),
    )?;

    let fetcher = state.fetcher()?;
    let posts = fetcher.posts().await?;
    if !posts.iter().any(|post| same_id(&post.id, &media.post_id)) {
        return Err(AppError::not_found("Post not found"));
    }

    match &media.target {
        MediaTarget::Cover => Ok(fetcher
            .post_media_urls(&media.post_id)
            .await?
            .and_then(|urls| urls.cover)),
        MediaTarget::Icon => Ok(fetcher
            .post_media_urls(&media.post_id)
            .await?
            .and_then(|urls| urls.icon_url)),
        MediaTarget::BlockImage { block_id } => {
            fetcher.image_block_url(&media.post_id, block_id).await
        }
    }
}
