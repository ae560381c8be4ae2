//! Webhook and manual revalidation endpoints.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};

use crate::revalidate::{
    ManualReply, RevalidatePayload, WebhookReply, authorize, handle_webhook, parse_payload,
    revalidate_manual,
};
use crate::server::error::ApiError;
use crate::server::state::AppState;

pub const SIGNATURE_HEADER: &str = "x-notion-signature";
pub const SECRET_HEADER: &str = "x-revalidate-secret";

#[derive(Debug, Clone, Serialize)]
pub struct UsageReply {
    ok: bool,
    message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct SecretQuery {
    secret: Option<String>,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Query parameter wins over the header when both are present.
fn request_secret<'a>(query: &'a SecretQuery, headers: &'a HeaderMap) -> Option<&'a str> {
    query.secret.as_deref().or_else(|| header(headers, SECRET_HEADER))
}

/// `POST /api/notion-webhook`
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookReply>, ApiError> {
    let reply = handle_webhook(
        state.config.secrets.webhook_secret.as_deref(),
        header(&headers, SIGNATURE_HEADER),
        &body,
        state.fetcher().ok(),
        &state.controller,
    )
    .await?;
    Ok(Json(reply))
}

/// `GET /api/notion-webhook`
pub async fn webhook_usage() -> Json<UsageReply> {
    Json(UsageReply {
        ok: true,
        message: "POST Notion webhook events to this endpoint.",
    })
}

/// `POST /api/revalidate`
pub async fn revalidate_post(
    State(state): State<AppState>,
    Query(query): Query<SecretQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ManualReply>, ApiError> {
    authorize(
        state.config.secrets.revalidate_secret.as_deref(),
        request_secret(&query, &headers),
    )?;
    Ok(Json(revalidate_manual(&state.controller, parse_payload(&body)).await))
}

/// `GET /api/revalidate`: the POST behavior without a payload.
pub async fn revalidate_get(
    State(state): State<AppState>,
    Query(query): Query<SecretQuery>,
    headers: HeaderMap,
) -> Result<Json<ManualReply>, ApiError> {
    authorize(
        state.config.secrets.revalidate_secret.as_deref(),
        request_secret(&query, &headers),
    )?;
    Ok(Json(
        revalidate_manual(&state.controller, RevalidatePayload::default()).await,
    ))
}
