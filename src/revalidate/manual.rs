// src/revalidate/manual.rs

//! Secret-gated manual revalidation.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use subtle::ConstantTimeEq;

use crate::error::{AppError, Result};
use crate::revalidate::{Revalidator, revalidate_all_tags};
use crate::services::normalize_slug;
use crate::utils::{non_blank, post_path, series_path, tag_path};

/// Optional extra targets. Fields with the wrong type are dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevalidatePayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
}

/// Response body of a successful request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualReply {
    pub ok: bool,
    pub revalidated_at: String,
    pub payload: RevalidatePayload,
}

/// Lenient body parsing: anything that is not a JSON object means no extra targets.
pub fn parse_payload(body: &[u8]) -> RevalidatePayload {
    let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(body) else {
        return RevalidatePayload::default();
    };

    let string = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
    RevalidatePayload {
        slug: string("slug"),
        tags: map.get("tags").and_then(Value::as_array).map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        }),
        series: string("series"),
    }
}

/// Check the received secret against the configured one.
pub fn authorize(expected: Option<&str>, received: Option<&str>) -> Result<()> {
    let expected = non_blank(expected)
        .ok_or_else(|| AppError::config("NOTION_REVALIDATE_SECRET is not configured"))?;

    match received {
        Some(received) if bool::from(received.as_bytes().ct_eq(expected.as_bytes())) => Ok(()),
        _ => Err(AppError::unauthorized("Invalid secret")),
    }
}

/// Invalidate all tags, home and sitemap, plus the payload's own targets.
pub async fn revalidate_manual(revalidator: &dyn Revalidator, payload: RevalidatePayload) -> ManualReply {
    revalidate_all_tags(revalidator);
    revalidator.revalidate_path("/").await;
    revalidator.revalidate_path("/sitemap.xml").await;

    if let Some(slug) = payload.slug.as_deref().filter(|s| !s.is_empty()) {
        revalidator.revalidate_path(&post_path(&normalize_slug(slug))).await;
    }
    for tag in payload.tags.iter().flatten() {
        revalidator.revalidate_path(&tag_path(tag)).await;
    }
    if let Some(series) = payload.series.as_deref().filter(|s| !s.is_empty()) {
        revalidator.revalidate_path(&series_path(series)).await;
    }

    log::info!("Manual revalidation: {:?}", payload);
    ManualReply {
        ok: true,
        revalidated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        payload,
    }
}
