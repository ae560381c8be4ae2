// src/revalidate/webhook.rs

//! Content change webhook.
//!
//! The first delivery after subscribing is a handshake carrying a
//! `verification_token`; it is acknowledged without checks. Every later event
//! must carry `x-notion-signature: sha256=<hex HMAC-SHA256 of the raw body>`
//! keyed with that token.

use chrono::{SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use serde_json::Value;
use sha2::Sha256;

use crate::error::{AppError, Result};
use crate::revalidate::{COMMON_PATHS, ROUTE_PATTERNS, Revalidator, revalidate_all_tags};
use crate::services::ContentFetcher;
use crate::utils::{post_path, series_path, tag_path};

type HmacSha256 = Hmac<Sha256>;

/// Response body of a successful delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WebhookReply {
    #[serde(rename_all = "camelCase")]
    Handshake {
        ok: bool,
        verification_token_received: bool,
    },
    #[serde(rename_all = "camelCase")]
    Event {
        ok: bool,
        event_id: Option<String>,
        event_type: Option<String>,
        page_id: Option<String>,
        revalidated_slug: Option<String>,
        revalidated_tags: Vec<String>,
        revalidated_series: Option<String>,
        revalidated_at: String,
    },
}

const SIGNATURE_PREFIX: &str = "sha256=";

fn keyed_mac(secret: &str, body: &[u8]) -> Result<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::config(format!("invalid webhook secret: {}", e)))?;
    mac.update(body);
    Ok(mac)
}

/// `sha256=<hex>` signature of `body` under `secret`.
pub fn sign_payload(secret: &str, body: &[u8]) -> Result<String> {
    let mac = keyed_mac(secret, body)?;
    Ok(format!("{}{}", SIGNATURE_PREFIX, hex::encode(mac.finalize().into_bytes())))
}

/// Constant-time check of a received signature header.
///
/// Headers without the `sha256=` prefix or with a non-hex digest never match.
pub fn verify_signature(secret: &str, body: &[u8], received: &str) -> Result<bool> {
    let mac = keyed_mac(secret, body)?;
    let Some(digest) = received.trim().strip_prefix(SIGNATURE_PREFIX) else {
        return Ok(false);
    };
    let Ok(digest) = hex::decode(digest) else {
        return Ok(false);
    };
    Ok(mac.verify_slice(&digest).is_ok())
}

/// Trimmed non-empty string at `value`.
fn as_string(value: Option<&Value>) -> Option<String> {
    let trimmed = value?.as_str()?.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Page id an event refers to.
///
/// Checked in order: `entity.id` of a page entity, `data.page_id`,
/// `data.page.id`, then `data.parent.page_id` when the parent is a page.
pub fn extract_page_id(payload: &Value) -> Option<String> {
    let entity = payload.get("entity");
    let entity_type = as_string(entity.and_then(|e| e.get("type"))).map(|t| t.to_lowercase());
    if entity_type.as_deref() == Some("page") {
        if let Some(id) = as_string(entity.and_then(|e| e.get("id"))) {
            return Some(id);
        }
    }

    let data = payload.get("data").filter(|d| d.is_object())?;

    if let Some(id) = as_string(data.get("page_id")) {
        return Some(id);
    }
    if let Some(id) = as_string(data.get("page").and_then(|p| p.get("id"))) {
        return Some(id);
    }

    let parent = data.get("parent")?;
    let parent_type = as_string(parent.get("type")).map(|t| t.to_lowercase());
    if parent_type.as_deref() == Some("page_id") {
        return as_string(parent.get("page_id"));
    }
    None
}

/// Process one delivery.
///
/// Errors: `Validation` for an empty or non-object body, `Config` when no
/// secret is configured, `Unauthorized` for a missing or wrong signature.
/// Failing to resolve the affected post is logged and does not fail the call,
/// and without a `fetcher` only the broad invalidation runs.
pub async fn handle_webhook(
    secret: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
    fetcher: Option<&ContentFetcher>,
    revalidator: &dyn Revalidator,
) -> Result<WebhookReply> {
    if body.is_empty() {
        return Err(AppError::validation("Webhook body is required"));
    }

    let payload: Value = serde_json::from_slice(body)
        .ok()
        .filter(Value::is_object)
        .ok_or_else(|| AppError::validation("Invalid JSON body"))?;

    if let Some(token) = as_string(payload.get("verification_token")) {
        log::info!(
            "Webhook verification token received; configure it as NOTION_WEBHOOK_VERIFICATION_TOKEN: {}",
            token
        );
        return Ok(WebhookReply::Handshake {
            ok: true,
            verification_token_received: true,
        });
    }

    let secret = crate::utils::non_blank(secret)
        .ok_or_else(|| AppError::config("NOTION_WEBHOOK_VERIFICATION_TOKEN is not configured"))?;

    let signature = crate::utils::non_blank(signature)
        .ok_or_else(|| AppError::unauthorized("Missing X-Notion-Signature"))?;

    if !verify_signature(secret, body, signature)? {
        log::warn!("Rejected webhook with invalid signature");
        return Err(AppError::unauthorized("Invalid signature"));
    }

    revalidate_all_tags(revalidator);
    for path in COMMON_PATHS.iter().chain(ROUTE_PATTERNS.iter()) {
        revalidator.revalidate_path(path).await;
    }

    let page_id = extract_page_id(&payload);
    let mut revalidated_slug = None;
    let mut revalidated_tags = Vec::new();
    let mut revalidated_series = None;

    if let (Some(page_id), None) = (&page_id, fetcher) {
        log::warn!("Content API not configured, skipping lookup of webhook page {}", page_id);
    }
    if let (Some(page_id), Some(fetcher)) = (&page_id, fetcher) {
        match fetcher.post_by_page_id(page_id).await {
            Ok(Some(post)) => {
                if !post.slug.is_empty() {
                    revalidator.revalidate_path(&post_path(&post.slug)).await;
                    revalidated_slug = Some(post.slug.clone());
                }
                for tag in &post.tags {
                    revalidator.revalidate_path(&tag_path(tag)).await;
                    revalidated_tags.push(tag.clone());
                }
                if let Some(series) = &post.series {
                    revalidator.revalidate_path(&series_path(series)).await;
                    revalidated_series = Some(series.clone());
                }
            }
            Ok(None) => log::debug!("Webhook page {} is not a post", page_id),
            Err(e) => log::error!("Failed to resolve webhook page {}: {}", page_id, e),
        }
    }

    let event_type = as_string(payload.get("type"));
    log::info!(
        "Webhook {:?} processed (page {:?}, slug {:?})",
        event_type,
        page_id,
        revalidated_slug
    );

    Ok(WebhookReply::Event {
        ok: true,
        event_id: as_string(payload.get("id")),
        event_type,
        page_id,
        revalidated_slug,
        revalidated_tags,
        revalidated_series,
        revalidated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::cache::{CacheTag, ContentCache};
    use crate::models::Config;
    use crate::notion::testing::{DATABASE_ID, FakeSource, page, with_series};
    use crate::revalidate::testing::RecordingRevalidator;
    use serde_json::json;

    const SECRET: &str = "secret_token";

    fn fetcher(source: Arc<FakeSource>) -> ContentFetcher {
        let config = Config::default();
        ContentFetcher::new(source, Arc::new(ContentCache::new(&config.cache)), DATABASE_ID, &config)
    }

    #[test]
    fn test_sign_payload_known_vector() {
        // RFC 4231 test case 2
        let signature = sign_payload("Jefe", b"what do ya want for nothing?").unwrap();
        assert_eq!(
            signature,
            "sha256=5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_verify_signature_exactness() {
        let body = br#"{"type":"page.content_updated"}"#;
        let good = sign_payload(SECRET, body).unwrap();
        let verify = |secret: &str, body: &[u8], received: &str| {
            verify_signature(secret, body, received).unwrap()
        };
        assert!(verify(SECRET, body, &good));

        let mut flipped = good.clone().into_bytes();
        let last = flipped.len() - 1;
        flipped[last] = if flipped[last] == b'0' { b'1' } else { b'0' };
        assert!(!verify(SECRET, body, std::str::from_utf8(&flipped).unwrap()));

        assert!(!verify(SECRET, b"{}", &good));
        assert!(!verify("other", body, &good));
        assert!(!verify(SECRET, body, good.trim_start_matches("sha256=")));
    }

    #[test]
    fn test_verify_signature_malformed_digest() {
        let body = br#"{"type":"page.created"}"#;
        let good = sign_payload(SECRET, body).unwrap();
        let verify = |received: &str| verify_signature(SECRET, body, received).unwrap();

        assert!(verify(&format!("  {}  ", good)));
        assert!(!verify("sha256=not-hex"));
        assert!(!verify("sha256="));
        assert!(!verify(&good[..good.len() - 2]));
        assert!(!verify(&format!("{}00", good)));
        assert!(!verify(&good.replace("sha256=", "sha1=")));
    }

    #[test]
    fn test_extract_page_id_order() {
        assert_eq!(
            extract_page_id(&json!({"entity": {"type": "PAGE", "id": " e1 "}, "data": {"page_id": "d1"}})),
            Some("e1".into())
        );
        assert_eq!(
            extract_page_id(&json!({"entity": {"type": "database", "id": "db"}, "data": {"page_id": "d1"}})),
            Some("d1".into())
        );
        assert_eq!(
            extract_page_id(&json!({"data": {"page": {"id": "p1"}, "parent": {"type": "page_id", "page_id": "x"}}})),
            Some("p1".into())
        );
        assert_eq!(
            extract_page_id(&json!({"data": {"parent": {"type": "page_id", "page_id": "parent"}}})),
            Some("parent".into())
        );
        assert_eq!(
            extract_page_id(&json!({"data": {"parent": {"type": "database_id", "database_id": "db"}}})),
            None
        );
        assert_eq!(extract_page_id(&json!({"data": "nope"})), None);
    }

    #[tokio::test]
    async fn test_handshake_skips_signature() {
        let recorder = RecordingRevalidator::default();
        let body = br#"{"verification_token":"secret_abc"}"#;
        let reply = handle_webhook(None, None, body, Some(&fetcher(Arc::new(FakeSource::new()))), &recorder)
            .await
            .unwrap();

        assert_eq!(
            serde_json::to_value(&reply).unwrap(),
            json!({"ok": true, "verificationTokenReceived": true})
        );
        assert!(recorder.tags().is_empty());
        assert!(recorder.paths().is_empty());
    }

    #[tokio::test]
    async fn test_rejections() {
        let recorder = RecordingRevalidator::default();
        let fetcher = fetcher(Arc::new(FakeSource::new()));
        let body = br#"{"type":"page.created"}"#;

        let err = handle_webhook(Some(SECRET), None, b"", Some(&fetcher), &recorder).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Webhook body is required"));

        let err = handle_webhook(Some(SECRET), None, b"[1]", Some(&fetcher), &recorder).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Invalid JSON body"));

        let err = handle_webhook(Some(" "), None, body, Some(&fetcher), &recorder).await.unwrap_err();
        assert!(matches!(err, AppError::Config(_)));

        let err = handle_webhook(Some(SECRET), None, body, Some(&fetcher), &recorder).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        let err = handle_webhook(Some(SECRET), Some("sha256=00"), body, Some(&fetcher), &recorder)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));

        assert!(recorder.tags().is_empty());
    }

    #[tokio::test]
    async fn test_signed_event_revalidates_post() {
        let source = Arc::new(FakeSource::new());
        source.add_page(with_series(
            page("page-1", "Hello", "hello world", &["rust", "web"], true, "2024-01-01"),
            "Intro",
        ));
        let fetcher = fetcher(source);
        let recorder = RecordingRevalidator::default();

        let body = serde_json::to_vec(&json!({
            "id": "evt-1",
            "type": "page.content_updated",
            "entity": {"type": "page", "id": "page-1"}
        }))
        .unwrap();
        let signature = sign_payload(SECRET, &body).unwrap();

        let reply = handle_webhook(Some(SECRET), Some(&signature), &body, Some(&fetcher), &recorder)
            .await
            .unwrap();

        assert_eq!(recorder.tags(), CacheTag::ALL.to_vec());
        let paths = recorder.paths();
        for expected in [
            "/",
            "/sitemap.xml",
            "/api/search-index",
            "/posts/[slug]",
            "/tags/[tag]",
            "/series/[series]",
            "/posts/hello%20world",
            "/tags/rust",
            "/tags/web",
            "/series/Intro",
        ] {
            assert!(paths.contains(&expected.to_string()), "missing {expected}");
        }

        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["eventId"], "evt-1");
        assert_eq!(value["pageId"], "page-1");
        assert_eq!(value["revalidatedSlug"], "hello world");
        assert_eq!(value["revalidatedTags"], json!(["rust", "web"]));
        assert_eq!(value["revalidatedSeries"], "Intro");
    }

    #[tokio::test]
    async fn test_unresolvable_page_still_succeeds() {
        let fetcher = fetcher(Arc::new(FakeSource::new()));
        let recorder = RecordingRevalidator::default();
        let body = br#"{"type":"page.deleted","entity":{"type":"page","id":"gone"}}"#;
        let signature = sign_payload(SECRET, body).unwrap();

        let reply = handle_webhook(Some(SECRET), Some(&signature), body, Some(&fetcher), &recorder)
            .await
            .unwrap();
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["ok"], true);
        assert_eq!(value["pageId"], "gone");
        assert_eq!(value["revalidatedSlug"], serde_json::Value::Null);
        assert_eq!(recorder.paths().len(), 6);
    }

    #[tokio::test]
    async fn test_without_fetcher_only_broad_invalidation() {
        let recorder = RecordingRevalidator::default();
        let body = br#"{"type":"page.created","entity":{"type":"page","id":"p1"}}"#;
        let signature = sign_payload(SECRET, body).unwrap();

        let reply = handle_webhook(Some(SECRET), Some(&signature), body, None, &recorder)
            .await
            .unwrap();
        let value = serde_json::to_value(&reply).unwrap();
        assert_eq!(value["pageId"], "p1");
        assert_eq!(value["revalidatedSlug"], serde_json::Value::Null);
        assert_eq!(recorder.paths().len(), 6);
    }
}
