// src/revalidate/mod.rs

//! Cache revalidation triggers.
//!
//! - `webhook`: signed change events from the content service
//! - `manual`: secret-gated requests from operators and CI
//!
//! Both reduce to tag and path invalidations through a [`Revalidator`].

pub mod manual;
pub mod webhook;

use async_trait::async_trait;

use crate::cache::{CacheController, CacheTag};

pub use manual::{ManualReply, RevalidatePayload, authorize, parse_payload, revalidate_manual};
pub use webhook::{WebhookReply, extract_page_id, handle_webhook, sign_payload, verify_signature};

/// Paths rendered from every post.
pub const COMMON_PATHS: [&str; 3] = ["/", "/sitemap.xml", "/api/search-index"];

/// Route patterns whose every instance depends on post data.
pub const ROUTE_PATTERNS: [&str; 3] = ["/posts/[slug]", "/tags/[tag]", "/series/[series]"];

/// Sink for invalidations.
#[async_trait]
pub trait Revalidator: Send + Sync {
    fn revalidate_tag(&self, tag: CacheTag);

    /// Concrete path or route pattern.
    async fn revalidate_path(&self, path: &str);
}

#[async_trait]
impl Revalidator for CacheController {
    fn revalidate_tag(&self, tag: CacheTag) {
        CacheController::revalidate_tag(self, tag);
    }

    async fn revalidate_path(&self, path: &str) {
        CacheController::revalidate_path(self, path).await;
    }
}

/// Invalidate all content tags.
pub fn revalidate_all_tags(revalidator: &dyn Revalidator) {
    for tag in CacheTag::ALL {
        revalidator.revalidate_tag(tag);
    }
}
