// src/media/mod.rs

//! Media URL rehydration.
//!
//! Hosted files are served through signed URLs that expire. The server side
//! (`/api/notion-media`) re-reads the current URL for a media reference; the
//! client side ([`MediaUrlResolver`], [`RetryableImage`]) detects broken
//! images and swaps in a fresh URL with bounded retries.

pub mod image;
pub mod resolver;

use std::fmt;

use crate::error::{AppError, Result};
use crate::utils::non_blank;

pub use image::{ImageLoader, ImageOutcome, ImageState, RetryPolicy, RetryableImage};
pub use resolver::{HttpMediaEndpoint, MediaEndpoint, MediaUrlResolver};

pub const INVALID_MEDIA_REQUEST: &str = "postId and kind(cover|icon|block-image) are required";

/// Which media of a post.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MediaTarget {
    Cover,
    Icon,
    BlockImage { block_id: String },
}

/// A post's media item, independent of its current URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MediaRef {
    pub post_id: String,
    pub target: MediaTarget,
}

impl MediaRef {
    pub fn cover(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            target: MediaTarget::Cover,
        }
    }

    pub fn icon(post_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            target: MediaTarget::Icon,
        }
    }

    pub fn block_image(post_id: impl Into<String>, block_id: impl Into<String>) -> Self {
        Self {
            post_id: post_id.into(),
            target: MediaTarget::BlockImage {
                block_id: block_id.into(),
            },
        }
    }

    /// Build from request parameters. Values are trimmed; a block image needs a block id.
    pub fn parse(post_id: Option<&str>, kind: Option<&str>, block_id: Option<&str>) -> Result<Self> {
        let invalid = || AppError::validation(INVALID_MEDIA_REQUEST);
        let post_id = non_blank(post_id).ok_or_else(invalid)?;

        match (kind, non_blank(block_id)) {
            (Some("cover"), _) => Ok(Self::cover(post_id)),
            (Some("icon"), _) => Ok(Self::icon(post_id)),
            (Some("block-image"), Some(block_id)) => Ok(Self::block_image(post_id, block_id)),
            _ => Err(invalid()),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self.target {
            MediaTarget::Cover => "cover",
            MediaTarget::Icon => "icon",
            MediaTarget::BlockImage { .. } => "block-image",
        }
    }

    pub fn block_id(&self) -> Option<&str> {
        match &self.target {
            MediaTarget::BlockImage { block_id } => Some(block_id),
            _ => None,
        }
    }

    /// Memo key: `postId:kind[:blockId]`.
    pub fn cache_key(&self) -> String {
        self.to_string()
    }

    /// Query parameters for the media endpoint.
    pub fn query_pairs(&self) -> Vec<(&'static str, &str)> {
        let mut pairs = vec![("postId", self.post_id.as_str()), ("kind", self.kind())];
        if let Some(block_id) = self.block_id() {
            pairs.push(("blockId", block_id));
        }
        pairs
    }
}

impl fmt::Display for MediaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.post_id, self.kind())?;
        if let Some(block_id) = self.block_id() {
            write!(f, ":{}", block_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_media_ref() {
        let media = MediaRef::parse(Some(" p1 "), Some("cover"), None).unwrap();
        assert_eq!(media, MediaRef::cover("p1"));

        let media = MediaRef::parse(Some("p1"), Some("block-image"), Some(" b1 ")).unwrap();
        assert_eq!(media.block_id(), Some("b1"));

        for (post, kind, block) in [
            (None, Some("cover"), None),
            (Some("  "), Some("icon"), None),
            (Some("p1"), Some("banner"), None),
            (Some("p1"), None, None),
            (Some("p1"), Some("block-image"), None),
            (Some("p1"), Some("block-image"), Some(" ")),
        ] {
            let err = MediaRef::parse(post, kind, block).unwrap_err();
            assert!(matches!(err, AppError::Validation(ref m) if m == INVALID_MEDIA_REQUEST));
        }
    }

    #[test]
    fn test_cache_key() {
        assert_eq!(MediaRef::cover("p").cache_key(), "p:cover");
        assert_eq!(MediaRef::icon("p").cache_key(), "p:icon");
        assert_eq!(MediaRef::block_image("p", "b").cache_key(), "p:block-image:b");
        assert_eq!(
            MediaRef::block_image("p", "b").query_pairs(),
            vec![("postId", "p"), ("kind", "block-image"), ("blockId", "b")]
        );
    }
}
