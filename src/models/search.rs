//! Derived, read-only projections used for search and page chrome.

use serde::{Deserialize, Serialize};

use crate::models::Post;

/// A post plus its extracted body text, used only for full-text matching.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchDocument {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub series: Option<String>,
    pub content: String,
}

impl SearchDocument {
    /// Build a document from a post and its already extracted body text.
    pub fn from_post(post: &Post, content: String) -> Self {
        Self {
            id: post.id.clone(),
            slug: post.slug.clone(),
            title: post.title.clone(),
            description: post.description.clone(),
            tags: post.tags.clone(),
            series: post.series.clone(),
            content,
        }
    }
}

/// Word count and estimated reading time.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadingStats {
    pub words: usize,
    pub minutes: usize,
}

/// One entry of a post's table of contents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TocHeading {
    /// Anchor id, `heading-<block id without dashes>`
    pub id: String,
    pub text: String,
    pub level: u8,
}
