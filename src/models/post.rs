// src/models/post.rs

//! Post data structure.

use serde::{Deserialize, Serialize};

/// A blog post mapped from one row of the content database.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Post {
    /// Row identifier assigned by the content API
    pub id: String,

    pub title: String,

    /// URL-safe identifier, never empty
    pub slug: String,

    pub description: String,

    /// Optional grouping label
    pub series: Option<String>,

    pub tags: Vec<String>,

    pub published: bool,

    /// Date string as delivered (ISO date or timestamp), may be empty
    pub date: String,

    pub icon: Option<PostIcon>,

    /// Cover image URL, possibly signed and expiring
    pub cover: Option<String>,
}

/// Page icon: either an inline emoji or a remote image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PostIcon {
    Emoji { emoji: String },
    Image { url: String },
}

impl PostIcon {
    /// Image URL if this icon is remote.
    pub fn image_url(&self) -> Option<&str> {
        match self {
            PostIcon::Image { url } => Some(url),
            PostIcon::Emoji { .. } => None,
        }
    }
}

impl Post {
    /// Site-relative path of this post's page.
    pub fn path(&self) -> String {
        crate::utils::post_path(&self.slug)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}
