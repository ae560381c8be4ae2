// src/services/mod.rs

//! Service layer for the blog backend.
//!
//! This module contains the business logic for:
//! - Schema resolution (`resolve_schema`)
//! - Row-to-post mapping (`page_to_post`)
//! - Cached content reads (`ContentFetcher`)
//! - Link preview metadata (`BookmarkResolver`)

pub mod bookmark;
pub mod fetcher;
pub mod mapper;
pub mod schema;

pub use bookmark::{BookmarkMetadata, BookmarkPreview, BookmarkResolver};
pub use fetcher::{ContentFetcher, PostMediaUrls};
pub use mapper::{normalize_slug, page_to_post, slugify};
pub use schema::{normalize_key, resolve_schema};
