// src/models/mod.rs

//! Domain models for the blog backend.
//!
//! Posts and blocks are the typed projections of the content database.
//! Everything downstream (derivation, rendering routes, search) works on
//! these types and never on raw API JSON.

mod block;
mod config;
mod post;
mod rich_text;
mod schema;
mod search;

// Re-export all public types
pub use block::{
    Block, BlockKind, BookmarkContent, CalloutContent, CodeContent, ExternalFile, FileSource,
    HeadingContent, HostedFile, ImageContent, TextContent, contains_block,
};
pub use config::{
    BookmarkConfig, CacheConfig, Config, ContentConfig, Environment, NotionConfig, SecretsConfig,
    ServerConfig,
};
pub use post::{Post, PostIcon};
pub use rich_text::{Annotations, RichText, plain_text};
pub use schema::DatabaseSchema;
pub use search::{ReadingStats, SearchDocument, TocHeading};
