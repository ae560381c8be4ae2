// src/storage/mod.rs

//! Storage for static export artifacts.
//!
//! ## Directory Structure
//!
//! ```text
//! out/
//! ├── posts.json            # Published posts, newest first
//! ├── search-index.json     # Search documents
//! └── sitemap.xml
//! ```

pub mod local;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use local::LocalStorage;

/// Destination for exported files.
#[async_trait]
pub trait ExportStorage: Send + Sync {
    /// Write a JSON document under `key`, replacing any previous version.
    async fn write_json(&self, key: &str, value: &Value) -> Result<()>;

    /// Write a text document under `key`, replacing any previous version.
    async fn write_text(&self, key: &str, text: &str) -> Result<()>;

    /// Human-readable location of `key`, for logs.
    fn location(&self, key: &str) -> String;
}
