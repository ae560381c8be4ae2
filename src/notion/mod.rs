// src/notion/mod.rs

//! Content API access.
//!
//! [`ContentSource`] is the seam between the blog and the hosted database
//! service. Production uses [`HttpNotionClient`]; tests use an in-memory
//! fake. Responses stay as loosely typed JSON at this layer and are parsed
//! into domain models by the services.

mod client;
mod page;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::Result;

pub use client::HttpNotionClient;
pub use page::{DateValue, PageObject, PropertyValue, SelectOption};

/// Body of a database query request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DatabaseQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sorts: Vec<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_cursor: Option<String>,

    pub page_size: u32,
}

impl DatabaseQuery {
    pub fn new(page_size: u32) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    pub fn filter(mut self, filter: Option<Value>) -> Self {
        self.filter = filter;
        self
    }

    pub fn sorts(mut self, sorts: Vec<Value>) -> Self {
        self.sorts = sorts;
        self
    }

    pub fn cursor(mut self, cursor: Option<String>) -> Self {
        self.start_cursor = cursor;
        self
    }
}

/// One page of a paginated list response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPage {
    #[serde(default)]
    pub results: Vec<Value>,

    #[serde(default)]
    pub has_more: bool,

    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl ListPage {
    /// Cursor for the following page, if any.
    pub fn next(&self) -> Option<String> {
        if self.has_more {
            self.next_cursor.clone()
        } else {
            None
        }
    }
}

/// Read access to the content database.
#[async_trait]
pub trait ContentSource: Send + Sync {
    /// Database object including its property definitions.
    async fn retrieve_database(&self, database_id: &str) -> Result<Value>;

    async fn query_database(&self, database_id: &str, query: &DatabaseQuery) -> Result<ListPage>;

    async fn list_block_children(
        &self,
        block_id: &str,
        start_cursor: Option<&str>,
        page_size: u32,
    ) -> Result<ListPage>;

    async fn retrieve_page(&self, page_id: &str) -> Result<Value>;

    async fn retrieve_block(&self, block_id: &str) -> Result<Value>;
}

// --- Filter and sort builders ---

/// `{property, checkbox: {equals: true}}`
pub fn checkbox_true(property: &str) -> Value {
    json!({ "property": property, "checkbox": { "equals": true } })
}

/// `{property, rich_text: {equals}}`
pub fn rich_text_equals(property: &str, value: &str) -> Value {
    json!({ "property": property, "rich_text": { "equals": value } })
}

/// `{property, multi_select: {contains}}`
pub fn multi_select_contains(property: &str, value: &str) -> Value {
    json!({ "property": property, "multi_select": { "contains": value } })
}

/// Combine filters with `and`; a single filter is returned as is.
pub fn and(mut filters: Vec<Value>) -> Option<Value> {
    match filters.len() {
        0 => None,
        1 => filters.pop(),
        _ => Some(json!({ "and": filters })),
    }
}

/// Newest first, by the date property or by creation time.
pub fn newest_first(date_property: Option<&str>) -> Vec<Value> {
    match date_property {
        Some(property) => vec![json!({ "property": property, "direction": "descending" })],
        None => vec![json!({ "timestamp": "created_time", "direction": "descending" })],
    }
}

/// Compare two API ids ignoring dashes and case.
pub fn same_id(a: &str, b: &str) -> bool {
    let normalize = |s: &str| s.replace('-', "").to_lowercase();
    normalize(a) == normalize(b)
}
