//! In-memory content source for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::notion::{ContentSource, DatabaseQuery, ListPage};

pub const DATABASE_ID: &str = "db-test";

/// Fake database with call counters and a configurable page size.
pub struct FakeSource {
    pub database: Mutex<Value>,
    pub pages: Mutex<Vec<Value>>,
    pub children: Mutex<HashMap<String, Vec<Value>>>,
    pub blocks: Mutex<HashMap<String, Value>>,
    pub page_size: usize,
    pub fail: AtomicBool,
    pub database_calls: AtomicUsize,
    pub query_calls: AtomicUsize,
    pub children_calls: AtomicUsize,
    pub page_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::with_page_size(100)
    }

    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            database: Mutex::new(standard_database()),
            pages: Mutex::new(Vec::new()),
            children: Mutex::new(HashMap::new()),
            blocks: Mutex::new(HashMap::new()),
            page_size,
            fail: AtomicBool::new(false),
            database_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
            children_calls: AtomicUsize::new(0),
            page_calls: AtomicUsize::new(0),
        }
    }

    pub fn add_page(&self, page: Value) {
        self.pages.lock().push(page);
    }

    /// Register children of a block; also makes each child retrievable.
    pub fn set_children(&self, parent: &str, blocks: Vec<Value>) {
        let mut index = self.blocks.lock();
        for block in &blocks {
            if let Some(id) = block["id"].as_str() {
                index.insert(id.to_string(), block.clone());
            }
        }
        self.children.lock().insert(parent.to_string(), blocks);
    }

    pub fn calls(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::Notion {
                status: 502,
                code: "service_unavailable".into(),
                message: "upstream down".into(),
            });
        }
        Ok(())
    }

    fn paginate(&self, items: Vec<Value>, cursor: Option<&str>, requested: usize) -> ListPage {
        let size = self.page_size.min(requested.max(1));
        let start: usize = cursor.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + size).min(items.len());
        let has_more = end < items.len();
        ListPage {
            results: items.get(start..end).map(<[Value]>::to_vec).unwrap_or_default(),
            has_more,
            next_cursor: has_more.then(|| end.to_string()),
        }
    }
}

#[async_trait]
impl ContentSource for FakeSource {
    async fn retrieve_database(&self, _database_id: &str) -> Result<Value> {
        self.database_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        Ok(self.database.lock().clone())
    }

    async fn query_database(&self, _database_id: &str, query: &DatabaseQuery) -> Result<ListPage> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let matching: Vec<Value> = self
            .pages
            .lock()
            .iter()
            .filter(|page| query.filter.as_ref().is_none_or(|f| matches_filter(page, f)))
            .cloned()
            .collect();
        Ok(self.paginate(
            matching,
            query.start_cursor.as_deref(),
            query.page_size as usize,
        ))
    }

    async fn list_block_children(
        &self,
        block_id: &str,
        start_cursor: Option<&str>,
        page_size: u32,
    ) -> Result<ListPage> {
        self.children_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        let children = self.children.lock().get(block_id).cloned().unwrap_or_default();
        Ok(self.paginate(children, start_cursor, page_size as usize))
    }

    async fn retrieve_page(&self, page_id: &str) -> Result<Value> {
        self.page_calls.fetch_add(1, Ordering::SeqCst);
        self.check()?;
        self.pages
            .lock()
            .iter()
            .find(|page| page["id"] == page_id)
            .cloned()
            .ok_or_else(|| not_found(page_id))
    }

    async fn retrieve_block(&self, block_id: &str) -> Result<Value> {
        self.check()?;
        self.blocks
            .lock()
            .get(block_id)
            .cloned()
            .ok_or_else(|| not_found(block_id))
    }
}

fn not_found(id: &str) -> AppError {
    AppError::Notion {
        status: 404,
        code: "object_not_found".into(),
        message: format!("Could not find {}", id),
    }
}

/// Evaluate the subset of the filter language the fetcher emits.
fn matches_filter(page: &Value, filter: &Value) -> bool {
    if let Some(all) = filter.get("and").and_then(Value::as_array) {
        return all.iter().all(|f| matches_filter(page, f));
    }
    let Some(name) = filter.get("property").and_then(Value::as_str) else {
        return true;
    };
    let property = &page["properties"][name];

    if let Some(expected) = filter.pointer("/checkbox/equals") {
        return property["checkbox"] == *expected;
    }
    if let Some(expected) = filter.pointer("/rich_text/equals").and_then(Value::as_str) {
        let text: String = property["rich_text"]
            .as_array()
            .map(|runs| runs.iter().filter_map(|r| r["plain_text"].as_str()).collect())
            .unwrap_or_default();
        return text == expected;
    }
    if let Some(expected) = filter.pointer("/multi_select/contains").and_then(Value::as_str) {
        return property["multi_select"]
            .as_array()
            .is_some_and(|opts| opts.iter().any(|o| o["name"] == expected));
    }
    true
}

/// Database with one property per role.
///
/// The series text column uses its Korean alias so it never falls back to `Slug`.
pub fn standard_database() -> Value {
    json!({
        "object": "database",
        "id": DATABASE_ID,
        "properties": {
            "Name": {"type": "title", "title": {}},
            "Slug": {"type": "rich_text", "rich_text": {}},
            "Description": {"type": "rich_text", "rich_text": {}},
            "Series": {"type": "select", "select": {}},
            "시리즈": {"type": "rich_text", "rich_text": {}},
            "Tags": {"type": "multi_select", "multi_select": {}},
            "Published": {"type": "checkbox", "checkbox": {}},
            "Date": {"type": "date", "date": {}}
        }
    })
}

fn runs(text: &str) -> Value {
    if text.is_empty() {
        json!([])
    } else {
        json!([{"type": "text", "plain_text": text}])
    }
}

/// Row in the standard database.
pub fn page(id: &str, title: &str, slug: &str, tags: &[&str], published: bool, date: &str) -> Value {
    let tags: Vec<Value> = tags.iter().map(|t| json!({"name": t})).collect();
    json!({
        "object": "page",
        "id": id,
        "created_time": "2024-01-01T00:00:00.000Z",
        "parent": {"type": "database_id", "database_id": DATABASE_ID},
        "properties": {
            "Name": {"type": "title", "title": runs(title)},
            "Slug": {"type": "rich_text", "rich_text": runs(slug)},
            "Description": {"type": "rich_text", "rich_text": runs("")},
            "Series": {"type": "select", "select": null},
            "시리즈": {"type": "rich_text", "rich_text": runs("")},
            "Tags": {"type": "multi_select", "multi_select": tags},
            "Published": {"type": "checkbox", "checkbox": published},
            "Date": {"type": "date", "date": if date.is_empty() { Value::Null } else { json!({"start": date}) }}
        }
    })
}

/// Set the series select option of a fixture row.
pub fn with_series(mut page: Value, series: &str) -> Value {
    page["properties"]["Series"]["select"] = json!({"name": series});
    page
}

/// Text block of any text-bearing type.
pub fn text_block(id: &str, block_type: &str, text: &str, has_children: bool) -> Value {
    json!({
        "object": "block",
        "id": id,
        "type": block_type,
        "has_children": has_children,
        block_type: {"rich_text": runs(text)}
    })
}

pub fn image_block(id: &str, url: &str) -> Value {
    json!({
        "object": "block",
        "id": id,
        "type": "image",
        "has_children": false,
        "image": {"type": "file", "file": {"url": url, "expiry_time": "2030-01-01T00:00:00.000Z"}, "caption": []}
    })
}
