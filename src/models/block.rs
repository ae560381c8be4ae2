// src/models/block.rs

//! Content block tree.
//!
//! Blocks arrive from the API as loosely typed JSON objects keyed by their `type`.
//! They are parsed once into [`BlockKind`], a closed set of known kinds plus an
//! explicit [`BlockKind::Unsupported`] variant that keeps the raw payload.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::RichText;

/// One node of a page's content tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub id: String,

    pub has_children: bool,

    #[serde(flatten)]
    pub kind: BlockKind,

    /// Present whenever `has_children` is set, empty if nothing was resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<Block>>,
}

/// Known block kinds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum BlockKind {
    Paragraph(TextContent),
    #[serde(rename = "heading_1")]
    Heading1(HeadingContent),
    #[serde(rename = "heading_2")]
    Heading2(HeadingContent),
    #[serde(rename = "heading_3")]
    Heading3(HeadingContent),
    BulletedListItem(TextContent),
    NumberedListItem(TextContent),
    Code(CodeContent),
    Image(ImageContent),
    Quote(TextContent),
    Callout(CalloutContent),
    Divider,
    Toggle(TextContent),
    ColumnList,
    Column,
    Bookmark(BookmarkContent),
    /// Any type this crate does not model; rendered as pass-through
    Unsupported {
        block_type: String,
        #[serde(skip)]
        raw: Value,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HeadingContent {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub is_toggleable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeContent {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub language: String,
    #[serde(default)]
    pub caption: Vec<RichText>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageContent {
    #[serde(flatten)]
    pub source: FileSource,
    #[serde(default)]
    pub caption: Vec<RichText>,
}

/// Where a file lives: an external URL or an API-hosted signed URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FileSource {
    External { external: ExternalFile },
    File { file: HostedFile },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalFile {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostedFile {
    pub url: String,
    #[serde(default)]
    pub expiry_time: Option<String>,
}

impl FileSource {
    pub fn url(&self) -> &str {
        match self {
            FileSource::External { external } => &external.url,
            FileSource::File { file } => &file.url,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalloutContent {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub icon: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BookmarkContent {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub caption: Vec<RichText>,
}

impl Block {
    /// Parse one raw API block.
    ///
    /// Returns `None` for partial objects that carry no `type` (the API
    /// returns those when the integration lacks access). Known types whose
    /// payload does not match the expected shape degrade to `Unsupported`.
    pub fn from_raw(raw: Value) -> Option<Self> {
        let id = raw.get("id")?.as_str()?.to_string();
        let block_type = raw.get("type")?.as_str()?.to_string();
        let has_children = raw
            .get("has_children")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        let kind = BlockKind::parse(&block_type, &raw).unwrap_or_else(|| {
            log::debug!("Block {} of type '{}' kept as unsupported", id, block_type);
            BlockKind::Unsupported {
                block_type: block_type.clone(),
                raw: raw.clone(),
            }
        });

        Some(Self {
            id,
            has_children,
            kind,
            children: None,
        })
    }

    /// The API type name of this block.
    pub fn type_name(&self) -> &str {
        self.kind.type_name()
    }

    /// Resolved children, empty for leaves.
    pub fn children(&self) -> &[Block] {
        self.children.as_deref().unwrap_or(&[])
    }
}

impl BlockKind {
    fn parse(block_type: &str, raw: &Value) -> Option<Self> {
        let payload = || raw.get(block_type).cloned().unwrap_or(Value::Null);
        let text = || serde_json::from_value::<TextContent>(payload()).ok();
        let heading = || serde_json::from_value::<HeadingContent>(payload()).ok();

        let kind = match block_type {
            "paragraph" => BlockKind::Paragraph(text()?),
            "heading_1" => BlockKind::Heading1(heading()?),
            "heading_2" => BlockKind::Heading2(heading()?),
            "heading_3" => BlockKind::Heading3(heading()?),
            "bulleted_list_item" => BlockKind::BulletedListItem(text()?),
            "numbered_list_item" => BlockKind::NumberedListItem(text()?),
            "quote" => BlockKind::Quote(text()?),
            "toggle" => BlockKind::Toggle(text()?),
            "code" => BlockKind::Code(serde_json::from_value(payload()).ok()?),
            "image" => BlockKind::Image(serde_json::from_value(payload()).ok()?),
            "callout" => BlockKind::Callout(serde_json::from_value(payload()).ok()?),
            "bookmark" => BlockKind::Bookmark(serde_json::from_value(payload()).ok()?),
            "divider" => BlockKind::Divider,
            "column_list" => BlockKind::ColumnList,
            "column" => BlockKind::Column,
            _ => return None,
        };
        Some(kind)
    }

    pub fn type_name(&self) -> &str {
        match self {
            BlockKind::Paragraph(_) => "paragraph",
            BlockKind::Heading1(_) => "heading_1",
            BlockKind::Heading2(_) => "heading_2",
            BlockKind::Heading3(_) => "heading_3",
            BlockKind::BulletedListItem(_) => "bulleted_list_item",
            BlockKind::NumberedListItem(_) => "numbered_list_item",
            BlockKind::Code(_) => "code",
            BlockKind::Image(_) => "image",
            BlockKind::Quote(_) => "quote",
            BlockKind::Callout(_) => "callout",
            BlockKind::Divider => "divider",
            BlockKind::Toggle(_) => "toggle",
            BlockKind::ColumnList => "column_list",
            BlockKind::Column => "column",
            BlockKind::Bookmark(_) => "bookmark",
            BlockKind::Unsupported { block_type, .. } => block_type,
        }
    }
}

/// Depth-first search for a block id anywhere in a tree.
pub fn contains_block(blocks: &[Block], block_id: &str) -> bool {
    blocks
        .iter()
        .any(|block| block.id == block_id || contains_block(block.children(), block_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_paragraph() {
        let block = Block::from_raw(json!({
            "id": "b1",
            "type": "paragraph",
            "has_children": false,
            "paragraph": {"rich_text": [{"plain_text": "hello"}]}
        }))
        .unwrap();

        assert_eq!(block.type_name(), "paragraph");
        match &block.kind {
            BlockKind::Paragraph(content) => assert_eq!(content.rich_text[0].plain_text, "hello"),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_unknown_type_is_unsupported() {
        let block = Block::from_raw(json!({
            "id": "b2",
            "type": "synced_block",
            "has_children": true,
            "synced_block": {}
        }))
        .unwrap();

        assert!(matches!(block.kind, BlockKind::Unsupported { .. }));
        assert_eq!(block.type_name(), "synced_block");
        assert!(block.has_children);
    }

    #[test]
    fn test_malformed_known_type_degrades() {
        let block = Block::from_raw(json!({
            "id": "b3",
            "type": "image",
            "image": {"type": "file"}
        }))
        .unwrap();
        assert!(matches!(block.kind, BlockKind::Unsupported { .. }));
    }

    #[test]
    fn test_partial_block_is_skipped() {
        assert!(Block::from_raw(json!({"id": "b4", "object": "block"})).is_none());
    }

    #[test]
    fn test_image_source_url() {
        let block = Block::from_raw(json!({
            "id": "img",
            "type": "image",
            "image": {
                "type": "file",
                "file": {"url": "https://s3.example.com/a.png?sig=1", "expiry_time": "2026-01-01T00:00:00Z"},
                "caption": []
            }
        }))
        .unwrap();

        match block.kind {
            BlockKind::Image(image) => assert_eq!(image.source.url(), "https://s3.example.com/a.png?sig=1"),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_contains_block_nested() {
        let mut parent = Block::from_raw(json!({"id": "p", "type": "toggle", "toggle": {}})).unwrap();
        let child = Block::from_raw(json!({"id": "c", "type": "divider"})).unwrap();
        parent.children = Some(vec![child]);

        let tree = vec![parent];
        assert!(contains_block(&tree, "c"));
        assert!(!contains_block(&tree, "missing"));
    }
}
