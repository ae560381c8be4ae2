// src/pipeline/toc.rs

//! Table of contents extraction.

use crate::models::{Block, BlockKind, TocHeading, plain_text};

/// Text used when a heading has no visible text.
const UNTITLED: &str = "제목";

/// Anchor id of a heading block.
pub fn heading_id(block_id: &str) -> String {
    format!("heading-{}", block_id.replace('-', ""))
}

/// Headings of a block tree in document order, including nested ones.
pub fn extract_toc(blocks: &[Block]) -> Vec<TocHeading> {
    let mut headings = Vec::new();
    walk(blocks, &mut headings);
    headings
}

fn walk(blocks: &[Block], out: &mut Vec<TocHeading>) {
    for block in blocks {
        let heading = match &block.kind {
            BlockKind::Heading1(h) => Some((1, h)),
            BlockKind::Heading2(h) => Some((2, h)),
            BlockKind::Heading3(h) => Some((3, h)),
            _ => None,
        };

        if let Some((level, content)) = heading {
            let text = plain_text(&content.rich_text).trim().to_string();
            out.push(TocHeading {
                id: heading_id(&block.id),
                text: if text.is_empty() { UNTITLED.to_string() } else { text },
                level,
            });
        }

        walk(block.children(), out);
    }
}
