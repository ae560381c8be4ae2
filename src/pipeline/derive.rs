// src/pipeline/derive.rs

//! Content derivation: plain text, reading time and related posts.
//!
//! Everything here is pure and total. Malformed input yields empty or zero
//! results, never an error.

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::{Block, BlockKind, Post, ReadingStats, plain_text};

/// Default reading speed.
pub const WORDS_PER_MINUTE: usize = 300;

/// Days over which the recency bonus decays from 2 to 0.
const RECENCY_WINDOW_DAYS: f64 = 60.0;

/// Depth-first plain text of a block tree, one trimmed fragment per line.
///
/// Only text-bearing kinds contribute; structural blocks (columns, dividers,
/// images, unsupported types) are skipped but their children are still walked.
pub fn extract_plain_text(blocks: &[Block]) -> String {
    let mut fragments = Vec::new();
    collect_text(blocks, &mut fragments);

    fragments
        .iter()
        .map(|fragment| fragment.trim())
        .filter(|fragment| !fragment.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(blocks: &[Block], out: &mut Vec<String>) {
    for block in blocks {
        match &block.kind {
            BlockKind::Paragraph(c)
            | BlockKind::BulletedListItem(c)
            | BlockKind::NumberedListItem(c)
            | BlockKind::Quote(c)
            | BlockKind::Toggle(c) => out.push(plain_text(&c.rich_text)),
            BlockKind::Heading1(h) | BlockKind::Heading2(h) | BlockKind::Heading3(h) => {
                out.push(plain_text(&h.rich_text))
            }
            BlockKind::Callout(c) => out.push(plain_text(&c.rich_text)),
            BlockKind::Code(c) => out.push(plain_text(&c.rich_text)),
            BlockKind::Bookmark(b) => {
                out.push(b.url.clone());
                out.push(plain_text(&b.caption));
            }
            BlockKind::Image(_)
            | BlockKind::Divider
            | BlockKind::ColumnList
            | BlockKind::Column
            | BlockKind::Unsupported { .. } => {}
        }
        collect_text(block.children(), out);
    }
}

/// Whitespace word count and minutes at `words_per_minute`, at least one minute.
pub fn estimate_reading_stats(text: &str, words_per_minute: usize) -> ReadingStats {
    let words = text.split_whitespace().count();
    let minutes = words.div_ceil(words_per_minute.max(1)).max(1);
    ReadingStats { words, minutes }
}

/// First `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}

/// Parse a post date: RFC 3339 timestamp or plain `YYYY-MM-DD` (UTC midnight).
pub fn parse_post_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(value) {
        return Some(timestamp.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Relatedness of `candidate` to `current`.
///
/// Shared tags weigh 4 each, a shared series 5, plus a recency bonus of
/// `max(0, 2 - days_apart / 60)`. Unparseable dates give no bonus.
pub fn score_related(current: &Post, candidate: &Post) -> f64 {
    let shared_tags = candidate
        .tags
        .iter()
        .filter(|tag| current.tags.contains(tag))
        .count() as f64;

    let same_series = match (&current.series, &candidate.series) {
        (Some(a), Some(b)) if !a.is_empty() && a == b => 1.0,
        _ => 0.0,
    };

    let recency = match (parse_post_date(&current.date), parse_post_date(&candidate.date)) {
        (Some(a), Some(b)) => {
            let days = (a - b).num_milliseconds().abs() as f64 / 86_400_000.0;
            (2.0 - days / RECENCY_WINDOW_DAYS).max(0.0)
        }
        _ => 0.0,
    };

    shared_tags * 4.0 + same_series * 5.0 + recency
}

/// Top `limit` posts by relatedness, excluding `current`. Ties keep listing order.
pub fn related_posts(current: &Post, posts: &[Post], limit: usize) -> Vec<Post> {
    let mut scored: Vec<(f64, &Post)> = posts
        .iter()
        .filter(|post| post.id != current.id)
        .map(|post| (score_related(current, post), post))
        .collect();

    scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
    scored
        .into_iter()
        .take(limit)
        .map(|(_, post)| post.clone())
        .collect()
}
