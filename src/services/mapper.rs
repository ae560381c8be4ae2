// src/services/mapper.rs

//! Row-to-post mapping.

use std::sync::LazyLock;

use percent_encoding::percent_decode_str;
use regex::Regex;

use crate::models::{DatabaseSchema, Post, plain_text};
use crate::notion::{PageObject, PropertyValue};

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s/]+").expect("separator regex should compile"));

static DISALLOWED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\p{L}\p{N}-]+").expect("slug charset regex should compile"));

static DASH_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-+").expect("dash regex should compile"));

/// Make a URL-safe slug, keeping Unicode letters and digits.
pub fn slugify(input: &str) -> String {
    let lowered = input.to_lowercase();
    let dashed = SEPARATORS.replace_all(lowered.trim(), "-");
    let cleaned = DISALLOWED.replace_all(&dashed, "");
    let collapsed = DASH_RUNS.replace_all(&cleaned, "-");
    collapsed.trim_matches('-').to_string()
}

/// Percent-decode a slug taken from a URL, or return it unchanged if it is not valid UTF-8.
pub fn normalize_slug(slug: &str) -> String {
    percent_decode_str(slug)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| slug.to_string())
}

/// Map one database row to a post. Never fails; missing roles give empty values.
pub fn page_to_post(page: &PageObject, schema: &DatabaseSchema) -> Post {
    let prop = |slot: &Option<String>| slot.as_deref().and_then(|name| page.property(name));

    let title = match prop(&schema.title) {
        Some(PropertyValue::Title { title }) => plain_text(&title),
        _ => String::new(),
    };
    let rich = |slot: &Option<String>| match prop(slot) {
        Some(PropertyValue::RichText { rich_text }) => plain_text(&rich_text),
        _ => String::new(),
    };

    let raw_slug = rich(&schema.slug);
    let slug = [raw_slug, slugify(&title), page.id.replace('-', "")]
        .into_iter()
        .find(|candidate| !candidate.is_empty())
        .unwrap_or_default();

    let description = rich(&schema.description);

    let series_select = match prop(&schema.series_select) {
        Some(PropertyValue::Select {
            select: Some(option),
        }) => Some(option.name),
        _ => None,
    };
    let series = series_select.or_else(|| {
        let text = rich(&schema.series_rich);
        (!text.is_empty()).then_some(text)
    });

    let tags = match prop(&schema.tags) {
        Some(PropertyValue::MultiSelect { multi_select }) => {
            multi_select.into_iter().map(|option| option.name).collect()
        }
        _ => Vec::new(),
    };

    let published = match &schema.published {
        None => true,
        Some(_) => matches!(
            prop(&schema.published),
            Some(PropertyValue::Checkbox {
                checkbox: Some(true)
            })
        ),
    };

    let date = match prop(&schema.date) {
        Some(PropertyValue::Date {
            date: Some(value),
        }) => value.start,
        _ => None,
    }
    .or_else(|| page.created_time.clone())
    .unwrap_or_default();

    Post {
        id: page.id.clone(),
        title,
        slug,
        description,
        series,
        tags,
        published,
        date,
        icon: page.icon(),
        cover: page.cover_url(),
    }
}
