// src/services/schema.rs

//! Schema resolution.
//!
//! Decides which database property plays each logical role, tolerating
//! renamed and localized column names.

use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::DatabaseSchema;

/// A logical role with its accepted names and required property type.
struct Role {
    aliases: &'static [&'static str],
    property_type: &'static str,
}

const TITLE: Role = Role {
    aliases: &["title", "이름", "name"],
    property_type: "title",
};
const SLUG: Role = Role {
    aliases: &["slug", "슬러그"],
    property_type: "rich_text",
};
const DESCRIPTION: Role = Role {
    aliases: &["description", "요약", "설명", "excerpt"],
    property_type: "rich_text",
};
const SERIES_SELECT: Role = Role {
    aliases: &["series", "시리즈"],
    property_type: "select",
};
const SERIES_RICH: Role = Role {
    aliases: &["series", "시리즈"],
    property_type: "rich_text",
};
const TAGS: Role = Role {
    aliases: &["tags", "tag", "태그"],
    property_type: "multi_select",
};
const PUBLISHED: Role = Role {
    aliases: &["published", "publish", "공개", "게시"],
    property_type: "checkbox",
};
const DATE: Role = Role {
    aliases: &["date", "publishedat", "날짜"],
    property_type: "date",
};

/// Lowercase and strip whitespace, `_` and `-`.
pub fn normalize_key(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '_' && *c != '-')
        .collect()
}

/// Pick the property for a role: an alias match of the right type first,
/// then the first property of that type in source order.
fn find_property(properties: &Map<String, Value>, role: &Role) -> Option<String> {
    let typed = || {
        properties.iter().filter(|(_, def)| {
            def.get("type").and_then(Value::as_str) == Some(role.property_type)
        })
    };

    typed()
        .find(|(name, _)| {
            let key = normalize_key(name);
            role.aliases.iter().any(|alias| normalize_key(alias) == key)
        })
        .or_else(|| typed().next())
        .map(|(name, _)| name.clone())
}

/// Resolve every role from a raw database object.
pub fn resolve_schema(database: &Value) -> Result<DatabaseSchema> {
    let properties = database
        .get("properties")
        .and_then(Value::as_object)
        .ok_or_else(|| AppError::malformed("databases.retrieve", "missing properties"))?;

    Ok(DatabaseSchema {
        title: find_property(properties, &TITLE),
        slug: find_property(properties, &SLUG),
        description: find_property(properties, &DESCRIPTION),
        series_select: find_property(properties, &SERIES_SELECT),
        series_rich: find_property(properties, &SERIES_RICH),
        tags: find_property(properties, &TAGS),
        published: find_property(properties, &PUBLISHED),
        date: find_property(properties, &DATE),
    })
}
