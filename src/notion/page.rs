//! Page objects and their property values.

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::models::{PostIcon, RichText};

/// A database row as returned by the pages and query endpoints.
///
/// Property values keep the source order of the database.
#[derive(Debug, Clone, Deserialize)]
pub struct PageObject {
    pub id: String,

    #[serde(default)]
    pub created_time: Option<String>,

    #[serde(default)]
    pub parent: Option<Value>,

    #[serde(default)]
    pub properties: Map<String, Value>,

    #[serde(default)]
    pub icon: Option<Value>,

    #[serde(default)]
    pub cover: Option<Value>,
}

/// A typed property value. Unknown types collapse into `Other`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Title {
        #[serde(default)]
        title: Vec<RichText>,
    },
    RichText {
        #[serde(default)]
        rich_text: Vec<RichText>,
    },
    Select {
        #[serde(default)]
        select: Option<SelectOption>,
    },
    MultiSelect {
        #[serde(default)]
        multi_select: Vec<SelectOption>,
    },
    Checkbox {
        #[serde(default)]
        checkbox: Option<bool>,
    },
    Date {
        #[serde(default)]
        date: Option<DateValue>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SelectOption {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DateValue {
    #[serde(default)]
    pub start: Option<String>,
}

impl PageObject {
    /// Parse a raw page. Partial objects without `properties` are rejected.
    pub fn from_raw(raw: Value) -> Option<Self> {
        raw.get("properties")?;
        serde_json::from_value(raw).ok()
    }

    /// Typed value of a named property. Shape mismatches yield `None`.
    pub fn property(&self, name: &str) -> Option<PropertyValue> {
        let raw = self.properties.get(name)?;
        serde_json::from_value(raw.clone()).ok()
    }

    /// Parent database id when the page lives in a database.
    pub fn parent_database_id(&self) -> Option<&str> {
        let parent = self.parent.as_ref()?;
        if parent.get("type")?.as_str()? != "database_id" {
            return None;
        }
        parent.get("database_id")?.as_str()
    }

    /// Cover URL for external or hosted covers.
    pub fn cover_url(&self) -> Option<String> {
        self.cover.as_ref().and_then(file_url)
    }

    /// Page icon normalized to emoji or image.
    pub fn icon(&self) -> Option<PostIcon> {
        let icon = self.icon.as_ref()?;
        match icon.get("type")?.as_str()? {
            "emoji" => Some(PostIcon::Emoji {
                emoji: icon.get("emoji")?.as_str()?.to_string(),
            }),
            "external" | "file" => file_url(icon).map(|url| PostIcon::Image { url }),
            _ => None,
        }
    }
}

/// URL of an `{type: external|file, external|file: {url}}` object.
pub(crate) fn file_url(value: &Value) -> Option<String> {
    let kind = value.get("type")?.as_str()?;
    if kind != "external" && kind != "file" {
        return None;
    }
    value
        .get(kind)?
        .get("url")?
        .as_str()
        .map(str::to_string)
}
