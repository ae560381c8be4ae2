//! Rich text runs as delivered by the content API.

use serde::{Deserialize, Serialize};

/// One run of styled text. A field's display text is the concatenation of its runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RichText {
    /// Run kind (`text`, `mention`, `equation`)
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,

    #[serde(default)]
    pub plain_text: String,

    #[serde(default)]
    pub href: Option<String>,

    #[serde(default)]
    pub annotations: Annotations,
}

/// Per-run styling flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Annotations {
    pub bold: bool,
    pub italic: bool,
    pub strikethrough: bool,
    pub underline: bool,
    pub code: bool,
    pub color: String,
}

fn default_kind() -> String {
    "text".to_string()
}

impl RichText {
    /// Plain unstyled run, mostly useful for fixtures.
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            kind: default_kind(),
            plain_text: text.into(),
            href: None,
            annotations: Annotations::default(),
        }
    }
}

/// Concatenate the plain text of a run list.
pub fn plain_text(runs: &[RichText]) -> String {
    runs.iter().map(|run| run.plain_text.as_str()).collect()
}
