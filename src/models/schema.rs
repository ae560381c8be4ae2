//! Resolved database schema.

use serde::{Deserialize, Serialize};

/// Which database property plays each logical role.
///
/// Every slot is optional: a missing slot means the feature is unavailable
/// for this database (for example no `published` slot means every row is
/// published), never an error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseSchema {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub series_select: Option<String>,
    pub series_rich: Option<String>,
    pub tags: Option<String>,
    pub published: Option<String>,
    pub date: Option<String>,
}
