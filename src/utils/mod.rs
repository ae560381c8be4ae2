// src/utils/mod.rs

//! Utility functions and helpers.

pub mod http;
pub mod url;

pub use url::{encode_component, post_path, series_path, tag_path};

/// Trimmed string, or `None` when blank.
pub fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
