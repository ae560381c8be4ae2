// src/utils/url.rs

//! URL and route path utilities.

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::Serialize;
use url::Url;

/// Characters escaped in a path segment, matching `encodeURIComponent`.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// Percent-encode one path segment.
pub fn encode_component(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

/// Path of a post page.
///
/// # Examples
/// ```
/// use notion_blog::utils::url::post_path;
///
/// assert_eq!(post_path("hello world"), "/posts/hello%20world");
/// ```
pub fn post_path(slug: &str) -> String {
    format!("/posts/{}", encode_component(slug))
}

/// Path of a tag listing page.
pub fn tag_path(tag: &str) -> String {
    format!("/tags/{}", encode_component(tag))
}

/// Path of a series listing page.
pub fn series_path(series: &str) -> String {
    format!("/series/{}", encode_component(series))
}

/// Resolve a potentially relative URL against a base URL.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    base.join(href.trim()).ok().map(|u| u.to_string())
}

/// Hosts that must never be fetched server-side.
pub fn is_blocked_host(host: &str) -> bool {
    let host = host.trim_start_matches('[').trim_end_matches(']').to_lowercase();

    if host == "localhost" || host == "::1" || host == "0.0.0.0" || host.ends_with(".local") {
        return true;
    }
    if host.starts_with("127.")
        || host.starts_with("10.")
        || host.starts_with("192.168.")
        || host.starts_with("169.254.")
    {
        return true;
    }

    // 172.16.0.0/12
    if let Some(rest) = host.strip_prefix("172.") {
        if let Some(second) = rest.split('.').next().and_then(|s| s.parse::<u8>().ok()) {
            return (16..=31).contains(&second);
        }
    }
    false
}

/// Display parts of a bookmark link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookmarkUrl {
    pub href: String,
    /// Host without a leading `www.`
    pub host: String,
    /// Host plus path, without a bare `/`
    pub label: String,
}

/// Split a bookmark URL into display parts. Unparseable input keeps its text
/// as href and label under a generic host.
pub fn parse_bookmark_url(raw: &str) -> BookmarkUrl {
    match Url::parse(raw) {
        Ok(url) => {
            let host = url
                .host_str()
                .unwrap_or_default()
                .trim_start_matches("www.")
                .to_string();
            let path = match url.path() {
                "/" => "",
                path => path,
            };
            BookmarkUrl {
                href: url.to_string(),
                label: format!("{}{}", host, path),
                host,
            }
        }
        Err(_) => BookmarkUrl {
            href: raw.to_string(),
            host: "external-link".to_string(),
            label: raw.to_string(),
        },
    }
}
