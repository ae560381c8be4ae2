// src/pipeline/sitemap.rs

//! `sitemap.xml` generation.

use chrono::{DateTime, SecondsFormat, Utc};

use crate::models::Post;
use crate::pipeline::derive::parse_post_date;

/// One `<url>` entry.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapEntry {
    pub loc: String,
    pub last_modified: DateTime<Utc>,
    pub change_frequency: &'static str,
    pub priority: f32,
}

/// Site root (daily, 1.0) followed by one entry per post (weekly, 0.8).
///
/// Posts without a parseable date use `now` as their modification time.
pub fn sitemap_entries(site_url: &str, posts: &[Post], now: DateTime<Utc>) -> Vec<SitemapEntry> {
    let site_url = site_url.trim_end_matches('/');
    let mut entries = vec![SitemapEntry {
        loc: site_url.to_string(),
        last_modified: now,
        change_frequency: "daily",
        priority: 1.0,
    }];

    entries.extend(posts.iter().map(|post| SitemapEntry {
        loc: format!("{}{}", site_url, post.path()),
        last_modified: parse_post_date(&post.date).unwrap_or(now),
        change_frequency: "weekly",
        priority: 0.8,
    }));
    entries
}

/// Render entries as a sitemap document.
pub fn render_sitemap(entries: &[SitemapEntry]) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for entry in entries {
        xml.push_str("<url>\n");
        xml.push_str(&format!("<loc>{}</loc>\n", escape_xml(&entry.loc)));
        xml.push_str(&format!(
            "<lastmod>{}</lastmod>\n",
            entry.last_modified.to_rfc3339_opts(SecondsFormat::Millis, true)
        ));
        xml.push_str(&format!("<changefreq>{}</changefreq>\n", entry.change_frequency));
        xml.push_str(&format!("<priority>{}</priority>\n", entry.priority));
        xml.push_str("</url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

fn escape_xml(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}
