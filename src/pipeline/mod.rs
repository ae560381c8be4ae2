// src/pipeline/mod.rs

//! Derived content: plain text, reading stats, related posts, table of
//! contents, sitemap and the static export.

pub mod derive;
pub mod export;
pub mod sitemap;
pub mod toc;

pub use derive::{
    estimate_reading_stats, extract_plain_text, parse_post_date, related_posts, score_related,
};
pub use export::{ExportSummary, run_export};
pub use sitemap::{SitemapEntry, render_sitemap, sitemap_entries};
pub use toc::{extract_toc, heading_id};
