// src/lib.rs

//! Notion-backed blog backend.
//!
//! Reads posts and block trees from a content database, derives search,
//! reading and navigation data from them, keeps everything behind tagged
//! caches, and exposes revalidation and media-refresh endpoints.
//!
//! - [`services`]: schema resolution, row mapping, cached fetching, bookmarks
//! - [`pipeline`]: pure derivations and static export
//! - [`cache`] and [`revalidate`]: invalidation by tag and path
//! - [`media`]: expiring media URL rehydration
//! - `server` (feature `server`): the HTTP surface

pub mod cache;
pub mod config;
pub mod error;
pub mod media;
pub mod models;
pub mod notion;
pub mod pipeline;
pub mod revalidate;
#[cfg(feature = "server")]
pub mod server;
pub mod services;
pub mod storage;
pub mod utils;
