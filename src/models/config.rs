//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
///
/// Loaded from an optional TOML file, then overridden from the environment.
/// Secrets are usually only provided through the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Content API access
    #[serde(default)]
    pub notion: NotionConfig,

    /// Cache lifetimes
    #[serde(default)]
    pub cache: CacheConfig,

    /// Content fetching and derivation knobs
    #[serde(default)]
    pub content: ContentConfig,

    /// Shared secrets and admin identity
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// HTTP server settings
    #[serde(default)]
    pub server: ServerConfig,

    /// Link preview fetching
    #[serde(default)]
    pub bookmark: BookmarkConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Load the TOML file (if any) and apply environment overrides.
    pub fn from_env(path: impl AsRef<Path>) -> Self {
        let mut config = if path.as_ref().exists() {
            Self::load_or_default(path)
        } else {
            Self::default()
        };
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Override values from environment-style lookups.
    ///
    /// Takes a lookup function so tests can feed a fixed map.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| var(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = non_empty("NOTION_API_KEY") {
            self.notion.api_key = Some(key);
        }
        if let Some(id) = non_empty("NOTION_DATABASE_ID") {
            self.notion.database_id = Some(id);
        }
        if let Some(url) = non_empty("NOTION_API_BASE_URL") {
            self.notion.api_base_url = url;
        }
        if let Some(secret) = non_empty("NOTION_WEBHOOK_VERIFICATION_TOKEN") {
            self.secrets.webhook_secret = Some(secret);
        }
        if let Some(secret) = non_empty("NOTION_REVALIDATE_SECRET") {
            self.secrets.revalidate_secret = Some(secret);
        }
        if let Some(login) = non_empty("ADMIN_GITHUB_LOGIN") {
            self.secrets.admin_github_login = Some(login);
        }
        if let Some(url) = non_empty("NEXT_PUBLIC_SITE_URL") {
            self.server.site_url = url;
        }
        if let Some(addr) = non_empty("BIND_ADDR") {
            self.server.bind_addr = addr;
        }
        if let Some(env) = non_empty("APP_ENV") {
            self.cache.environment = Environment::parse(&env);
        }
        if let Some(secs) = non_empty("CACHE_TTL_SECS").and_then(|v| v.parse().ok()) {
            self.cache.ttl_secs = Some(secs);
        }
        if let Some(depth) = non_empty("MAX_BLOCK_DEPTH").and_then(|v| v.parse().ok()) {
            self.content.max_block_depth = depth;
        }
        if let Some(secs) = non_empty("NOTION_TIMEOUT_SECS").and_then(|v| v.parse().ok()) {
            self.notion.timeout_secs = secs;
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.notion.user_agent.trim().is_empty() {
            return Err(AppError::validation("notion.user_agent is empty"));
        }
        if self.notion.timeout_secs == 0 {
            return Err(AppError::validation("notion.timeout_secs must be > 0"));
        }
        if self.notion.page_size == 0 || self.notion.page_size > 100 {
            return Err(AppError::validation("notion.page_size must be within 1..=100"));
        }
        if self.content.max_block_depth == 0 {
            return Err(AppError::validation("content.max_block_depth must be > 0"));
        }
        if self.content.words_per_minute == 0 {
            return Err(AppError::validation("content.words_per_minute must be > 0"));
        }
        url::Url::parse(&self.notion.api_base_url)?;
        url::Url::parse(&self.server.site_url)?;
        Ok(())
    }

    /// Validate that the content API can actually be reached with this config.
    pub fn require_notion(&self) -> Result<(&str, &str)> {
        let key = self
            .notion
            .api_key
            .as_deref()
            .ok_or_else(|| AppError::config("NOTION_API_KEY is not configured"))?;
        let database = self
            .notion
            .database_id
            .as_deref()
            .ok_or_else(|| AppError::config("NOTION_DATABASE_ID is not configured"))?;
        Ok((key, database))
    }
}

/// Content API client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotionConfig {
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default)]
    pub database_id: Option<String>,

    #[serde(default = "defaults::api_base_url")]
    pub api_base_url: String,

    /// Value of the `Notion-Version` header
    #[serde(default = "defaults::notion_version")]
    pub version: String,

    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Page size for paginated endpoints (API maximum is 100)
    #[serde(default = "defaults::page_size")]
    pub page_size: u32,
}

impl Default for NotionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            database_id: None,
            api_base_url: defaults::api_base_url(),
            version: defaults::notion_version(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            page_size: defaults::page_size(),
        }
    }
}

/// Runtime environment, selects cache lifetimes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Development,
    #[default]
    Production,
}

impl Environment {
    fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "development" | "dev" | "local" => Environment::Development,
            _ => Environment::Production,
        }
    }
}

/// Cache lifetimes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default)]
    pub environment: Environment,

    /// Explicit TTL for schema/posts/blocks, overrides the environment default
    #[serde(default)]
    pub ttl_secs: Option<u64>,

    /// Explicit TTL for derived content (search index)
    #[serde(default)]
    pub content_ttl_secs: Option<u64>,

    /// Maximum entries per cache
    #[serde(default = "defaults::max_capacity")]
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            ttl_secs: None,
            content_ttl_secs: None,
            max_capacity: defaults::max_capacity(),
        }
    }
}

impl CacheConfig {
    /// TTL for schema, post and block caches: 120s in development, 1h in production.
    pub fn ttl(&self) -> Duration {
        let secs = self.ttl_secs.unwrap_or(match self.environment {
            Environment::Development => 120,
            Environment::Production => 3600,
        });
        Duration::from_secs(secs)
    }

    /// TTL for derived content: 90s in development, 1h in production.
    pub fn content_ttl(&self) -> Duration {
        let secs = self.content_ttl_secs.unwrap_or(match self.environment {
            Environment::Development => 90,
            Environment::Production => 3600,
        });
        Duration::from_secs(secs)
    }
}

/// Content fetching and derivation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Maximum nesting depth expanded by the block tree fetcher
    #[serde(default = "defaults::max_block_depth")]
    pub max_block_depth: usize,

    #[serde(default = "defaults::words_per_minute")]
    pub words_per_minute: usize,

    /// Characters of body text kept per search document
    #[serde(default = "defaults::search_content_chars")]
    pub search_content_chars: usize,

    #[serde(default = "defaults::related_limit")]
    pub related_limit: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            max_block_depth: defaults::max_block_depth(),
            words_per_minute: defaults::words_per_minute(),
            search_content_chars: defaults::search_content_chars(),
            related_limit: defaults::related_limit(),
        }
    }
}

/// Shared secrets. All optional at load time; endpoints report absence per request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretsConfig {
    /// Key for `x-notion-signature` HMACs
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Secret for the manual revalidation endpoint
    #[serde(default)]
    pub revalidate_secret: Option<String>,

    /// GitHub login allowed into the admin area
    #[serde(default)]
    pub admin_github_login: Option<String>,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "defaults::bind_addr")]
    pub bind_addr: String,

    /// Public origin used in sitemap entries
    #[serde(default = "defaults::site_url")]
    pub site_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: defaults::bind_addr(),
            site_url: defaults::site_url(),
        }
    }
}

/// Link preview fetching settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookmarkConfig {
    #[serde(default = "defaults::bookmark_timeout")]
    pub timeout_ms: u64,

    /// Maximum HTML bytes inspected per page
    #[serde(default = "defaults::bookmark_max_bytes")]
    pub max_bytes: usize,

    #[serde(default = "defaults::bookmark_ttl")]
    pub ttl_secs: u64,

    #[serde(default = "defaults::browser_user_agent")]
    pub user_agent: String,
}

impl Default for BookmarkConfig {
    fn default() -> Self {
        Self {
            timeout_ms: defaults::bookmark_timeout(),
            max_bytes: defaults::bookmark_max_bytes(),
            ttl_secs: defaults::bookmark_ttl(),
            user_agent: defaults::browser_user_agent(),
        }
    }
}

mod defaults {
    // Notion defaults
    pub fn api_base_url() -> String {
        "https://api.notion.com/v1".into()
    }
    pub fn notion_version() -> String {
        "2022-06-28".into()
    }
    pub fn user_agent() -> String {
        "notion-blog/0.1".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn page_size() -> u32 {
        100
    }

    // Cache defaults
    pub fn max_capacity() -> u64 {
        10_000
    }

    // Content defaults
    pub fn max_block_depth() -> usize {
        12
    }
    pub fn words_per_minute() -> usize {
        300
    }
    pub fn search_content_chars() -> usize {
        6000
    }
    pub fn related_limit() -> usize {
        3
    }

    // Server defaults
    pub fn bind_addr() -> String {
        "0.0.0.0:3000".into()
    }
    pub fn site_url() -> String {
        "http://localhost:3000".into()
    }

    // Bookmark defaults
    pub fn bookmark_timeout() -> u64 {
        3500
    }
    pub fn bookmark_max_bytes() -> usize {
        350_000
    }
    pub fn bookmark_ttl() -> u64 {
        60 * 60 * 24
    }
    pub fn browser_user_agent() -> String {
        "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36".into()
    }
}
