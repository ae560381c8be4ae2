// src/config.rs

//! Configuration loading utilities.
//!
//! Layers, lowest first: built-in defaults, the TOML file, a `.env` file and
//! finally the process environment.

use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{Config, SecretsConfig};
use crate::utils::non_blank;

/// Load `.env` (when present), the TOML file (when present) and environment
/// overrides, then validate the result.
pub fn load_config(config_path: &Path, dotenv_path: &Path) -> Result<Config> {
    if dotenv_path.exists() {
        dotenvy::from_path(dotenv_path).map_err(|e| {
            AppError::config(format!("Failed to load {}: {}", dotenv_path.display(), e))
        })?;
        log::info!("Loaded environment from {}", dotenv_path.display());
    }

    let config = Config::from_env(config_path);
    config.validate()?;

    log::info!(
        "Configuration loaded (environment: {:?}, database configured: {}, webhook secret: {}, revalidate secret: {})",
        config.cache.environment,
        config.notion.database_id.is_some(),
        config.secrets.webhook_secret.is_some(),
        config.secrets.revalidate_secret.is_some()
    );
    Ok(config)
}

/// Normalized login: trimmed and lowercased, `None` when blank.
pub fn normalize_login(login: Option<&str>) -> Option<String> {
    non_blank(login).map(str::to_lowercase)
}

/// Whether `login` is the configured admin. No configured admin admits nobody.
pub fn is_admin_login(secrets: &SecretsConfig, login: Option<&str>) -> bool {
    match (
        normalize_login(secrets.admin_github_login.as_deref()),
        normalize_login(login),
    ) {
        (Some(admin), Some(login)) => admin == login,
        _ => false,
    }
}
