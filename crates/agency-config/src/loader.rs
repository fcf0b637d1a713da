//! Configuration loader with file and environment variable support

use crate::{AppConfig, ConfigError};
use std::env;
use std::path::PathBuf;
use tracing::info;

/// Standard config file search paths
const CONFIG_PATHS: &[&str] = &[
    "config.toml",
    "agency.toml",
    "./config/config.toml",
    "./config/agency.toml",
    "/etc/agency/config.toml",
];

/// Configuration loader
pub struct ConfigLoader {
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Create a loader with a specific config file path
    pub fn with_path<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            config_path: Some(path.into()),
        }
    }

    /// Load configuration from file (if found) with environment variable overrides
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let mut config = AppConfig::default();

        if let Some(path) = self.find_config_file() {
            info!(?path, "Loading configuration from file");
            config = AppConfig::from_file(&path)?;
        }

        apply_overrides(&mut config, |key| env::var(key).ok());

        Ok(config)
    }

    fn find_config_file(&self) -> Option<PathBuf> {
        if let Some(path) = &self.config_path {
            if path.exists() {
                return Some(path.clone());
            }
        }

        if let Ok(path) = env::var("AGENCY_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        CONFIG_PATHS
            .iter()
            .map(PathBuf::from)
            .find(|path| path.exists())
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply overrides from a variable lookup. Unparseable numbers are ignored.
fn apply_overrides<F>(config: &mut AppConfig, var: F)
where
    F: Fn(&str) -> Option<String>,
{
    // HTTP
    if let Some(port) = var("AGENCY_HTTP_PORT").and_then(|v| v.parse().ok()) {
        config.http.port = port;
    }
    if let Some(val) = var("AGENCY_HTTP_HOST") {
        config.http.host = val;
    }
    if let Some(val) = var("AGENCY_CORS_ORIGINS") {
        config.http.cors_origins = val
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }

    // Store
    if let Some(val) = var("AGENCY_STORE_BACKEND") {
        config.store.backend = val;
    }
    if let Some(val) = var("AGENCY_MONGODB_URI") {
        config.store.mongodb.uri = val;
    }
    if let Some(val) = var("AGENCY_MONGODB_DATABASE") {
        config.store.mongodb.database = val;
    }

    // Auth
    if let Some(val) = var("JWT_ACCESS_SECRET") {
        config.auth.jwt.access_secret = val;
    }
    if let Some(val) = var("JWT_REFRESH_SECRET") {
        config.auth.jwt.refresh_secret = val;
    }
    if let Some(secs) = var("AGENCY_ACCESS_TOKEN_EXPIRY_SECS").and_then(|v| v.parse().ok()) {
        config.auth.jwt.access_token_expiry_secs = secs;
    }
    if let Some(secs) = var("AGENCY_REFRESH_TOKEN_EXPIRY_SECS").and_then(|v| v.parse().ok()) {
        config.auth.jwt.refresh_token_expiry_secs = secs;
    }

    // Roles
    if let Some(val) = var("AGENCY_USER_ROLE_ID") {
        config.roles.user_role_id = val;
    }
    if let Some(val) = var("AGENCY_ADMIN_ROLE_ID") {
        config.roles.admin_role_id = val;
    }

    // General
    if let Some(val) = var("AGENCY_DEV_MODE") {
        config.dev_mode = val.parse().unwrap_or(false);
    }
    if let Some(val) = var("APP_ENV").or_else(|| var("NODE_ENV")) {
        config.environment = val;
    }
}
