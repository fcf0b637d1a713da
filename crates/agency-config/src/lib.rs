//! Agency Platform Configuration System
//!
//! TOML-based configuration with environment variable overrides.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

mod loader;

pub use loader::ConfigLoader;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub http: HttpConfig,
    pub store: StoreConfig,
    pub auth: AuthConfig,
    pub roles: RolesConfig,

    /// Deployment environment: development, production
    pub environment: String,

    /// Enable development mode
    pub dev_mode: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            http: HttpConfig::default(),
            store: StoreConfig::default(),
            auth: AuthConfig::default(),
            roles: RolesConfig::default(),
            environment: "development".to_string(),
            dev_mode: false,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub port: u16,
    pub host: String,
    pub cors_origins: Vec<String>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            cors_origins: vec!["http://localhost:3000".to_string()],
        }
    }
}

/// Persistence backend selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Backend: memory, mongodb
    pub backend: String,
    pub mongodb: MongoConfig,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "mongodb".to_string(),
            mongodb: MongoConfig::default(),
        }
    }
}

impl StoreConfig {
    pub fn is_memory(&self) -> bool {
        self.backend.eq_ignore_ascii_case("memory")
    }
}

/// MongoDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017/?directConnection=true".to_string(),
            database: "agency".to_string(),
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
    pub credentials: CredentialConfig,
    pub password: PasswordConfig,
}

/// JWT configuration. Access and refresh tokens are signed with separate secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub access_token_expiry_secs: i64,
    pub refresh_token_expiry_secs: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            access_secret: String::new(),
            refresh_secret: String::new(),
            access_token_expiry_secs: 3600,    // 1 hour
            refresh_token_expiry_secs: 604800, // 7 days
        }
    }
}

/// Refresh cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CookieConfig {
    pub name: String,
    pub path: String,
}

impl Default for CookieConfig {
    fn default() -> Self {
        Self {
            name: "refreshToken".to_string(),
            path: "/".to_string(),
        }
    }
}

/// Single-use credential lifetimes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialConfig {
    pub reset_token_ttl_secs: i64,
    pub otp_ttl_secs: i64,
}

impl Default for CredentialConfig {
    fn default() -> Self {
        Self {
            reset_token_ttl_secs: 900, // 15 minutes
            otp_ttl_secs: 300,         // 5 minutes
        }
    }
}

/// Password hashing and policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordConfig {
    pub min_length: usize,
    /// Argon2 memory cost in KiB
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            min_length: 6,
            memory_cost: 65536,
            time_cost: 3,
            parallelism: 4,
        }
    }
}

/// Default role bootstrap
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RolesConfig {
    pub user_role_id: String,
    pub admin_role_id: String,
    pub user_title: String,
    pub admin_title: String,
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            user_role_id: "0000000000USR".to_string(),
            admin_role_id: "0000000000ADM".to_string(),
            user_title: "user".to_string(),
            admin_title: "admin".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Load configuration with environment variable override
    pub fn load() -> Result<Self, ConfigError> {
        ConfigLoader::new().load()
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    /// Reject configurations the server cannot safely start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let jwt = &self.auth.jwt;
        if jwt.access_secret.trim().is_empty() || jwt.refresh_secret.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "JWT access and refresh secrets must be set".to_string(),
            ));
        }
        if jwt.access_secret == jwt.refresh_secret {
            return Err(ConfigError::ValidationError(
                "JWT access and refresh secrets must differ".to_string(),
            ));
        }
        if jwt.access_token_expiry_secs <= 0 || jwt.refresh_token_expiry_secs <= 0 {
            return Err(ConfigError::ValidationError(
                "token expiries must be positive".to_string(),
            ));
        }

        let roles = &self.roles;
        if roles.user_role_id.is_empty() || roles.admin_role_id.is_empty() {
            return Err(ConfigError::ValidationError(
                "default role ids must be set".to_string(),
            ));
        }
        if roles.user_role_id == roles.admin_role_id {
            return Err(ConfigError::ValidationError(
                "user and admin role ids must differ".to_string(),
            ));
        }

        let creds = &self.auth.credentials;
        if creds.reset_token_ttl_secs <= 0 || creds.otp_ttl_secs <= 0 {
            return Err(ConfigError::ValidationError(
                "credential TTLs must be positive".to_string(),
            ));
        }

        match self.store.backend.to_ascii_lowercase().as_str() {
            "memory" | "mongodb" => Ok(()),
            other => Err(ConfigError::ValidationError(format!(
                "unknown store backend '{}'",
                other
            ))),
        }
    }

    /// Generate an example TOML configuration
    pub fn example_toml() -> String {
        r#"# Agency Platform Configuration
# Environment variables override these settings

environment = "development"  # development, production
dev_mode = false

[http]
port = 8080
host = "0.0.0.0"
cors_origins = ["http://localhost:3000"]

[store]
backend = "mongodb"  # mongodb, memory

[store.mongodb]
uri = "mongodb://localhost:27017/?directConnection=true"
database = "agency"

[auth.jwt]
access_secret = ""
refresh_secret = ""
access_token_expiry_secs = 3600
refresh_token_expiry_secs = 604800

[auth.cookie]
name = "refreshToken"
path = "/"

[auth.credentials]
reset_token_ttl_secs = 900
otp_ttl_secs = 300

[auth.password]
min_length = 6
memory_cost = 65536
time_cost = 3
parallelism = 4

[roles]
user_role_id = "0000000000USR"
admin_role_id = "0000000000ADM"
user_title = "user"
admin_title = "admin"
"#
        .to_string()
    }
}
