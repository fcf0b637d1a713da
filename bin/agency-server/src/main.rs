//! Agency Platform Server
//!
//! Serves the platform REST APIs:
//! - Auth APIs: login, registration, refresh, password reset, email OTP
//! - User APIs: profile, password change
//! - Catalog and service request APIs
//! - Admin APIs: users, roles, services, service requests
//! - Health
//!
//! ## Configuration
//!
//! Read from a TOML file (first argument, `$AGENCY_CONFIG`, or `config.toml`)
//! and overridden by environment variables.
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `AGENCY_HTTP_PORT` | `8080` | HTTP API port |
//! | `AGENCY_STORE_BACKEND` | `mongodb` | `mongodb` or `memory` |
//! | `AGENCY_MONGODB_URI` | `mongodb://localhost:27017` | MongoDB connection URL |
//! | `AGENCY_MONGODB_DATABASE` | `agency` | MongoDB database name |
//! | `JWT_ACCESS_SECRET` | - | Access token signing secret |
//! | `JWT_REFRESH_SECRET` | - | Refresh token signing secret |
//! | `AGENCY_DEV_MODE` | `false` | Seed demo users and services |
//! | `APP_ENV` | `development` | `production` marks cookies Secure |
//! | `RUST_LOG` | `info` | Log level |
//! | `LOG_FORMAT` | `text` | `json` for JSON lines |

use anyhow::Result;
use axum::http::{header, HeaderValue, Method};
use tokio::{net::TcpListener, signal};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use agency_config::{AppConfig, ConfigLoader};
use agency_platform::auth::{Argon2Config, CredentialTtl, PasswordPolicy, TokenConfig};
use agency_platform::seed::{DevDataSeeder, RoleSeeder};
use agency_platform::store::{ensure_indexes, Repositories};
use agency_platform::{Platform, PlatformConfig, RoleDefaults};

fn load_config() -> Result<AppConfig> {
    let loader = match std::env::args().nth(1) {
        Some(path) => ConfigLoader::with_path(path),
        None => ConfigLoader::new(),
    };
    let config = loader.load()?;
    config.validate()?;
    Ok(config)
}

fn platform_config(config: &AppConfig) -> PlatformConfig {
    let jwt = &config.auth.jwt;
    let mut tokens = TokenConfig::new(&jwt.access_secret, &jwt.refresh_secret);
    tokens.access_token_expiry_secs = jwt.access_token_expiry_secs;
    tokens.refresh_token_expiry_secs = jwt.refresh_token_expiry_secs;

    let roles = RoleDefaults {
        user_role_id: config.roles.user_role_id.clone(),
        admin_role_id: config.roles.admin_role_id.clone(),
        user_title: config.roles.user_title.clone(),
        admin_title: config.roles.admin_title.clone(),
    };

    let password = &config.auth.password;
    let argon2 = Argon2Config {
        memory_cost: password.memory_cost,
        time_cost: password.time_cost,
        parallelism: password.parallelism,
        ..Argon2Config::default()
    };

    let creds = &config.auth.credentials;
    PlatformConfig::new(tokens, roles)
        .with_argon2(argon2)
        .with_password_policy(PasswordPolicy::with_min_length(password.min_length))
        .with_credential_ttl(CredentialTtl::from_secs(creds.reset_token_ttl_secs, creds.otp_ttl_secs))
        .with_cookie(&config.auth.cookie.name, &config.auth.cookie.path)
        .production(config.is_production())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // Credentials are required for the refresh cookie
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    agency_common::init_logging("agency-server");

    info!("Starting Agency Platform Server");

    let config = load_config()?;
    let settings = platform_config(&config);

    let (repos, db) = if config.store.is_memory() {
        warn!("Using in-memory store; data is lost on shutdown");
        (Repositories::memory(), None)
    } else {
        let mongo = &config.store.mongodb;
        info!("Connecting to MongoDB: {}", mongo.database);
        let client = mongodb::Client::with_uri_str(&mongo.uri).await?;
        let db = client.database(&mongo.database);
        ensure_indexes(&db).await?;
        (Repositories::mongo(&db), Some(db))
    };

    let seeded = RoleSeeder::new(repos.roles.clone(), settings.roles.clone()).seed().await?;
    info!(created = seeded, "Default roles ready");

    if config.dev_mode {
        info!("Development mode enabled, seeding demo data");
        DevDataSeeder::new(repos.clone(), settings.roles.clone())?.seed().await?;
    }

    let mut platform = Platform::new(settings, repos)?;
    if let Some(db) = db {
        platform = platform.with_database(db);
    }

    let app = platform
        .router()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.http.cors_origins));

    let addr = format!("{}:{}", config.http.host, config.http.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("API server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Agency Platform Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
