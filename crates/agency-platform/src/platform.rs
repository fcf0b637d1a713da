//! Platform assembly
//!
//! Builds every service from a set of repositories and merges the routers
//! into one axum application behind the auth layer.

use axum::Router;
use std::sync::Arc;

use crate::auth::auth_api::{auth_router, AuthState};
use crate::auth::auth_flow::AuthFlow;
use crate::auth::credential_store::{CredentialStore, CredentialTtl};
use crate::auth::password_service::{Argon2Config, PasswordPolicy, PasswordService};
use crate::auth::token_service::{TokenConfig, TokenService};
use crate::catalog::api::{catalog_router, CatalogState};
use crate::catalog::catalog_service::CatalogService;
use crate::role::api::{roles_router, RolesState};
use crate::role::entity::RoleDefaults;
use crate::service_request::api::{service_requests_router, ServiceRequestState};
use crate::service_request::request_service::RequestService;
use crate::shared::clock::{Clock, SystemClock};
use crate::shared::error::Result;
use crate::shared::health_api::{health_router, HealthState};
use crate::shared::middleware::{AppState, AuthLayer};
use crate::store::Repositories;
use crate::user::api::{users_router, UsersState};
use crate::user::user_service::UserService;

/// Settings the platform needs beyond its repositories
#[derive(Clone)]
pub struct PlatformConfig {
    pub tokens: TokenConfig,
    pub credential_ttl: CredentialTtl,
    pub argon2: Argon2Config,
    pub password_policy: PasswordPolicy,
    pub roles: RoleDefaults,
    pub cookie_name: String,
    pub cookie_path: String,
    /// Marks the refresh cookie Secure
    pub production: bool,
    pub clock: Arc<dyn Clock>,
    pub version: String,
}

impl PlatformConfig {
    pub fn new(tokens: TokenConfig, roles: RoleDefaults) -> Self {
        Self {
            tokens,
            credential_ttl: CredentialTtl::default(),
            argon2: Argon2Config::default(),
            password_policy: PasswordPolicy::default(),
            roles,
            cookie_name: "refreshToken".to_string(),
            cookie_path: "/".to_string(),
            production: false,
            clock: Arc::new(SystemClock),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_argon2(mut self, argon2: Argon2Config) -> Self {
        self.argon2 = argon2;
        self
    }

    pub fn with_credential_ttl(mut self, ttl: CredentialTtl) -> Self {
        self.credential_ttl = ttl;
        self
    }

    pub fn with_password_policy(mut self, policy: PasswordPolicy) -> Self {
        self.password_policy = policy;
        self
    }

    pub fn with_cookie(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self.cookie_path = path.into();
        self
    }

    pub fn production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }
}

/// All platform services wired against one store
pub struct Platform {
    config: PlatformConfig,
    repos: Repositories,
    db: Option<mongodb::Database>,
    tokens: Arc<TokenService>,
    auth: Arc<AuthFlow>,
    users: Arc<UserService>,
    catalog: Arc<CatalogService>,
    requests: Arc<RequestService>,
}

impl Platform {
    pub fn new(config: PlatformConfig, repos: Repositories) -> Result<Self> {
        let tokens = Arc::new(
            TokenService::new(config.tokens.clone()).with_clock(config.clock.clone()),
        );
        let passwords = Arc::new(PasswordService::new(
            config.argon2.clone(),
            config.password_policy.clone(),
        )?);

        let credentials = CredentialStore::new(
            repos.credentials.clone(),
            config.clock.clone(),
            config.credential_ttl.clone(),
        );

        let auth = Arc::new(AuthFlow::new(
            repos.users.clone(),
            repos.roles.clone(),
            credentials,
            tokens.clone(),
            passwords.clone(),
            config.roles.clone(),
        ));
        let users = Arc::new(UserService::new(
            repos.users.clone(),
            repos.roles.clone(),
            passwords,
        ));
        let catalog = Arc::new(CatalogService::new(repos.services.clone()));
        let requests = Arc::new(RequestService::new(
            repos.service_requests.clone(),
            catalog.clone(),
            repos.users.clone(),
        ));

        Ok(Self { config, repos, db: None, tokens, auth, users, catalog, requests })
    }

    /// Report MongoDB connectivity on `/health`
    pub fn with_database(mut self, db: mongodb::Database) -> Self {
        self.db = Some(db);
        self
    }

    pub fn repositories(&self) -> &Repositories {
        &self.repos
    }

    pub fn token_service(&self) -> Arc<TokenService> {
        self.tokens.clone()
    }

    pub fn auth_flow(&self) -> Arc<AuthFlow> {
        self.auth.clone()
    }

    pub fn catalog(&self) -> Arc<CatalogService> {
        self.catalog.clone()
    }

    /// The complete application router
    pub fn router(&self) -> Router {
        let roles = self.config.roles.clone();

        let auth_state = AuthState::new(self.auth.clone()).with_cookie_settings(
            &self.config.cookie_name,
            &self.config.cookie_path,
            self.config.production,
        );
        let users_state = UsersState { users: self.users.clone(), roles: roles.clone() };
        let roles_state = RolesState {
            role_repo: self.repos.roles.clone(),
            user_repo: self.repos.users.clone(),
            roles: roles.clone(),
        };
        let catalog_state = CatalogState { catalog: self.catalog.clone(), roles: roles.clone() };
        let requests_state = ServiceRequestState { requests: self.requests.clone(), roles };
        let health_state = HealthState::new(self.db.clone(), self.config.version.clone());

        Router::new()
            .merge(auth_router(auth_state))
            .merge(users_router(users_state))
            .merge(roles_router(roles_state))
            .merge(catalog_router(catalog_state))
            .merge(service_requests_router(requests_state))
            .merge(health_router(health_state))
            .layer(AuthLayer::new(AppState { token_service: self.tokens.clone() }))
    }
}
