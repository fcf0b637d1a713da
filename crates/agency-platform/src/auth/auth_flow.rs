//! Auth Flow Controller
//!
//! Login, registration, session refresh, password reset and email
//! verification. Each flow is independent; the only shared state is the
//! store behind the repositories.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::auth::credential::CredentialKind;
use crate::auth::credential_store::CredentialStore;
use crate::auth::password_service::PasswordService;
use crate::auth::token_service::{SessionTokens, TokenService};
use crate::role::entity::RoleDefaults;
use crate::role::repository::RoleRepository;
use crate::shared::error::{PlatformError, Result};
use crate::user::entity::{is_valid_email, normalize_email, User};
use crate::user::repository::UserRepository;

/// The one message every refresh failure carries
const INVALID_REFRESH_TOKEN: &str = "Invalid or expired refresh token";

/// Successful login
#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    pub session: SessionTokens,
}

/// New account plus the OTP that verifies its email
#[derive(Debug)]
pub struct Registration {
    pub user: User,
    pub otp: String,
}

#[derive(Debug, Clone, Default)]
pub struct RegisterInput {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

pub struct AuthFlow {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    credentials: CredentialStore,
    tokens: Arc<TokenService>,
    passwords: Arc<PasswordService>,
    role_defaults: RoleDefaults,
}

impl AuthFlow {
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        credentials: CredentialStore,
        tokens: Arc<TokenService>,
        passwords: Arc<PasswordService>,
        role_defaults: RoleDefaults,
    ) -> Self {
        Self {
            users,
            roles,
            credentials,
            tokens,
            passwords,
            role_defaults,
        }
    }

    pub fn token_service(&self) -> &Arc<TokenService> {
        &self.tokens
    }

    /// Unknown email and wrong password fail the same way.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome> {
        let email = normalize_email(email);

        let user = match self.users.find_by_email(&email).await? {
            Some(user) => user,
            None => {
                debug!("Login for unknown email");
                return Err(PlatformError::InvalidCredentials);
            }
        };

        if !self.passwords.verify_password(password, &user.password_hash)? {
            warn!(user_id = %user.id, "Login with wrong password");
            return Err(PlatformError::InvalidCredentials);
        }

        let role = self.role_title(&user).await?;
        let session = self.tokens.issue_session(&user, &role)?;

        info!(user_id = %user.id, "User logged in");
        Ok(LoginOutcome { user, session })
    }

    /// Create an unverified account with the default user role and issue
    /// its first email OTP.
    #[tracing::instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterInput) -> Result<Registration> {
        let email = normalize_email(&input.email);
        if !is_valid_email(&email) {
            return Err(PlatformError::validation("Invalid email format"));
        }

        if self.users.find_by_email(&email).await?.is_some() {
            return Err(PlatformError::duplicate("User", "email", &email));
        }

        let hash = self.passwords.hash_password(&input.password)?;
        let user = User::new(&email, hash, &self.role_defaults.user_role_id)
            .with_name(input.first_name, input.last_name);
        self.users.insert(&user).await?;

        let issued = self.credentials.issue(CredentialKind::EmailOtp, &user.id).await?;

        info!(user_id = %user.id, "User registered");
        Ok(Registration { user, otp: issued.secret })
    }

    /// Sign a fresh access token from a refresh token.
    ///
    /// The user and role are re-read, so the new token carries the same
    /// claims as one issued at login.
    pub async fn refresh(&self, refresh_token: &str) -> Result<String> {
        let claims = self.tokens.verify_refresh(refresh_token).map_err(|e| {
            debug!(error = ?e, "Refresh token rejected");
            PlatformError::unauthorized(INVALID_REFRESH_TOKEN)
        })?;

        let user = self
            .users
            .find_by_id(&claims.id)
            .await?
            .ok_or_else(|| PlatformError::unauthorized(INVALID_REFRESH_TOKEN))?;

        let role = self.role_title(&user).await?;
        let access_token = self.tokens.sign_access(&user, &role)?;

        debug!(user_id = %user.id, "Access token refreshed");
        Ok(access_token)
    }

    /// Issue a reset token and return the link path that carries it
    #[tracing::instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> Result<String> {
        let user = self.find_by_email(email).await?;
        let issued = self.credentials.issue(CredentialKind::PasswordReset, &user.id).await?;

        info!(user_id = %user.id, "Password reset requested");
        Ok(format!("/reset-password/{}/{}", issued.secret, user.id))
    }

    /// Consume a reset token and set the new password.
    ///
    /// The password is checked first, so a weak password does not burn the
    /// token. An unknown user id looks like a bad token.
    #[tracing::instrument(skip(self, token, password))]
    pub async fn reset_password(&self, token: &str, user_id: &str, password: &str) -> Result<User> {
        self.passwords.validate_password(password)?;

        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(PlatformError::InvalidCredentialToken)?;

        self.credentials
            .consume(CredentialKind::PasswordReset, &user.id, token)
            .await?;

        user.set_password_hash(self.passwords.hash_password(password)?);
        self.users.update(&user).await?;

        info!(user_id = %user.id, "Password reset");
        Ok(user)
    }

    #[tracing::instrument(skip(self, otp))]
    pub async fn verify_email(&self, user_id: &str, otp: &str) -> Result<User> {
        let mut user = self
            .users
            .find_by_id(user_id)
            .await?
            .ok_or(PlatformError::InvalidCredentialToken)?;

        self.credentials
            .consume(CredentialKind::EmailOtp, &user.id, otp.trim())
            .await?;

        user.mark_verified();
        self.users.update(&user).await?;

        info!(user_id = %user.id, "Email verified");
        Ok(user)
    }

    #[tracing::instrument(skip(self))]
    pub async fn resend_otp(&self, email: &str) -> Result<Registration> {
        let user = self.find_by_email(email).await?;
        let issued = self.credentials.issue(CredentialKind::EmailOtp, &user.id).await?;

        info!(user_id = %user.id, "OTP reissued");
        Ok(Registration { user, otp: issued.secret })
    }

    pub async fn current_user(&self, user_id: &str) -> Result<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("User", user_id))
    }

    async fn find_by_email(&self, email: &str) -> Result<User> {
        let email = normalize_email(email);
        self.users
            .find_by_email(&email)
            .await?
            .ok_or_else(|| PlatformError::not_found("User", &email))
    }

    /// Title of the user's role. A default role whose record is missing
    /// still resolves to its configured title.
    async fn role_title(&self, user: &User) -> Result<String> {
        if let Some(role) = self.roles.find_by_id(&user.role_id).await? {
            return Ok(role.title);
        }

        let defaults = &self.role_defaults;
        if user.role_id == defaults.admin_role_id {
            Ok(defaults.admin_title.clone())
        } else if user.role_id == defaults.user_role_id {
            Ok(defaults.user_title.clone())
        } else {
            warn!(user_id = %user.id, role_id = %user.role_id, "User role not found");
            Ok(String::new())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credential_store::CredentialTtl;
    use crate::auth::password_service::{Argon2Config, PasswordPolicy};
    use crate::auth::token_service::TokenConfig;
    use crate::role::entity::Role;
    use crate::shared::clock::ManualClock;
    use crate::store::memory::MemoryStore;
    use chrono::Duration;

    struct Fixture {
        flow: AuthFlow,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let clock = Arc::new(ManualClock::starting_now());
        let flow = AuthFlow::new(
            store.clone(),
            store.clone(),
            CredentialStore::new(store.clone(), clock.clone(), CredentialTtl::default()),
            Arc::new(TokenService::new(TokenConfig::new("access", "refresh"))),
            Arc::new(PasswordService::new(Argon2Config::testing(), PasswordPolicy::default()).unwrap()),
            RoleDefaults::default(),
        );
        Fixture { flow, store, clock }
    }

    fn input(email: &str, password: &str) -> RegisterInput {
        RegisterInput {
            email: email.to_string(),
            password: password.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_register_then_login() {
        let f = fixture();
        let registration = f.flow.register(input("A@B.com", "secret123")).await.unwrap();
        assert_eq!(registration.user.email, "a@b.com");
        assert_eq!(registration.otp.len(), 6);
        assert!(!registration.user.is_verified());

        let outcome = f.flow.login("a@b.com", "secret123").await.unwrap();
        let claims = f.flow.token_service().verify_access(&outcome.session.access_token).unwrap();
        assert_eq!(claims.role, "user");
        assert_eq!(claims.email, "a@b.com");
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates_and_bad_input() {
        let f = fixture();
        f.flow.register(input("a@b.com", "secret123")).await.unwrap();

        let dup = f.flow.register(input(" a@B.com ", "secret123")).await;
        assert!(matches!(dup, Err(PlatformError::Duplicate { .. })));
        assert!(f.flow.register(input("not-an-email", "secret123")).await.is_err());
        assert!(f.flow.register(input("c@d.com", "short")).await.is_err());
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let f = fixture();
        f.flow.register(input("a@b.com", "secret123")).await.unwrap();

        let unknown = f.flow.login("x@y.com", "secret123").await.unwrap_err();
        let wrong = f.flow.login("a@b.com", "wrong").await.unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
        assert!(matches!(wrong, PlatformError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_refresh_carries_full_claims() {
        let f = fixture();
        f.flow.register(input("a@b.com", "secret123")).await.unwrap();
        let outcome = f.flow.login("a@b.com", "secret123").await.unwrap();

        let access = f.flow.refresh(&outcome.session.refresh_token).await.unwrap();
        let claims = f.flow.token_service().verify_access(&access).unwrap();
        assert_eq!(claims.email, "a@b.com");
        assert_eq!(claims.role, "user");

        assert!(f.flow.refresh(&outcome.session.access_token).await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_uses_current_role() {
        let f = fixture();
        let registration = f.flow.register(input("a@b.com", "secret123")).await.unwrap();
        let outcome = f.flow.login("a@b.com", "secret123").await.unwrap();

        let manager = Role::new("manager");
        RoleRepository::insert(f.store.as_ref(), &manager).await.unwrap();
        let mut user = registration.user;
        user.role_id = manager.id.clone();
        UserRepository::update(f.store.as_ref(), &user).await.unwrap();

        let access = f.flow.refresh(&outcome.session.refresh_token).await.unwrap();
        assert_eq!(f.flow.token_service().verify_access(&access).unwrap().role, "manager");
    }

    #[tokio::test]
    async fn test_reset_flow_is_single_use() {
        let f = fixture();
        let user = f.flow.register(input("a@b.com", "secret123")).await.unwrap().user;

        let link = f.flow.forgot_password("a@b.com").await.unwrap();
        let parts: Vec<&str> = link.trim_start_matches('/').split('/').collect();
        assert_eq!(parts[0], "reset-password");
        assert_eq!(parts[2], user.id);
        let token = parts[1];

        f.flow.reset_password(token, &user.id, "newpass").await.unwrap();
        assert!(f.flow.login("a@b.com", "newpass").await.is_ok());
        assert!(f.flow.login("a@b.com", "secret123").await.is_err());

        let again = f.flow.reset_password(token, &user.id, "another").await;
        assert!(matches!(again, Err(PlatformError::InvalidCredentialToken)));
    }

    #[tokio::test]
    async fn test_forgot_password_single_flight_and_unknown_email() {
        let f = fixture();
        f.flow.register(input("a@b.com", "secret123")).await.unwrap();

        f.flow.forgot_password("a@b.com").await.unwrap();
        let second = f.flow.forgot_password("a@b.com").await;
        assert!(matches!(second, Err(PlatformError::TooManyRequests { .. })));

        f.clock.advance(Duration::minutes(15));
        assert!(f.flow.forgot_password("a@b.com").await.is_ok());

        let unknown = f.flow.forgot_password("x@y.com").await;
        assert!(matches!(unknown, Err(PlatformError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_weak_password_keeps_reset_token() {
        let f = fixture();
        let user = f.flow.register(input("a@b.com", "secret123")).await.unwrap().user;
        let link = f.flow.forgot_password("a@b.com").await.unwrap();
        let token = link.split('/').nth(2).unwrap().to_string();

        assert!(matches!(
            f.flow.reset_password(&token, &user.id, "abc").await,
            Err(PlatformError::Validation { .. })
        ));
        assert!(f.flow.reset_password(&token, &user.id, "newpass").await.is_ok());
    }

    #[tokio::test]
    async fn test_reset_with_unknown_user_is_invalid_token() {
        let f = fixture();
        let result = f.flow.reset_password("deadbeef", "0000000000000", "newpass").await;
        assert!(matches!(result, Err(PlatformError::InvalidCredentialToken)));
    }

    #[tokio::test]
    async fn test_verify_email_and_otp_expiry() {
        let f = fixture();
        let registration = f.flow.register(input("a@b.com", "secret123")).await.unwrap();
        let user_id = registration.user.id.clone();

        f.clock.advance(Duration::seconds(301));
        let expired = f.flow.verify_email(&user_id, &registration.otp).await;
        assert!(matches!(expired, Err(PlatformError::InvalidCredentialToken)));

        let reissued = f.flow.resend_otp("a@b.com").await.unwrap();
        let user = f.flow.verify_email(&user_id, &reissued.otp).await.unwrap();
        assert!(user.is_verified());
        assert!(f.flow.current_user(&user_id).await.unwrap().is_verified());
    }

    #[tokio::test]
    async fn test_resend_otp_single_flight() {
        let f = fixture();
        f.flow.register(input("a@b.com", "secret123")).await.unwrap();

        let again = f.flow.resend_otp("a@b.com").await;
        assert!(matches!(again, Err(PlatformError::TooManyRequests { .. })));
        assert!(matches!(
            f.flow.resend_otp("x@y.com").await,
            Err(PlatformError::NotFound { .. })
        ));
    }
}
