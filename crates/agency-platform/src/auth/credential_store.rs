//! Credential Store
//!
//! Issues, looks up and consumes single-use credential tokens.

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::credential::{CredentialKind, CredentialToken, IssuedCredential};
use crate::auth::credential_repository::CredentialTokenRepository;
use crate::shared::clock::Clock;
use crate::shared::error::{PlatformError, Result};

/// Lifetime of each credential kind
#[derive(Debug, Clone)]
pub struct CredentialTtl {
    pub password_reset: Duration,
    pub email_otp: Duration,
}

impl Default for CredentialTtl {
    fn default() -> Self {
        Self {
            password_reset: Duration::minutes(15),
            email_otp: Duration::minutes(5),
        }
    }
}

impl CredentialTtl {
    pub fn from_secs(reset_secs: i64, otp_secs: i64) -> Self {
        Self {
            password_reset: Duration::seconds(reset_secs),
            email_otp: Duration::seconds(otp_secs),
        }
    }

    pub fn for_kind(&self, kind: CredentialKind) -> Duration {
        match kind {
            CredentialKind::PasswordReset => self.password_reset,
            CredentialKind::EmailOtp => self.email_otp,
        }
    }
}

pub struct CredentialStore {
    repo: Arc<dyn CredentialTokenRepository>,
    clock: Arc<dyn Clock>,
    ttl: CredentialTtl,
}

impl CredentialStore {
    pub fn new(repo: Arc<dyn CredentialTokenRepository>, clock: Arc<dyn Clock>, ttl: CredentialTtl) -> Self {
        Self { repo, clock, ttl }
    }

    /// Issue a new token of `kind` for the user.
    ///
    /// Fails with `TooManyRequests` while an earlier token of the same kind is
    /// still active. The returned plaintext secret is not stored anywhere.
    pub async fn issue(&self, kind: CredentialKind, user_id: &str) -> Result<IssuedCredential> {
        let now = self.clock.now();
        let secret = kind.generate_secret();
        let token = CredentialToken::new(user_id, kind, &secret, now, self.ttl.for_kind(kind));

        if !self.repo.insert_if_no_active(&token, now).await? {
            debug!(user_id, %kind, "Active credential already exists");
            return Err(PlatformError::too_many_requests(match kind {
                CredentialKind::PasswordReset => "A password reset link was already sent, try again later",
                CredentialKind::EmailOtp => "An OTP was already sent, try again later",
            }));
        }

        info!(user_id, %kind, expires_at = %token.expires_at, "Credential issued");
        Ok(IssuedCredential { secret, token })
    }

    pub async fn lookup_active(&self, kind: CredentialKind, user_id: &str) -> Result<Option<CredentialToken>> {
        self.repo.find_active(user_id, kind, self.clock.now()).await
    }

    /// Consume the user's active token of `kind` if `supplied` matches it.
    ///
    /// Every failure (no token, expired, wrong secret, lost a race to another
    /// consumer) is reported as `InvalidCredentialToken`.
    pub async fn consume(&self, kind: CredentialKind, user_id: &str, supplied: &str) -> Result<()> {
        let now = self.clock.now();

        let token = self
            .repo
            .find_active(user_id, kind, now)
            .await?
            .ok_or(PlatformError::InvalidCredentialToken)?;

        if !token.matches(supplied) {
            debug!(user_id, %kind, "Credential mismatch");
            return Err(PlatformError::InvalidCredentialToken);
        }

        if !self.repo.mark_consumed(&token.id, now).await? {
            debug!(user_id, %kind, "Credential consumed concurrently");
            return Err(PlatformError::InvalidCredentialToken);
        }

        info!(user_id, %kind, "Credential consumed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::clock::ManualClock;
    use crate::store::memory::MemoryStore;

    fn store() -> (CredentialStore, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::starting_now());
        let repo = Arc::new(MemoryStore::new());
        (CredentialStore::new(repo, clock.clone(), CredentialTtl::default()), clock)
    }

    #[tokio::test]
    async fn test_single_flight_until_expiry() {
        let (store, clock) = store();

        store.issue(CredentialKind::PasswordReset, "u1").await.unwrap();
        let second = store.issue(CredentialKind::PasswordReset, "u1").await;
        assert!(matches!(second, Err(PlatformError::TooManyRequests { .. })));

        clock.advance(Duration::minutes(15));
        assert!(store.issue(CredentialKind::PasswordReset, "u1").await.is_ok());
    }

    #[tokio::test]
    async fn test_kinds_and_users_are_independent() {
        let (store, _) = store();

        store.issue(CredentialKind::PasswordReset, "u1").await.unwrap();
        assert!(store.issue(CredentialKind::EmailOtp, "u1").await.is_ok());
        assert!(store.issue(CredentialKind::PasswordReset, "u2").await.is_ok());
    }

    #[tokio::test]
    async fn test_consume_once() {
        let (store, _) = store();

        let issued = store.issue(CredentialKind::EmailOtp, "u1").await.unwrap();
        store.consume(CredentialKind::EmailOtp, "u1", &issued.secret).await.unwrap();

        let again = store.consume(CredentialKind::EmailOtp, "u1", &issued.secret).await;
        assert!(matches!(again, Err(PlatformError::InvalidCredentialToken)));

        // The slot is free again once consumed
        assert!(store.issue(CredentialKind::EmailOtp, "u1").await.is_ok());
    }

    #[tokio::test]
    async fn test_consume_rejects_uniformly() {
        let (store, clock) = store();

        let missing = store.consume(CredentialKind::EmailOtp, "u1", "123456").await;
        assert!(matches!(missing, Err(PlatformError::InvalidCredentialToken)));

        let issued = store.issue(CredentialKind::EmailOtp, "u1").await.unwrap();

        let wrong_user = store.consume(CredentialKind::EmailOtp, "u2", &issued.secret).await;
        assert!(matches!(wrong_user, Err(PlatformError::InvalidCredentialToken)));

        let wrong_kind = store.consume(CredentialKind::PasswordReset, "u1", &issued.secret).await;
        assert!(matches!(wrong_kind, Err(PlatformError::InvalidCredentialToken)));

        let wrong_secret = store.consume(CredentialKind::EmailOtp, "u1", "not-the-otp").await;
        assert!(matches!(wrong_secret, Err(PlatformError::InvalidCredentialToken)));

        clock.advance(Duration::seconds(301));
        let expired = store.consume(CredentialKind::EmailOtp, "u1", &issued.secret).await;
        assert!(matches!(expired, Err(PlatformError::InvalidCredentialToken)));
    }

    #[tokio::test]
    async fn test_wrong_guess_does_not_burn_token() {
        let (store, _) = store();

        let issued = store.issue(CredentialKind::PasswordReset, "u1").await.unwrap();
        assert!(store.consume(CredentialKind::PasswordReset, "u1", "guess").await.is_err());
        assert!(store.consume(CredentialKind::PasswordReset, "u1", &issued.secret).await.is_ok());
    }

    #[tokio::test]
    async fn test_lookup_active() {
        let (store, clock) = store();
        assert!(store.lookup_active(CredentialKind::EmailOtp, "u1").await.unwrap().is_none());

        let issued = store.issue(CredentialKind::EmailOtp, "u1").await.unwrap();
        let active = store.lookup_active(CredentialKind::EmailOtp, "u1").await.unwrap().unwrap();
        assert_eq!(active.id, issued.token.id);
        assert_ne!(active.secret_hash, issued.secret);

        clock.advance(Duration::minutes(5));
        assert!(store.lookup_active(CredentialKind::EmailOtp, "u1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_issue_admits_one() {
        let (store, _) = store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.issue(CredentialKind::PasswordReset, "u1").await })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }
}
