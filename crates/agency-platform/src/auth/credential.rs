//! Credential Token Entity
//!
//! Single-use secrets bound to a user: password-reset tokens and
//! email-verification OTPs. Only the SHA-256 of the secret is stored; the
//! plaintext is handed back once, at issue time.

use bson::serde_helpers::{
    chrono_datetime_as_bson_datetime, chrono_datetime_as_bson_datetime_optional,
};
use chrono::{DateTime, Duration, Utc};
use rand::{rngs::OsRng, Rng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::TsidGenerator;

/// Purpose of a credential token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialKind {
    /// 32 random bytes, hex encoded
    PasswordReset,
    /// 6 decimal digits
    EmailOtp,
}

impl CredentialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PasswordReset => "PASSWORD_RESET",
            Self::EmailOtp => "EMAIL_OTP",
        }
    }

    /// Generate a fresh plaintext secret of this kind
    pub fn generate_secret(&self) -> String {
        match self {
            Self::PasswordReset => {
                let mut bytes = [0u8; 32];
                OsRng.fill_bytes(&mut bytes);
                hex::encode(bytes)
            }
            Self::EmailOtp => format!("{:06}", OsRng.gen_range(0..1_000_000u32)),
        }
    }
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored credential token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialToken {
    #[serde(rename = "_id")]
    pub id: String,

    pub user_id: String,

    pub kind: CredentialKind,

    /// SHA-256 of the secret, hex encoded
    pub secret_hash: String,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub issued_at: DateTime<Utc>,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[serde(with = "chrono_datetime_as_bson_datetime_optional")]
    pub consumed_at: Option<DateTime<Utc>>,
}

impl CredentialToken {
    /// Build a token for `secret`, valid for `ttl` from `now`
    pub fn new(
        user_id: impl Into<String>,
        kind: CredentialKind,
        secret: &str,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: TsidGenerator::generate(),
            user_id: user_id.into(),
            kind,
            secret_hash: hash_secret(secret),
            issued_at: now,
            expires_at: now + ttl,
            consumed_at: None,
        }
    }

    /// Unexpired and not yet consumed
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.consumed_at.is_none() && self.expires_at > now
    }

    /// Constant-time comparison of a supplied secret against the stored hash
    pub fn matches(&self, supplied: &str) -> bool {
        verify_secret(supplied, &self.secret_hash)
    }
}

/// Plaintext secret plus the record that was stored for it
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub secret: String,
    pub token: CredentialToken,
}

/// SHA-256 hex digest of a secret
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hash `supplied` and compare with `expected_hash` in constant time
pub fn verify_secret(supplied: &str, expected_hash: &str) -> bool {
    let supplied_hash = hash_secret(supplied);
    supplied_hash.as_bytes().ct_eq(expected_hash.as_bytes()).into()
}
