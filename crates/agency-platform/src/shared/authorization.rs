//! Authorization
//!
//! Request identity built from a verified access token, plus role guards.

use crate::auth::token_service::AccessTokenClaims;
use crate::role::entity::RoleDefaults;
use crate::shared::error::{PlatformError, Result};

/// Identity of the caller for the current request
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: String,
    pub email: String,
    /// Role title from the token; empty when the token carried none
    pub role: String,
}

impl AuthContext {
    pub fn from_claims(claims: AccessTokenClaims) -> Self {
        Self {
            user_id: claims.id,
            email: claims.email,
            role: claims.role,
        }
    }

    pub fn has_role(&self, role: &str) -> bool {
        !self.role.is_empty() && self.role == role
    }

    pub fn is_self(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }
}

pub mod checks {
    use super::*;

    /// Require the caller's role to be one of `allowed`
    pub fn require_role(context: &AuthContext, allowed: &[&str]) -> Result<()> {
        if allowed.iter().any(|role| context.has_role(role)) {
            Ok(())
        } else {
            Err(PlatformError::forbidden("Insufficient role"))
        }
    }

    /// Require the configured admin role
    pub fn require_admin(context: &AuthContext, defaults: &RoleDefaults) -> Result<()> {
        require_role(context, &[defaults.admin_title.as_str()])
    }

    /// Allow the owner of a resource or an admin
    pub fn require_self_or_admin(
        context: &AuthContext,
        owner_id: &str,
        defaults: &RoleDefaults,
    ) -> Result<()> {
        if context.is_self(owner_id) {
            Ok(())
        } else {
            require_admin(context, defaults)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(role: &str) -> AuthContext {
        AuthContext {
            user_id: "0HZXEQ5Y8JY5Z".to_string(),
            email: "a@b.com".to_string(),
            role: role.to_string(),
        }
    }

    #[test]
    fn test_require_role() {
        assert!(checks::require_role(&context("admin"), &["admin"]).is_ok());
        assert!(checks::require_role(&context("user"), &["admin", "user"]).is_ok());

        let err = checks::require_role(&context("user"), &["admin"]).unwrap_err();
        assert!(matches!(err, PlatformError::Forbidden { .. }));
    }

    #[test]
    fn test_missing_role_is_forbidden() {
        assert!(checks::require_role(&context(""), &["admin"]).is_err());
        assert!(checks::require_role(&context(""), &[""]).is_err());
    }

    #[test]
    fn test_self_or_admin() {
        let defaults = RoleDefaults::default();
        let ctx = context("user");
        assert!(checks::require_self_or_admin(&ctx, "0HZXEQ5Y8JY5Z", &defaults).is_ok());
        assert!(checks::require_self_or_admin(&ctx, "someone-else", &defaults).is_err());
        assert!(checks::require_self_or_admin(&context("admin"), "someone-else", &defaults).is_ok());
    }
}
