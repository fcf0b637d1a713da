//! User lifecycle after registration: profile, password, role, deletion.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::auth::password_service::PasswordService;
use crate::role::repository::RoleRepository;
use crate::shared::error::{PlatformError, Result};
use crate::user::entity::User;
use crate::user::repository::UserRepository;

/// Profile edits. `Some("")` clears a field, `None` leaves it alone.
#[derive(Debug, Clone, Default)]
pub struct ProfileChanges {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub company_name: Option<String>,
    pub website: Option<String>,
}

fn apply(target: &mut Option<String>, change: Option<String>) {
    if let Some(value) = change {
        let value = value.trim();
        *target = if value.is_empty() { None } else { Some(value.to_string()) };
    }
}

pub struct UserService {
    users: Arc<dyn UserRepository>,
    roles: Arc<dyn RoleRepository>,
    passwords: Arc<PasswordService>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        roles: Arc<dyn RoleRepository>,
        passwords: Arc<PasswordService>,
    ) -> Self {
        Self { users, roles, passwords }
    }

    pub async fn get(&self, id: &str) -> Result<User> {
        self.users
            .find_by_id(id)
            .await?
            .ok_or_else(|| PlatformError::not_found("User", id))
    }

    pub async fn list(&self) -> Result<Vec<User>> {
        self.users.find_all().await
    }

    pub async fn update_profile(&self, id: &str, changes: ProfileChanges) -> Result<User> {
        let mut user = self.get(id).await?;

        apply(&mut user.first_name, changes.first_name);
        apply(&mut user.last_name, changes.last_name);
        apply(&mut user.phone, changes.phone);
        apply(&mut user.company_name, changes.company_name);
        apply(&mut user.website, changes.website);
        user.updated_at = Utc::now();

        self.users.update(&user).await?;
        Ok(user)
    }

    #[tracing::instrument(skip(self, current, new))]
    pub async fn change_password(&self, id: &str, current: &str, new: &str) -> Result<()> {
        let mut user = self.get(id).await?;

        if !self.passwords.verify_password(current, &user.password_hash)? {
            return Err(PlatformError::validation("Current password is incorrect"));
        }

        user.set_password_hash(self.passwords.hash_password(new)?);
        self.users.update(&user).await?;
        info!(user_id = %id, "Password changed");
        Ok(())
    }

    pub async fn assign_role(&self, id: &str, role_id: &str) -> Result<User> {
        let role = self
            .roles
            .find_by_id(role_id)
            .await?
            .ok_or_else(|| PlatformError::not_found("Role", role_id))?;

        let mut user = self.get(id).await?;
        user.role_id = role.id;
        user.updated_at = Utc::now();
        self.users.update(&user).await?;

        info!(user_id = %id, role = %role.title, "Role assigned");
        Ok(user)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.users.soft_delete(id, Utc::now()).await? {
            return Err(PlatformError::not_found("User", id));
        }
        info!(user_id = %id, "User deleted");
        Ok(())
    }
}
