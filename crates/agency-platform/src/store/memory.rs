//! In-memory store
//!
//! Implements every repository trait over `parking_lot` locked maps. Used by
//! the test suites and by the `memory` store backend. Uniqueness rules match
//! the MongoDB indexes: emails, role titles and service names are unique
//! across all records, soft-deleted ones included.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::auth::credential::{CredentialKind, CredentialToken};
use crate::auth::credential_repository::CredentialTokenRepository;
use crate::catalog::entity::Service;
use crate::catalog::repository::ServiceRepository;
use crate::role::entity::Role;
use crate::role::repository::RoleRepository;
use crate::service_request::entity::ServiceRequest;
use crate::service_request::repository::ServiceRequestRepository;
use crate::shared::error::{PlatformError, Result};
use crate::user::entity::User;
use crate::user::repository::UserRepository;

#[derive(Default)]
pub struct MemoryStore {
    users: RwLock<HashMap<String, User>>,
    roles: RwLock<HashMap<String, Role>>,
    credentials: RwLock<Vec<CredentialToken>>,
    services: RwLock<HashMap<String, Service>>,
    service_requests: RwLock<HashMap<String, ServiceRequest>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn insert(&self, user: &User) -> Result<()> {
        let mut users = self.users.write();
        if users.values().any(|u| u.email == user.email) {
            return Err(PlatformError::duplicate("User", "email", &user.email));
        }
        users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.read().get(id).filter(|u| !u.is_deleted()).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self
            .users
            .read()
            .values()
            .find(|u| u.email == email && !u.is_deleted())
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<User>> {
        let mut users: Vec<User> = self
            .users
            .read()
            .values()
            .filter(|u| !u.is_deleted())
            .cloned()
            .collect();
        users.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
        Ok(users)
    }

    async fn update(&self, user: &User) -> Result<()> {
        let mut users = self.users.write();
        if users.values().any(|u| u.email == user.email && u.id != user.id) {
            return Err(PlatformError::duplicate("User", "email", &user.email));
        }
        if let Some(existing) = users.get_mut(&user.id) {
            *existing = user.clone();
        }
        Ok(())
    }

    async fn soft_delete(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        match self.users.write().get_mut(id) {
            Some(user) if !user.is_deleted() => {
                user.deleted_at = Some(at);
                user.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl RoleRepository for MemoryStore {
    async fn insert(&self, role: &Role) -> Result<()> {
        let mut roles = self.roles.write();
        if roles.values().any(|r| r.title == role.title) {
            return Err(PlatformError::duplicate("Role", "title", &role.title));
        }
        roles.insert(role.id.clone(), role.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Role>> {
        Ok(self.roles.read().get(id).filter(|r| !r.is_deleted()).cloned())
    }

    async fn find_by_title(&self, title: &str) -> Result<Option<Role>> {
        Ok(self
            .roles
            .read()
            .values()
            .find(|r| r.title == title && !r.is_deleted())
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Role>> {
        let mut roles: Vec<Role> = self
            .roles
            .read()
            .values()
            .filter(|r| !r.is_deleted())
            .cloned()
            .collect();
        roles.sort_by(|a, b| (a.created_at, &a.id).cmp(&(b.created_at, &b.id)));
        Ok(roles)
    }

    async fn update(&self, role: &Role) -> Result<()> {
        let mut roles = self.roles.write();
        if roles.values().any(|r| r.title == role.title && r.id != role.id) {
            return Err(PlatformError::duplicate("Role", "title", &role.title));
        }
        if let Some(existing) = roles.get_mut(&role.id) {
            *existing = role.clone();
        }
        Ok(())
    }

    async fn soft_delete(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        match self.roles.write().get_mut(id) {
            Some(role) if !role.is_deleted() => {
                role.deleted_at = Some(at);
                role.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl CredentialTokenRepository for MemoryStore {
    async fn insert_if_no_active(&self, token: &CredentialToken, now: DateTime<Utc>) -> Result<bool> {
        let mut tokens = self.credentials.write();

        let same_slot = |t: &CredentialToken| t.user_id == token.user_id && t.kind == token.kind;
        if tokens.iter().any(|t| same_slot(t) && t.is_active(now)) {
            return Ok(false);
        }

        tokens.retain(|t| !same_slot(t));
        tokens.push(token.clone());
        Ok(true)
    }

    async fn find_active(
        &self,
        user_id: &str,
        kind: CredentialKind,
        now: DateTime<Utc>,
    ) -> Result<Option<CredentialToken>> {
        Ok(self
            .credentials
            .read()
            .iter()
            .filter(|t| t.user_id == user_id && t.kind == kind && t.is_active(now))
            .max_by_key(|t| t.issued_at)
            .cloned())
    }

    async fn mark_consumed(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        let mut tokens = self.credentials.write();
        match tokens.iter_mut().find(|t| t.id == id) {
            Some(token) if token.consumed_at.is_none() => {
                token.consumed_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ServiceRepository for MemoryStore {
    async fn insert(&self, service: &Service) -> Result<()> {
        let mut services = self.services.write();
        if services.values().any(|s| s.name == service.name) {
            return Err(PlatformError::duplicate("Service", "name", &service.name));
        }
        services.insert(service.id.clone(), service.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Service>> {
        Ok(self.services.read().get(id).filter(|s| !s.is_deleted()).cloned())
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Service>> {
        Ok(self
            .services
            .read()
            .values()
            .find(|s| s.name == name && !s.is_deleted())
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<Service>> {
        let mut services: Vec<Service> = self
            .services
            .read()
            .values()
            .filter(|s| !s.is_deleted())
            .cloned()
            .collect();
        services.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(services)
    }

    async fn update(&self, service: &Service) -> Result<()> {
        let mut services = self.services.write();
        if services.values().any(|s| s.name == service.name && s.id != service.id) {
            return Err(PlatformError::duplicate("Service", "name", &service.name));
        }
        if let Some(existing) = services.get_mut(&service.id) {
            *existing = service.clone();
        }
        Ok(())
    }

    async fn soft_delete(&self, id: &str, at: DateTime<Utc>) -> Result<bool> {
        match self.services.write().get_mut(id) {
            Some(service) if !service.is_deleted() => {
                service.deleted_at = Some(at);
                service.updated_at = at;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[async_trait]
impl ServiceRequestRepository for MemoryStore {
    async fn insert(&self, request: &ServiceRequest) -> Result<()> {
        self.service_requests
            .write()
            .insert(request.id.clone(), request.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<ServiceRequest>> {
        Ok(self.service_requests.read().get(id).cloned())
    }

    async fn find_by_user(&self, user_id: &str) -> Result<Vec<ServiceRequest>> {
        let mut requests: Vec<ServiceRequest> = self
            .service_requests
            .read()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
        Ok(requests)
    }

    async fn find_all(&self) -> Result<Vec<ServiceRequest>> {
        let mut requests: Vec<ServiceRequest> =
            self.service_requests.read().values().cloned().collect();
        requests.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
        Ok(requests)
    }

    async fn update(&self, request: &ServiceRequest) -> Result<()> {
        if let Some(existing) = self.service_requests.write().get_mut(&request.id) {
            *existing = request.clone();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_email_unique_even_after_delete() {
        let store = MemoryStore::new();
        let user = User::new("a@b.com", "hash", "role");
        UserRepository::insert(&store, &user).await.unwrap();

        assert!(UserRepository::soft_delete(&store, &user.id, Utc::now()).await.unwrap());
        assert!(UserRepository::find_by_id(&store, &user.id).await.unwrap().is_none());
        assert!(store.find_by_email("a@b.com").await.unwrap().is_none());

        let again = UserRepository::insert(&store, &User::new("a@b.com", "hash", "role")).await;
        assert!(matches!(again, Err(PlatformError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn test_soft_delete_once() {
        let store = MemoryStore::new();
        let role = Role::new("manager");
        RoleRepository::insert(&store, &role).await.unwrap();

        assert!(RoleRepository::soft_delete(&store, &role.id, Utc::now()).await.unwrap());
        assert!(!RoleRepository::soft_delete(&store, &role.id, Utc::now()).await.unwrap());
        assert!(store.find_by_title("manager").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_role_rename_onto_deleted_title() {
        let store = MemoryStore::new();
        let old = Role::new("manager");
        RoleRepository::insert(&store, &old).await.unwrap();
        RoleRepository::soft_delete(&store, &old.id, Utc::now()).await.unwrap();

        let mut ops = Role::new("ops");
        RoleRepository::insert(&store, &ops).await.unwrap();
        ops.title = "manager".to_string();

        let renamed = RoleRepository::update(&store, &ops).await;
        assert!(matches!(renamed, Err(PlatformError::Duplicate { .. })));
    }

    #[tokio::test]
    async fn test_credential_slot_reused_after_expiry() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let ttl = Duration::seconds(300);

        let first = CredentialToken::new("u1", CredentialKind::EmailOtp, "111111", now, ttl);
        assert!(store.insert_if_no_active(&first, now).await.unwrap());

        let second = CredentialToken::new("u1", CredentialKind::EmailOtp, "222222", now, ttl);
        assert!(!store.insert_if_no_active(&second, now).await.unwrap());

        let later = now + ttl;
        let third = CredentialToken::new("u1", CredentialKind::EmailOtp, "333333", later, ttl);
        assert!(store.insert_if_no_active(&third, later).await.unwrap());

        let active = store.find_active("u1", CredentialKind::EmailOtp, later).await.unwrap().unwrap();
        assert_eq!(active.id, third.id);
        assert_eq!(store.credentials.read().len(), 1);
    }

    #[tokio::test]
    async fn test_mark_consumed_once() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let token = CredentialToken::new("u1", CredentialKind::PasswordReset, "s", now, Duration::minutes(15));
        store.insert_if_no_active(&token, now).await.unwrap();

        assert!(store.mark_consumed(&token.id, now).await.unwrap());
        assert!(!store.mark_consumed(&token.id, now).await.unwrap());
        assert!(store.find_active("u1", CredentialKind::PasswordReset, now).await.unwrap().is_none());
    }
}
