//! Default Role Seeder
//!
//! Makes sure the configured user and admin roles exist. Safe to run on
//! every start.

use std::sync::Arc;
use tracing::info;

use crate::role::entity::RoleDefaults;
use crate::role::repository::RoleRepository;
use crate::shared::error::Result;

pub struct RoleSeeder {
    roles: Arc<dyn RoleRepository>,
    defaults: RoleDefaults,
}

impl RoleSeeder {
    pub fn new(roles: Arc<dyn RoleRepository>, defaults: RoleDefaults) -> Self {
        Self { roles, defaults }
    }

    /// Insert each missing default role. Returns how many were created.
    pub async fn seed(&self) -> Result<usize> {
        let mut created = 0;
        for role in self.defaults.seed_roles() {
            if self.roles.find_by_id(&role.id).await?.is_some() {
                continue;
            }
            self.roles.insert(&role).await?;
            info!(role_id = %role.id, title = %role.title, "Seeded default role");
            created += 1;
        }
        Ok(created)
    }
}
