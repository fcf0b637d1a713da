//! Development Data Seeder
//!
//! Seeds a usable dataset when the server runs in dev mode.
//!
//! Default credentials:
//!   Admin:    admin@agency.local / DevPassword123!
//!   Customer: client@agency.local / DevPassword123!

use std::sync::Arc;
use tracing::info;

use crate::auth::password_service::{Argon2Config, PasswordPolicy, PasswordService};
use crate::catalog::catalog_service::{CatalogService, PlanInput};
use crate::catalog::form_schema::{FieldDefinition, FieldKind};
use crate::role::entity::RoleDefaults;
use crate::shared::error::Result;
use crate::store::Repositories;
use crate::user::entity::User;

const DEV_PASSWORD: &str = "DevPassword123!";

pub struct DevDataSeeder {
    repos: Repositories,
    roles: RoleDefaults,
    password_service: PasswordService,
}

impl DevDataSeeder {
    pub fn new(repos: Repositories, roles: RoleDefaults) -> Result<Self> {
        // Testing params keep startup fast; still Argon2id
        let password_service = PasswordService::new(Argon2Config::testing(), PasswordPolicy::default())?;
        Ok(Self { repos, roles, password_service })
    }

    pub async fn seed(&self) -> Result<()> {
        info!("=== DEV DATA SEEDER ===");

        let admin = self
            .seed_user("admin@agency.local", "Agency", "Admin", &self.roles.admin_role_id)
            .await?;
        self.seed_user("client@agency.local", "Casey", "Client", &self.roles.user_role_id)
            .await?;
        self.seed_services(&admin).await?;

        info!("Development data seeded successfully!");
        info!("Default logins:");
        info!("  Admin:    admin@agency.local / {}", DEV_PASSWORD);
        info!("  Customer: client@agency.local / {}", DEV_PASSWORD);
        info!("=======================");
        Ok(())
    }

    async fn seed_user(&self, email: &str, first: &str, last: &str, role_id: &str) -> Result<User> {
        if let Some(existing) = self.repos.users.find_by_email(email).await? {
            return Ok(existing);
        }

        let hash = self.password_service.hash_password(DEV_PASSWORD)?;
        let mut user = User::new(email, hash, role_id)
            .with_name(Some(first.to_string()), Some(last.to_string()));
        user.mark_verified();
        self.repos.users.insert(&user).await?;
        info!("Created user: {}", email);
        Ok(user)
    }

    async fn seed_services(&self, admin: &User) -> Result<()> {
        let catalog = CatalogService::new(Arc::clone(&self.repos.services));
        if self.repos.services.find_by_name("Website design").await?.is_some() {
            return Ok(());
        }

        let plans = vec![
            PlanInput {
                id: None,
                name: "Starter".to_string(),
                price_cents: 99_900,
                features: vec!["Up to 5 pages".to_string(), "Contact form".to_string()],
            },
            PlanInput {
                id: None,
                name: "Growth".to_string(),
                price_cents: 249_900,
                features: vec!["Up to 20 pages".to_string(), "Blog".to_string(), "SEO setup".to_string()],
            },
        ];

        let fields = vec![
            FieldDefinition::new("company_name", "Company name", FieldKind::Text)
                .required()
                .from_user()
                .in_step(1, Some("About you")),
            FieldDefinition::new("goals", "What should the site achieve?", FieldKind::Textarea)
                .required()
                .in_step(1, Some("About the project")),
            FieldDefinition::new(
                "style",
                "Visual style",
                FieldKind::Radio {
                    options: vec!["Minimal".to_string(), "Bold".to_string(), "Classic".to_string()],
                },
            )
            .in_step(2, Some("Design")),
            FieldDefinition::new("brand_guide", "Brand guidelines", FieldKind::File)
                .in_step(2, Some("Design")),
            FieldDefinition::new("launch_date", "Target launch date", FieldKind::Date)
                .in_step(2, Some("Timeline")),
        ];

        catalog
            .create(
                "Website design",
                Some("Design and build of a marketing website".to_string()),
                plans,
                fields,
                &admin.id,
            )
            .await?;
        info!("Created service: Website design");
        Ok(())
    }
}
