//! Startup seeders

pub mod dev_seeder;
pub mod role_seeder;

pub use dev_seeder::DevDataSeeder;
pub use role_seeder::RoleSeeder;
