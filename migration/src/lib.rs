//! Control-plane database migrations for the tenancy engine.
//!
//! These migrations manage the shared registry tables only; per-tenant
//! schemas are provisioned at runtime by the schema manager.

pub use sea_orm_migration::prelude::*;

mod m2024_01_01_000001_create_tenants;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m2024_01_01_000001_create_tenants::Migration)]
    }
}
