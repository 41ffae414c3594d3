//! Database migrations for the forms relay.
//!
//! Schema changes are expressed with SeaORM Migration so the same set runs
//! against Postgres in production and in-memory SQLite in tests.

pub use sea_orm_migration::prelude::*;

mod m2025_06_02_090000_create_documents;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m2025_06_02_090000_create_documents::Migration)]
    }
}
