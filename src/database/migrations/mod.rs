//! SeaORM migrations
//!
//! Database-agnostic migrations that work across SQLite and PostgreSQL.
//! Each migration is ordered by its module name and safe to re-run.

use sea_orm_migration::prelude::*;

pub mod m20250905_000001_initial_schema;
pub mod m20250918_000001_wanted_query_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250905_000001_initial_schema::Migration),
            Box::new(m20250918_000001_wanted_query_indexes::Migration),
        ]
    }
}
