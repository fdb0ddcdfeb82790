//! SeaORM database migrations.

pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_users_projects;
mod m20250601_000002_create_modules_components;
mod m20250601_000003_create_regression_runs;
mod m20250601_000004_create_test_cases;
mod m20250601_000005_create_unresolved_and_artifacts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_users_projects::Migration),
            Box::new(m20250601_000002_create_modules_components::Migration),
            Box::new(m20250601_000003_create_regression_runs::Migration),
            Box::new(m20250601_000004_create_test_cases::Migration),
            Box::new(m20250601_000005_create_unresolved_and_artifacts::Migration),
        ]
    }
}
