//! Migration: Create modules and components.
//!
//! A project owns modules, a module owns components. Component names are the
//! key the parser reports results against.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                CREATE TABLE modules (
                    id BIGSERIAL PRIMARY KEY,
                    project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    name VARCHAR(255) NOT NULL,
                    description TEXT,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    UNIQUE (project_id, name)
                );

                CREATE TABLE components (
                    id BIGSERIAL PRIMARY KEY,
                    module_id BIGINT NOT NULL REFERENCES modules(id) ON DELETE CASCADE,
                    name VARCHAR(255) NOT NULL,
                    description TEXT,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    UNIQUE (module_id, name)
                );

                -- Reconciliation resolves components by name
                CREATE INDEX idx_components_name ON components(name);
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                DROP TABLE IF EXISTS components CASCADE;
                DROP TABLE IF EXISTS modules CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
