//! Migration: Create unresolved_test_records and log_artifacts tables.
//!
//! Unresolved records keep parser output that matched no single component/owner
//! pair. Log artifacts pin a component's log file to the run at reconcile time.

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
                CREATE TABLE unresolved_test_records (
                    id BIGSERIAL PRIMARY KEY,
                    run_id BIGINT NOT NULL REFERENCES regression_runs(id) ON DELETE CASCADE,
                    position INTEGER NOT NULL,
                    test_name TEXT,
                    component VARCHAR(255),
                    owner VARCHAR(255),
                    reason VARCHAR(20) NOT NULL
                        CHECK (reason IN ('no_match', 'ambiguous', 'missing_field')),
                    detail TEXT,
                    payload JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_unresolved_test_records_run_id
                    ON unresolved_test_records(run_id, position);

                CREATE TABLE log_artifacts (
                    id UUID PRIMARY KEY,
                    run_id BIGINT NOT NULL REFERENCES regression_runs(id) ON DELETE CASCADE,
                    component_id BIGINT NOT NULL REFERENCES components(id) ON DELETE CASCADE,
                    file_name VARCHAR(255) NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    UNIQUE (run_id, component_id)
                );
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
                DROP TABLE IF EXISTS log_artifacts CASCADE;
                DROP TABLE IF EXISTS unresolved_test_records CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
