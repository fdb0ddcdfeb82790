//! Migration: Create test_cases and test_errors tables.
//!
//! Both are written only by result reconciliation and never updated.

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
                CREATE TABLE test_cases (
                    id BIGSERIAL PRIMARY KEY,
                    run_id BIGINT NOT NULL REFERENCES regression_runs(id) ON DELETE CASCADE,
                    component_id BIGINT NOT NULL REFERENCES components(id) ON DELETE CASCADE,
                    owner_id BIGINT NOT NULL REFERENCES users(id),
                    test_name TEXT NOT NULL,
                    test_command TEXT NOT NULL DEFAULT '',
                    status VARCHAR(10) NOT NULL
                        CHECK (status IN ('PASS', 'FAIL', 'UNKNOWN')),
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_test_cases_run_component ON test_cases(run_id, component_id);
                CREATE INDEX idx_test_cases_component_id ON test_cases(component_id);
                CREATE INDEX idx_test_cases_owner_id ON test_cases(owner_id);

                CREATE TABLE test_errors (
                    id BIGSERIAL PRIMARY KEY,
                    test_id BIGINT NOT NULL REFERENCES test_cases(id) ON DELETE CASCADE,
                    message TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
                );

                CREATE INDEX idx_test_errors_test_id ON test_errors(test_id, id);
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
                DROP TABLE IF EXISTS test_errors CASCADE;
                DROP TABLE IF EXISTS test_cases CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
