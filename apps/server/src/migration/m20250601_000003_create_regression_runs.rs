//! Migration: Create regression_runs table.
//!
//! A run is created with zero counters in `pending`, moves to `running` once the
//! parser is launched and ends in `complete` or `failed`.

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
                CREATE TABLE regression_runs (
                    id BIGSERIAL PRIMARY KEY,
                    project_id BIGINT NOT NULL REFERENCES projects(id) ON DELETE CASCADE,
                    run_name VARCHAR(255) NOT NULL,
                    plugin VARCHAR(100) NOT NULL,
                    execution_date DATE NOT NULL,

                    total_tests INTEGER NOT NULL DEFAULT 0 CHECK (total_tests >= 0),
                    passed_tests INTEGER NOT NULL DEFAULT 0 CHECK (passed_tests >= 0),
                    failed_tests INTEGER NOT NULL DEFAULT 0 CHECK (failed_tests >= 0),
                    unknown_tests INTEGER NOT NULL DEFAULT 0 CHECK (unknown_tests >= 0),

                    status VARCHAR(20) NOT NULL DEFAULT 'pending'
                        CHECK (status IN ('pending', 'running', 'complete', 'failed')),
                    error_message TEXT,

                    created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                    completed_at TIMESTAMPTZ,

                    CONSTRAINT regression_runs_totals_balance
                        CHECK (total_tests = passed_tests + failed_tests + unknown_tests)
                );

                CREATE INDEX idx_regression_runs_project_id
                    ON regression_runs(project_id, execution_date DESC);

                -- Watchdog scans non-terminal runs by age
                CREATE INDEX idx_regression_runs_open
                    ON regression_runs(created_at)
                    WHERE status IN ('pending', 'running');

                CREATE TRIGGER update_regression_runs_updated_at
                    BEFORE UPDATE ON regression_runs
                    FOR EACH ROW
                    EXECUTE FUNCTION update_updated_at_column();
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
                DROP TRIGGER IF EXISTS update_regression_runs_updated_at ON regression_runs;
                DROP TABLE IF EXISTS regression_runs CASCADE;
                "#,
            )
            .await?;

        Ok(())
    }
}
