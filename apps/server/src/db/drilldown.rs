//! Read-side queries for the regression drill-down views.
//!
//! Counters are aggregated from `test_cases` on every request. "Last regression
//! date" is the latest execution date of any run that tested the module or
//! component, not just the run being viewed.

use std::collections::HashMap;

use sea_orm::{
    ColumnTrait, DatabaseBackend, EntityTrait, FromQueryResult, QueryFilter, QueryOrder,
    Statement, Value,
};

use crate::entity::{log_artifact, unresolved_test_record};
use crate::error::{AppError, AppResult};
use crate::models::drilldown::{ComponentSummaryRow, HistoryRow, TestErrorRow};
use crate::models::{
    ComponentError, ComponentSummary, ComponentTest, Contribution, FailingTest, HistoryEntry,
    ModuleComponent, ModuleSummary, RunModule,
};

use super::DbPool;

const STATUS_COUNTS: &str = r#"
    COUNT(tc.id) AS total_tests,
    COUNT(tc.id) FILTER (WHERE tc.status = 'PASS') AS passed_tests,
    COUNT(tc.id) FILTER (WHERE tc.status = 'FAIL') AS failed_tests,
    COUNT(tc.id) FILTER (WHERE tc.status = 'UNKNOWN') AS unknown_tests
"#;

const MODULE_LAST_DATE: &str = r#"
    (SELECT MAX(r.execution_date)
     FROM regression_runs r
     INNER JOIN test_cases t2 ON t2.run_id = r.id
     INNER JOIN components c2 ON c2.id = t2.component_id
     WHERE c2.module_id = m.id) AS last_regression_date
"#;

const COMPONENT_LAST_DATE: &str = r#"
    (SELECT MAX(r.execution_date)
     FROM regression_runs r
     INNER JOIN test_cases t2 ON t2.run_id = r.id
     WHERE t2.component_id = c.id) AS last_regression_date
"#;

fn statement(sql: &str, values: Vec<Value>) -> Statement {
    Statement::from_sql_and_values(DatabaseBackend::Postgres, sql, values)
}

impl DbPool {
    /// FAIL/UNKNOWN tests of a run, optionally restricted to one module.
    pub async fn get_failing_tests(
        &self,
        run_id: i64,
        module_id: Option<i64>,
    ) -> AppResult<Vec<FailingTest>> {
        let mut values = vec![Value::from(run_id)];
        let module_filter = match module_id {
            Some(id) => {
                values.push(Value::from(id));
                "AND m.id = $2"
            }
            None => "",
        };

        let sql = format!(
            r#"
            SELECT tc.id AS test_id, tc.test_name, tc.test_command, tc.status,
                   m.id AS module_id, m.name AS module_name,
                   c.id AS component_id, c.name AS component_name,
                   u.name AS owner_name
            FROM test_cases tc
            INNER JOIN components c ON c.id = tc.component_id
            INNER JOIN modules m ON m.id = c.module_id
            INNER JOIN users u ON u.id = tc.owner_id
            WHERE tc.run_id = $1
              AND tc.status IN ('FAIL', 'UNKNOWN')
              {}
            ORDER BY m.name, c.name, tc.id
            "#,
            module_filter
        );

        FailingTest::find_by_statement(statement(&sql, values))
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get failing tests: {}", e)))
    }

    /// Modules touched by a run, with per-run counters.
    pub async fn get_run_modules(&self, run_id: i64) -> AppResult<Vec<RunModule>> {
        let sql = format!(
            r#"
            SELECT m.id AS module_id, m.name AS module_name,
                   COUNT(DISTINCT tc.component_id) AS component_count,
                   {},
                   {}
            FROM test_cases tc
            INNER JOIN components c ON c.id = tc.component_id
            INNER JOIN modules m ON m.id = c.module_id
            WHERE tc.run_id = $1
            GROUP BY m.id, m.name
            ORDER BY m.name
            "#,
            STATUS_COUNTS, MODULE_LAST_DATE
        );

        RunModule::find_by_statement(statement(&sql, vec![Value::from(run_id)]))
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get run modules: {}", e)))
    }

    /// Module summary within a run; `None` when the run has no tests in it.
    pub async fn get_module_summary(
        &self,
        run_id: i64,
        module_id: i64,
    ) -> AppResult<Option<ModuleSummary>> {
        let sql = format!(
            r#"
            SELECT tc.run_id, m.id AS module_id, m.name AS module_name,
                   m.description AS module_description,
                   COUNT(DISTINCT tc.component_id) AS component_count,
                   {},
                   {}
            FROM test_cases tc
            INNER JOIN components c ON c.id = tc.component_id
            INNER JOIN modules m ON m.id = c.module_id
            WHERE tc.run_id = $1 AND m.id = $2
            GROUP BY tc.run_id, m.id, m.name, m.description
            "#,
            STATUS_COUNTS, MODULE_LAST_DATE
        );

        ModuleSummary::find_by_statement(statement(
            &sql,
            vec![Value::from(run_id), Value::from(module_id)],
        ))
        .one(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to get module summary: {}", e)))
    }

    /// Per-owner test counts inside a module for a run.
    pub async fn get_module_contribution(
        &self,
        run_id: i64,
        module_id: i64,
    ) -> AppResult<Vec<Contribution>> {
        Contribution::find_by_statement(statement(
            r#"
            SELECT u.id AS user_id, u.name AS user_name, COUNT(tc.id) AS test_count
            FROM test_cases tc
            INNER JOIN components c ON c.id = tc.component_id
            INNER JOIN users u ON u.id = tc.owner_id
            WHERE tc.run_id = $1 AND c.module_id = $2
            GROUP BY u.id, u.name
            ORDER BY test_count DESC, u.name
            "#,
            vec![Value::from(run_id), Value::from(module_id)],
        ))
        .all(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to get module contribution: {}", e)))
    }

    /// Components of a module within a run, one row per component and owner.
    pub async fn get_module_components(
        &self,
        run_id: i64,
        module_id: i64,
    ) -> AppResult<Vec<ModuleComponent>> {
        let sql = format!(
            r#"
            SELECT c.id AS component_id, c.name AS component_name,
                   u.id AS owner_id, u.name AS owner_name,
                   {},
                   {}
            FROM test_cases tc
            INNER JOIN components c ON c.id = tc.component_id
            INNER JOIN users u ON u.id = tc.owner_id
            WHERE tc.run_id = $1 AND c.module_id = $2
            GROUP BY c.id, c.name, u.id, u.name
            ORDER BY c.name, u.name
            "#,
            STATUS_COUNTS, COMPONENT_LAST_DATE
        );

        ModuleComponent::find_by_statement(statement(
            &sql,
            vec![Value::from(run_id), Value::from(module_id)],
        ))
        .all(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to get module components: {}", e)))
    }

    /// Component summary with its tests for a run; `None` when it has no tests there.
    pub async fn get_component_summary(
        &self,
        run_id: i64,
        module_id: i64,
        component_id: i64,
    ) -> AppResult<Option<ComponentSummary>> {
        let sql = format!(
            r#"
            SELECT c.id AS component_id, c.name AS component_name,
                   c.description AS component_description,
                   m.id AS module_id, m.name AS module_name,
                   {},
                   {}
            FROM test_cases tc
            INNER JOIN components c ON c.id = tc.component_id
            INNER JOIN modules m ON m.id = c.module_id
            WHERE tc.run_id = $1 AND m.id = $2 AND c.id = $3
            GROUP BY c.id, c.name, c.description, m.id, m.name
            "#,
            STATUS_COUNTS, COMPONENT_LAST_DATE
        );

        let values = vec![
            Value::from(run_id),
            Value::from(module_id),
            Value::from(component_id),
        ];

        let Some(row) = ComponentSummaryRow::find_by_statement(statement(&sql, values.clone()))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get component summary: {}", e)))?
        else {
            return Ok(None);
        };

        let tests = ComponentTest::find_by_statement(statement(
            r#"
            SELECT tc.id AS test_id, tc.test_name, tc.test_command, tc.status,
                   u.id AS owner_id, u.name AS owner_name
            FROM test_cases tc
            INNER JOIN components c ON c.id = tc.component_id
            INNER JOIN users u ON u.id = tc.owner_id
            WHERE tc.run_id = $1 AND c.module_id = $2 AND c.id = $3
            ORDER BY tc.id
            "#,
            values,
        ))
        .all(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to get component tests: {}", e)))?;

        Ok(Some(ComponentSummary::from_row(run_id, row, tests)))
    }

    /// Error messages of a component's tests in a run, in insertion order.
    pub async fn get_component_errors(
        &self,
        run_id: i64,
        module_id: i64,
        component_id: i64,
    ) -> AppResult<Vec<ComponentError>> {
        ComponentError::find_by_statement(statement(
            r#"
            SELECT e.id AS error_id, tc.id AS test_id, tc.test_name, tc.status, e.message
            FROM test_errors e
            INNER JOIN test_cases tc ON tc.id = e.test_id
            INNER JOIN components c ON c.id = tc.component_id
            WHERE tc.run_id = $1 AND c.module_id = $2 AND c.id = $3
            ORDER BY e.id
            "#,
            vec![
                Value::from(run_id),
                Value::from(module_id),
                Value::from(component_id),
            ],
        ))
        .all(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to get component errors: {}", e)))
    }

    /// Every test case of a component across all runs, newest run first, each
    /// with its error messages in insertion order.
    pub async fn get_component_history(
        &self,
        module_id: i64,
        component_id: i64,
    ) -> AppResult<Vec<HistoryEntry>> {
        let values = vec![Value::from(module_id), Value::from(component_id)];

        let rows = HistoryRow::find_by_statement(statement(
            r#"
            SELECT tc.id AS test_id, r.id AS run_id, r.run_name, r.execution_date,
                   tc.test_name, tc.test_command, tc.status, u.name AS owner_name,
                   tc.created_at
            FROM test_cases tc
            INNER JOIN regression_runs r ON r.id = tc.run_id
            INNER JOIN components c ON c.id = tc.component_id
            INNER JOIN users u ON u.id = tc.owner_id
            WHERE c.module_id = $1 AND c.id = $2
            ORDER BY r.execution_date DESC, r.id DESC, tc.id
            "#,
            values.clone(),
        ))
        .all(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to get component history: {}", e)))?;

        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let error_rows = TestErrorRow::find_by_statement(statement(
            r#"
            SELECT e.test_id, e.message
            FROM test_errors e
            INNER JOIN test_cases tc ON tc.id = e.test_id
            INNER JOIN components c ON c.id = tc.component_id
            WHERE c.module_id = $1 AND c.id = $2
            ORDER BY e.id
            "#,
            values,
        ))
        .all(self.connection())
        .await
        .map_err(|e| AppError::Database(format!("Failed to get history errors: {}", e)))?;

        let mut errors_by_test: HashMap<i64, Vec<String>> = HashMap::new();
        for row in error_rows {
            errors_by_test.entry(row.test_id).or_default().push(row.message);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let errors = errors_by_test.remove(&row.test_id).unwrap_or_default();
                HistoryEntry::from_row(row, errors)
            })
            .collect())
    }

    /// Recorded log file of a component for a run.
    pub async fn get_log_artifact(
        &self,
        run_id: i64,
        component_id: i64,
    ) -> AppResult<Option<log_artifact::Model>> {
        log_artifact::Entity::find()
            .filter(log_artifact::Column::RunId.eq(run_id))
            .filter(log_artifact::Column::ComponentId.eq(component_id))
            .one(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get log artifact: {}", e)))
    }

    /// Parsed records of a run that could not be attached, in payload order.
    pub async fn get_unresolved_records(
        &self,
        run_id: i64,
    ) -> AppResult<Vec<unresolved_test_record::Model>> {
        unresolved_test_record::Entity::find()
            .filter(unresolved_test_record::Column::RunId.eq(run_id))
            .order_by_asc(unresolved_test_record::Column::Position)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to get unresolved records: {}", e)))
    }
}
