//! Read models for the regression drill-down endpoints.
//!
//! Counters are computed from `test_cases` at query time; they are never stored.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::FromQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A FAIL or UNKNOWN test of a run.
#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult, ToSchema)]
pub struct FailingTest {
    pub test_id: i64,
    pub test_name: String,
    pub test_command: String,
    pub status: String,
    pub module_id: i64,
    pub module_name: String,
    pub component_id: i64,
    pub component_name: String,
    pub owner_name: String,
}

/// A module touched by a run, with per-run counters.
#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult, ToSchema)]
pub struct RunModule {
    pub module_id: i64,
    pub module_name: String,
    pub component_count: i64,
    pub total_tests: i64,
    pub passed_tests: i64,
    pub failed_tests: i64,
    pub unknown_tests: i64,
    /// Latest execution date of any run that tested this module
    pub last_regression_date: Option<NaiveDate>,
}

/// Module summary within one run.
#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult, ToSchema)]
pub struct ModuleSummary {
    pub run_id: i64,
    pub module_id: i64,
    pub module_name: String,
    pub module_description: Option<String>,
    pub component_count: i64,
    pub total_tests: i64,
    pub passed_tests: i64,
    pub failed_tests: i64,
    pub unknown_tests: i64,
    pub last_regression_date: Option<NaiveDate>,
}

/// Per-owner test count inside a module for one run.
#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult, ToSchema)]
pub struct Contribution {
    pub user_id: i64,
    pub user_name: String,
    pub test_count: i64,
}

/// Component row of a module within one run, grouped per owner.
#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult, ToSchema)]
pub struct ModuleComponent {
    pub component_id: i64,
    pub component_name: String,
    pub owner_id: i64,
    pub owner_name: String,
    pub total_tests: i64,
    pub passed_tests: i64,
    pub failed_tests: i64,
    pub unknown_tests: i64,
    pub last_regression_date: Option<NaiveDate>,
}

/// Aggregate row backing [`ComponentSummary`].
#[derive(Debug, Clone, FromQueryResult)]
pub struct ComponentSummaryRow {
    pub component_id: i64,
    pub component_name: String,
    pub component_description: Option<String>,
    pub module_id: i64,
    pub module_name: String,
    pub total_tests: i64,
    pub passed_tests: i64,
    pub failed_tests: i64,
    pub unknown_tests: i64,
    pub last_regression_date: Option<NaiveDate>,
}

/// A test of a component within one run.
#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult, ToSchema)]
pub struct ComponentTest {
    pub test_id: i64,
    pub test_name: String,
    pub test_command: String,
    pub status: String,
    pub owner_id: i64,
    pub owner_name: String,
}

/// Component summary within one run, including its tests.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComponentSummary {
    pub run_id: i64,
    pub component_id: i64,
    pub component_name: String,
    pub component_description: Option<String>,
    pub module_id: i64,
    pub module_name: String,
    pub total_tests: i64,
    pub passed_tests: i64,
    pub failed_tests: i64,
    pub unknown_tests: i64,
    pub last_regression_date: Option<NaiveDate>,
    pub tests: Vec<ComponentTest>,
}

impl ComponentSummary {
    pub fn from_row(run_id: i64, row: ComponentSummaryRow, tests: Vec<ComponentTest>) -> Self {
        Self {
            run_id,
            component_id: row.component_id,
            component_name: row.component_name,
            component_description: row.component_description,
            module_id: row.module_id,
            module_name: row.module_name,
            total_tests: row.total_tests,
            passed_tests: row.passed_tests,
            failed_tests: row.failed_tests,
            unknown_tests: row.unknown_tests,
            last_regression_date: row.last_regression_date,
            tests,
        }
    }
}

/// An error line of a component's test within one run.
#[derive(Debug, Clone, Serialize, Deserialize, FromQueryResult, ToSchema)]
pub struct ComponentError {
    pub error_id: i64,
    pub test_id: i64,
    pub test_name: String,
    pub status: String,
    pub message: String,
}

/// Test case row of a component's history.
#[derive(Debug, Clone, FromQueryResult)]
pub struct HistoryRow {
    pub test_id: i64,
    pub run_id: i64,
    pub run_name: String,
    pub execution_date: NaiveDate,
    pub test_name: String,
    pub test_command: String,
    pub status: String,
    pub owner_name: String,
    pub created_at: DateTime<Utc>,
}

/// Error message row keyed by test, used to assemble history.
#[derive(Debug, Clone, FromQueryResult)]
pub struct TestErrorRow {
    pub test_id: i64,
    pub message: String,
}

/// One test case of a component across runs, with its errors in insertion order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HistoryEntry {
    pub test_id: i64,
    pub run_id: i64,
    pub run_name: String,
    pub execution_date: NaiveDate,
    pub test_name: String,
    pub test_command: String,
    pub status: String,
    pub owner_name: String,
    pub created_at: DateTime<Utc>,
    pub errors: Vec<String>,
}

impl HistoryEntry {
    pub fn from_row(row: HistoryRow, errors: Vec<String>) -> Self {
        Self {
            test_id: row.test_id,
            run_id: row.run_id,
            run_name: row.run_name,
            execution_date: row.execution_date,
            test_name: row.test_name,
            test_command: row.test_command,
            status: row.status,
            owner_name: row.owner_name,
            created_at: row.created_at,
            errors,
        }
    }
}
