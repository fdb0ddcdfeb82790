//! Writes performed while reconciling parser results into a run.
//!
//! Every function takes a generic connection so the whole reconciliation can
//! share one transaction.

use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseBackend, EntityTrait,
    FromQueryResult, NotSet, QueryFilter, Set, Statement, Value,
};
use uuid::Uuid;

use crate::entity::{log_artifact, regression_run, test_case, test_error, unresolved_test_record};
use crate::error::{AppError, AppResult};
use crate::models::{RunStatus, TestStatus, UnresolvedReason};

/// Validated aggregate counters for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub total: i32,
    pub passed: i32,
    pub failed: i32,
    pub unknown: i32,
}

/// A component/owner pair a parsed record could attach to.
#[derive(Debug, Clone, PartialEq, Eq, FromQueryResult)]
pub struct OwnerCandidate {
    pub component_id: i64,
    pub module_name: String,
    pub owner_id: i64,
}

/// Set the counters and complete the run, but only while it is still open.
///
/// Returns the number of rows changed (0 or 1).
pub async fn complete_run<C: ConnectionTrait>(
    conn: &C,
    run_id: i64,
    counts: RunCounts,
) -> AppResult<u64> {
    let result = regression_run::Entity::update_many()
        .col_expr(regression_run::Column::TotalTests, Expr::value(counts.total))
        .col_expr(regression_run::Column::PassedTests, Expr::value(counts.passed))
        .col_expr(regression_run::Column::FailedTests, Expr::value(counts.failed))
        .col_expr(regression_run::Column::UnknownTests, Expr::value(counts.unknown))
        .col_expr(
            regression_run::Column::Status,
            Expr::value(RunStatus::Complete.as_str()),
        )
        .col_expr(regression_run::Column::ErrorMessage, Expr::value(None::<String>))
        .col_expr(regression_run::Column::CompletedAt, Expr::value(Some(Utc::now())))
        .filter(regression_run::Column::Id.eq(run_id))
        .filter(
            regression_run::Column::Status.is_in(RunStatus::OPEN.iter().map(|s| s.as_str())),
        )
        .exec(conn)
        .await
        .map_err(|e| AppError::Database(format!("Failed to update run counters: {}", e)))?;

    Ok(result.rows_affected)
}

/// Component/owner pairs of the run's project matching a component name and
/// owner display name.
///
/// Walks component -> module -> project -> assignment -> user, so only
/// components of the project and users assigned to it can match.
pub async fn find_owner_candidates<C: ConnectionTrait>(
    conn: &C,
    project_id: i64,
    component: &str,
    owner: &str,
) -> AppResult<Vec<OwnerCandidate>> {
    OwnerCandidate::find_by_statement(Statement::from_sql_and_values(
        DatabaseBackend::Postgres,
        r#"
        SELECT c.id AS component_id, m.name AS module_name, u.id AS owner_id
        FROM components c
        INNER JOIN modules m ON m.id = c.module_id
        INNER JOIN user_projects up ON up.project_id = m.project_id
        INNER JOIN users u ON u.id = up.user_id
        WHERE m.project_id = $1
          AND c.name = $2
          AND u.name = $3
        ORDER BY c.id, u.id
        "#,
        [
            Value::from(project_id),
            Value::from(component),
            Value::from(owner),
        ],
    ))
    .all(conn)
    .await
    .map_err(|e| AppError::Database(format!("Failed to resolve component owner: {}", e)))
}

/// Fields of a test case being inserted.
#[derive(Debug, Clone)]
pub struct NewTestCase<'a> {
    pub run_id: i64,
    pub component_id: i64,
    pub owner_id: i64,
    pub test_name: &'a str,
    pub test_command: &'a str,
    pub status: TestStatus,
}

pub async fn insert_test_case<C: ConnectionTrait>(
    conn: &C,
    new: NewTestCase<'_>,
) -> AppResult<test_case::Model> {
    test_case::ActiveModel {
        id: NotSet,
        run_id: Set(new.run_id),
        component_id: Set(new.component_id),
        owner_id: Set(new.owner_id),
        test_name: Set(new.test_name.to_string()),
        test_command: Set(new.test_command.to_string()),
        status: Set(new.status.as_str().to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
    .map_err(|e| AppError::Database(format!("Failed to insert test case: {}", e)))
}

pub async fn insert_test_error<C: ConnectionTrait>(
    conn: &C,
    test_id: i64,
    message: &str,
) -> AppResult<()> {
    test_error::ActiveModel {
        id: NotSet,
        test_id: Set(test_id),
        message: Set(message.to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
    .map_err(|e| AppError::Database(format!("Failed to insert test error: {}", e)))?;

    Ok(())
}

/// Fields of an unresolved record being stored.
#[derive(Debug, Clone)]
pub struct NewUnresolved {
    pub run_id: i64,
    pub position: i32,
    pub test_name: Option<String>,
    pub component: Option<String>,
    pub owner: Option<String>,
    pub reason: UnresolvedReason,
    pub detail: Option<String>,
    pub payload: serde_json::Value,
}

pub async fn insert_unresolved<C: ConnectionTrait>(
    conn: &C,
    new: NewUnresolved,
) -> AppResult<()> {
    unresolved_test_record::ActiveModel {
        id: NotSet,
        run_id: Set(new.run_id),
        position: Set(new.position),
        test_name: Set(new.test_name),
        component: Set(new.component),
        owner: Set(new.owner),
        reason: Set(new.reason.as_str().to_string()),
        detail: Set(new.detail),
        payload: Set(new.payload),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
    .map_err(|e| AppError::Database(format!("Failed to store unresolved record: {}", e)))?;

    Ok(())
}

/// Record a component's log file for a run under a time-ordered UUID.
pub async fn insert_log_artifact<C: ConnectionTrait>(
    conn: &C,
    run_id: i64,
    component_id: i64,
    file_name: &str,
) -> AppResult<Uuid> {
    let id = Uuid::now_v7();

    log_artifact::ActiveModel {
        id: Set(id),
        run_id: Set(run_id),
        component_id: Set(component_id),
        file_name: Set(file_name.to_string()),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
    .map_err(|e| AppError::Database(format!("Failed to record log artifact: {}", e)))?;

    Ok(id)
}
