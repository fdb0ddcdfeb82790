//! Database queries for regression runs.

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, NotSet, QueryFilter, QueryOrder,
    Set,
};

use crate::entity::regression_run::{self as run, ActiveModel, Entity as RegressionRun};
use crate::error::{AppError, AppResult};
use crate::models::RunStatus;

use super::DbPool;

/// Metadata of a run being created by an upload.
#[derive(Debug, Clone)]
pub struct NewRun {
    pub project_id: i64,
    pub run_name: String,
    pub plugin: String,
    pub execution_date: NaiveDate,
}

/// Insert a run with zero counters in `pending`.
///
/// Takes any connection so the upload can run it inside its transaction.
pub async fn insert_run<C: ConnectionTrait>(conn: &C, new: NewRun) -> AppResult<run::Model> {
    let now = Utc::now();

    let model = ActiveModel {
        id: NotSet,
        project_id: Set(new.project_id),
        run_name: Set(new.run_name),
        plugin: Set(new.plugin),
        execution_date: Set(new.execution_date),
        total_tests: Set(0),
        passed_tests: Set(0),
        failed_tests: Set(0),
        unknown_tests: Set(0),
        status: Set(RunStatus::Pending.as_str().to_string()),
        error_message: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        completed_at: Set(None),
    };

    model
        .insert(conn)
        .await
        .map_err(|e| AppError::Database(format!("Failed to insert regression run: {}", e)))
}

/// Get a run by ID on any connection.
pub async fn find_run<C: ConnectionTrait>(conn: &C, id: i64) -> AppResult<Option<run::Model>> {
    RegressionRun::find_by_id(id)
        .one(conn)
        .await
        .map_err(|e| AppError::Database(format!("Failed to get regression run: {}", e)))
}

impl DbPool {
    /// Get a run by ID.
    pub async fn get_run(&self, id: i64) -> AppResult<Option<run::Model>> {
        find_run(self.connection(), id).await
    }

    /// Runs of a project, newest execution first.
    pub async fn list_runs_for_project(&self, project_id: i64) -> AppResult<Vec<run::Model>> {
        RegressionRun::find()
            .filter(run::Column::ProjectId.eq(project_id))
            .order_by_desc(run::Column::ExecutionDate)
            .order_by_desc(run::Column::Id)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list project runs: {}", e)))
    }

    /// Runs in a given status (all runs when `None`), newest first.
    pub async fn list_runs_by_status(
        &self,
        status: Option<RunStatus>,
    ) -> AppResult<Vec<run::Model>> {
        let mut query = RegressionRun::find();
        if let Some(status) = status {
            query = query.filter(run::Column::Status.eq(status.as_str()));
        }

        query
            .order_by_desc(run::Column::CreatedAt)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to list runs: {}", e)))
    }

    /// Move a run to `to` only if it is currently in one of `from`.
    ///
    /// Returns whether a row changed, so late transitions never overwrite a
    /// terminal state.
    pub async fn transition_run(
        &self,
        id: i64,
        from: &[RunStatus],
        to: RunStatus,
        error_message: Option<String>,
    ) -> AppResult<bool> {
        let mut update = RegressionRun::update_many()
            .col_expr(run::Column::Status, Expr::value(to.as_str()))
            .col_expr(run::Column::ErrorMessage, Expr::value(error_message));
        if to.is_terminal() {
            update = update.col_expr(run::Column::CompletedAt, Expr::value(Some(Utc::now())));
        }

        let result = update
            .filter(run::Column::Id.eq(id))
            .filter(run::Column::Status.is_in(from.iter().map(|s| s.as_str())))
            .exec(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to update run status: {}", e)))?;

        Ok(result.rows_affected > 0)
    }

    /// Mark a still-open run as failed with a reason.
    pub async fn fail_run(&self, id: i64, reason: impl Into<String>) -> AppResult<bool> {
        self.transition_run(id, &RunStatus::OPEN, RunStatus::Failed, Some(reason.into()))
            .await
    }

    /// Open runs created before `cutoff`.
    pub async fn find_open_runs_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> AppResult<Vec<run::Model>> {
        RegressionRun::find()
            .filter(run::Column::Status.is_in(RunStatus::OPEN.iter().map(|s| s.as_str())))
            .filter(run::Column::CreatedAt.lt(cutoff))
            .order_by_asc(run::Column::Id)
            .all(self.connection())
            .await
            .map_err(|e| AppError::Database(format!("Failed to find open runs: {}", e)))
    }
}
