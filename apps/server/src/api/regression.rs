//! Regression run endpoints.
//!
//! Endpoints:
//! - GET /regression/{id}                     - Run row
//! - GET /regression/{id}/errors              - FAIL/UNKNOWN tests of the run
//! - GET /regression/{id}/modules             - Modules touched by the run
//! - GET /regression/{id}/unresolved          - Parsed records that did not resolve
//! - GET /regressions?status=                 - Runs by status (admin/manager)
//! - GET /regressions/project/{pid}           - Runs of a project, newest first
//! - GET /regressions/project/{pid}/team      - Users assigned to a project

use actix_web::{HttpResponse, get, web};

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::error::{AppError, AppResult, ErrorResponse};
use crate::models::{
    FailingTest, ListRunsQuery, RegressionRunResponse, RunModule, RunStatus, TeamMember,
    UnresolvedRecordResponse,
};

/// Configure regression run routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_regression)
        .service(get_regression_errors)
        .service(get_regression_modules)
        .service(get_unresolved_records)
        .service(list_regressions)
        .service(list_project_regressions)
        .service(get_project_team);
}

/// Get a regression run.
#[utoipa::path(
    get,
    path = "/api/regression/{id}",
    tag = "Regressions",
    params(("id" = i64, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Run found", body = RegressionRunResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Run not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/regression/{id}")]
pub async fn get_regression(
    _auth: AuthUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let run = pool
        .get_run(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Regression run {}", id)))?;

    Ok(HttpResponse::Ok().json(RegressionRunResponse::from(run)))
}

/// FAIL and UNKNOWN tests of a run.
#[utoipa::path(
    get,
    path = "/api/regression/{id}/errors",
    tag = "Regressions",
    params(("id" = i64, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Failing tests", body = Vec<FailingTest>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/regression/{id}/errors")]
pub async fn get_regression_errors(
    _auth: AuthUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let tests = pool.get_failing_tests(path.into_inner(), None).await?;
    Ok(HttpResponse::Ok().json(tests))
}

/// Modules with tests in a run, with per-run counters and last regression date.
#[utoipa::path(
    get,
    path = "/api/regression/{id}/modules",
    tag = "Regressions",
    params(("id" = i64, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Modules of the run", body = Vec<RunModule>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/regression/{id}/modules")]
pub async fn get_regression_modules(
    _auth: AuthUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let modules = pool.get_run_modules(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(modules))
}

/// Parsed records of a run that were not attached to a component.
#[utoipa::path(
    get,
    path = "/api/regression/{id}/unresolved",
    tag = "Regressions",
    params(("id" = i64, Path, description = "Run ID")),
    responses(
        (status = 200, description = "Unresolved records", body = Vec<UnresolvedRecordResponse>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/regression/{id}/unresolved")]
pub async fn get_unresolved_records(
    _auth: AuthUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let records: Vec<UnresolvedRecordResponse> = pool
        .get_unresolved_records(path.into_inner())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(HttpResponse::Ok().json(records))
}

/// List runs, optionally filtered by status.
#[utoipa::path(
    get,
    path = "/api/regressions",
    tag = "Regressions",
    params(ListRunsQuery),
    responses(
        (status = 200, description = "Runs", body = Vec<RegressionRunResponse>),
        (status = 400, description = "Unknown status", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin or manager required", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/regressions")]
pub async fn list_regressions(
    auth: AuthUser,
    pool: web::Data<DbPool>,
    query: web::Query<ListRunsQuery>,
) -> AppResult<HttpResponse> {
    if !auth.caller.can_manage() {
        return Err(AppError::Forbidden(
            "Listing runs requires an admin or manager".to_string(),
        ));
    }

    let status = match query.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => Some(RunStatus::parse(raw).ok_or_else(|| {
            AppError::InvalidInput(format!(
                "Unknown status '{}' (expected pending, running, complete or failed)",
                raw
            ))
        })?),
        None => None,
    };

    let runs: Vec<RegressionRunResponse> = pool
        .list_runs_by_status(status)
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(HttpResponse::Ok().json(runs))
}

/// Runs of a project, newest execution first.
#[utoipa::path(
    get,
    path = "/api/regressions/project/{project_id}",
    tag = "Regressions",
    params(("project_id" = i64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Runs of the project", body = Vec<RegressionRunResponse>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/regressions/project/{project_id}")]
pub async fn list_project_regressions(
    _auth: AuthUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let runs: Vec<RegressionRunResponse> = pool
        .list_runs_for_project(path.into_inner())
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(HttpResponse::Ok().json(runs))
}

/// Users assigned to a project with their per-project role.
#[utoipa::path(
    get,
    path = "/api/regressions/project/{project_id}/team",
    tag = "Projects",
    params(("project_id" = i64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Team members", body = Vec<TeamMember>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/regressions/project/{project_id}/team")]
pub async fn get_project_team(
    _auth: AuthUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let team = pool.get_project_team(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(team))
}
