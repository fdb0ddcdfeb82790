//! Module drill-down within a run.

use actix_web::{HttpResponse, get, web};

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::error::{AppResult, ErrorResponse};
use crate::models::{Contribution, FailingTest, ModuleComponent, ModuleSummary};

/// Configure module routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_module_summary)
        .service(get_module_contribution)
        .service(get_module_errors)
        .service(get_module_components);
}

/// Module summary in a run, or `null` when the run has no tests in the module.
#[utoipa::path(
    get,
    path = "/api/regression/{run_id}/module/{module_id}",
    tag = "Modules",
    params(
        ("run_id" = i64, Path, description = "Run ID"),
        ("module_id" = i64, Path, description = "Module ID")
    ),
    responses(
        (status = 200, description = "Module summary or null", body = Option<ModuleSummary>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/regression/{run_id}/module/{module_id}")]
pub async fn get_module_summary(
    _auth: AuthUser,
    pool: web::Data<DbPool>,
    path: web::Path<(i64, i64)>,
) -> AppResult<HttpResponse> {
    let (run_id, module_id) = path.into_inner();
    let summary = pool.get_module_summary(run_id, module_id).await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Test counts per owner inside the module.
#[utoipa::path(
    get,
    path = "/api/regression/{run_id}/module/{module_id}/contribution",
    tag = "Modules",
    params(
        ("run_id" = i64, Path, description = "Run ID"),
        ("module_id" = i64, Path, description = "Module ID")
    ),
    responses(
        (status = 200, description = "Contribution per owner", body = Vec<Contribution>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/regression/{run_id}/module/{module_id}/contribution")]
pub async fn get_module_contribution(
    _auth: AuthUser,
    pool: web::Data<DbPool>,
    path: web::Path<(i64, i64)>,
) -> AppResult<HttpResponse> {
    let (run_id, module_id) = path.into_inner();
    let contribution = pool.get_module_contribution(run_id, module_id).await?;
    Ok(HttpResponse::Ok().json(contribution))
}

/// FAIL and UNKNOWN tests of the module in the run.
#[utoipa::path(
    get,
    path = "/api/regression/{run_id}/module/{module_id}/errors",
    tag = "Modules",
    params(
        ("run_id" = i64, Path, description = "Run ID"),
        ("module_id" = i64, Path, description = "Module ID")
    ),
    responses(
        (status = 200, description = "Failing tests", body = Vec<FailingTest>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/regression/{run_id}/module/{module_id}/errors")]
pub async fn get_module_errors(
    _auth: AuthUser,
    pool: web::Data<DbPool>,
    path: web::Path<(i64, i64)>,
) -> AppResult<HttpResponse> {
    let (run_id, module_id) = path.into_inner();
    let tests = pool.get_failing_tests(run_id, Some(module_id)).await?;
    Ok(HttpResponse::Ok().json(tests))
}

/// Components of the module in the run, with owner and counters.
#[utoipa::path(
    get,
    path = "/api/regression/{run_id}/module/{module_id}/components",
    tag = "Modules",
    params(
        ("run_id" = i64, Path, description = "Run ID"),
        ("module_id" = i64, Path, description = "Module ID")
    ),
    responses(
        (status = 200, description = "Components", body = Vec<ModuleComponent>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/regression/{run_id}/module/{module_id}/components")]
pub async fn get_module_components(
    _auth: AuthUser,
    pool: web::Data<DbPool>,
    path: web::Path<(i64, i64)>,
) -> AppResult<HttpResponse> {
    let (run_id, module_id) = path.into_inner();
    let components = pool.get_module_components(run_id, module_id).await?;
    Ok(HttpResponse::Ok().json(components))
}
