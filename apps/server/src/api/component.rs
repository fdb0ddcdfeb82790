//! Component drill-down within a run: summary, errors, history and raw log.

use actix_web::{HttpResponse, get, web};
use tracing::debug;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::error::{AppError, AppResult, ErrorResponse};
use crate::models::{ComponentError, ComponentSummary, HistoryEntry, LogQuery};
use crate::services::storage::{LogStore, component_log_name};

/// Configure component routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(get_component_summary)
        .service(get_component_errors)
        .service(get_component_history)
        .service(get_component_logs);
}

/// Component summary in a run with its tests, or `null` when it has none there.
#[utoipa::path(
    get,
    path = "/api/regression/{run_id}/module/{module_id}/component/{component_id}",
    tag = "Components",
    params(
        ("run_id" = i64, Path, description = "Run ID"),
        ("module_id" = i64, Path, description = "Module ID"),
        ("component_id" = i64, Path, description = "Component ID")
    ),
    responses(
        (status = 200, description = "Component summary or null", body = Option<ComponentSummary>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/regression/{run_id}/module/{module_id}/component/{component_id}")]
pub async fn get_component_summary(
    _auth: AuthUser,
    pool: web::Data<DbPool>,
    path: web::Path<(i64, i64, i64)>,
) -> AppResult<HttpResponse> {
    let (run_id, module_id, component_id) = path.into_inner();
    let summary = pool
        .get_component_summary(run_id, module_id, component_id)
        .await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Error messages of the component's tests in the run, in insertion order.
#[utoipa::path(
    get,
    path = "/api/regression/{run_id}/module/{module_id}/component/{component_id}/errors",
    tag = "Components",
    params(
        ("run_id" = i64, Path, description = "Run ID"),
        ("module_id" = i64, Path, description = "Module ID"),
        ("component_id" = i64, Path, description = "Component ID")
    ),
    responses(
        (status = 200, description = "Error messages", body = Vec<ComponentError>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/regression/{run_id}/module/{module_id}/component/{component_id}/errors")]
pub async fn get_component_errors(
    _auth: AuthUser,
    pool: web::Data<DbPool>,
    path: web::Path<(i64, i64, i64)>,
) -> AppResult<HttpResponse> {
    let (run_id, module_id, component_id) = path.into_inner();
    let errors = pool
        .get_component_errors(run_id, module_id, component_id)
        .await?;
    Ok(HttpResponse::Ok().json(errors))
}

/// Every test case of the component across runs, newest run first.
#[utoipa::path(
    get,
    path = "/api/regression/{run_id}/module/{module_id}/component/{component_id}/history",
    tag = "Components",
    params(
        ("run_id" = i64, Path, description = "Run ID (context only)"),
        ("module_id" = i64, Path, description = "Module ID"),
        ("component_id" = i64, Path, description = "Component ID")
    ),
    responses(
        (status = 200, description = "Test history", body = Vec<HistoryEntry>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/regression/{run_id}/module/{module_id}/component/{component_id}/history")]
pub async fn get_component_history(
    _auth: AuthUser,
    pool: web::Data<DbPool>,
    path: web::Path<(i64, i64, i64)>,
) -> AppResult<HttpResponse> {
    let (_run_id, module_id, component_id) = path.into_inner();
    let history = pool.get_component_history(module_id, component_id).await?;
    Ok(HttpResponse::Ok().json(history))
}

/// Raw log of the component for the run.
///
/// Uses the log recorded during reconciliation when there is one, otherwise
/// `{name}.txt` in the run's upload folder.
#[utoipa::path(
    get,
    path = "/api/regression/{run_id}/module/{module_id}/component/{component_id}/logs",
    tag = "Components",
    params(
        ("run_id" = i64, Path, description = "Run ID"),
        ("module_id" = i64, Path, description = "Module ID"),
        ("component_id" = i64, Path, description = "Component ID"),
        LogQuery
    ),
    responses(
        (status = 200, description = "Log contents", content_type = "text/plain", body = String),
        (status = 400, description = "No recorded log and no name given, or the name contains a path separator", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Log file not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/regression/{run_id}/module/{module_id}/component/{component_id}/logs")]
pub async fn get_component_logs(
    _auth: AuthUser,
    pool: web::Data<DbPool>,
    store: web::Data<LogStore>,
    path: web::Path<(i64, i64, i64)>,
    query: web::Query<LogQuery>,
) -> AppResult<HttpResponse> {
    let (run_id, _module_id, component_id) = path.into_inner();

    let file_name = match pool.get_log_artifact(run_id, component_id).await? {
        Some(artifact) => {
            debug!(run_id, component_id, artifact = %artifact.id, "Serving recorded log");
            artifact.file_name
        }
        None => {
            let name = query
                .name
                .as_deref()
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .ok_or_else(|| {
                    AppError::InvalidInput(
                        "No log recorded for this component; pass ?name=<component>".to_string(),
                    )
                })?;
            component_log_name(name)
        }
    };

    let contents = store
        .read_log(run_id, &file_name)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Log file {} for run {}", file_name, run_id)))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(contents))
}
