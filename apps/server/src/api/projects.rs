//! Project endpoints.
//!
//! Admins and managers see every project; other users only the projects they
//! are assigned to.

use actix_web::{HttpResponse, get, post, web};
use tracing::info;

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::error::{AppError, AppResult, ErrorResponse};
use crate::models::{CreateProjectRequest, ProjectDetail, ProjectResponse};

/// Configure project routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(list_projects)
        .service(create_project)
        .service(get_project);
}

/// List projects visible to the caller.
#[utoipa::path(
    get,
    path = "/api/projects",
    tag = "Projects",
    responses(
        (status = 200, description = "Projects", body = Vec<ProjectResponse>),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/projects")]
pub async fn list_projects(auth: AuthUser, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let projects = match (auth.caller.can_manage(), auth.caller.user_id) {
        (true, _) => pool.list_projects().await?,
        (false, Some(user_id)) => pool.list_projects_for_user(user_id).await?,
        (false, None) => Vec::new(),
    };

    let projects: Vec<ProjectResponse> = projects.into_iter().map(Into::into).collect();
    Ok(HttpResponse::Ok().json(projects))
}

/// Get a project with its modules and components.
#[utoipa::path(
    get,
    path = "/api/projects/{id}",
    tag = "Projects",
    params(("id" = i64, Path, description = "Project ID")),
    responses(
        (status = 200, description = "Project found", body = ProjectDetail),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Not assigned to the project", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/projects/{id}")]
pub async fn get_project(
    auth: AuthUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    let id = path.into_inner();
    let detail = pool
        .get_project_detail(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {}", id)))?;

    if !auth.caller.can_manage() {
        let assigned = match auth.caller.user_id {
            Some(user_id) => pool.is_user_assigned(user_id, id).await?,
            None => false,
        };
        if !assigned {
            return Err(AppError::Forbidden(format!(
                "Not assigned to project {}",
                id
            )));
        }
    }

    Ok(HttpResponse::Ok().json(detail))
}

/// Create a project with its modules and components.
#[utoipa::path(
    post,
    path = "/api/projects/add",
    tag = "Projects",
    request_body = CreateProjectRequest,
    responses(
        (status = 201, description = "Project created", body = ProjectDetail),
        (status = 400, description = "Invalid request or duplicate name", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin or manager required", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[post("/projects/add")]
pub async fn create_project(
    auth: AuthUser,
    pool: web::Data<DbPool>,
    body: web::Json<CreateProjectRequest>,
) -> AppResult<HttpResponse> {
    if !auth.caller.can_manage() {
        return Err(AppError::Forbidden(
            "Creating projects requires an admin or manager".to_string(),
        ));
    }

    let body = body.into_inner();
    validate_project(&body)?;

    let id = pool.create_project(&body).await?;
    info!(project_id = id, "Project '{}' created by {}", body.name.trim(), auth.caller.name);

    let detail = pool
        .get_project_detail(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Project {}", id)))?;
    Ok(HttpResponse::Created().json(detail))
}

/// Names must be present and unique within their parent.
fn validate_project(req: &CreateProjectRequest) -> AppResult<()> {
    if req.name.trim().is_empty() {
        return Err(AppError::InvalidInput("Project name is required".to_string()));
    }

    let mut module_names = std::collections::HashSet::new();
    for module in &req.modules {
        let name = module.name.trim();
        if name.is_empty() {
            return Err(AppError::InvalidInput("Module name is required".to_string()));
        }
        if !module_names.insert(name) {
            return Err(AppError::InvalidInput(format!("Duplicate module '{}'", name)));
        }

        let mut component_names = std::collections::HashSet::new();
        for component in &module.components {
            let component_name = component.name.trim();
            if component_name.is_empty() {
                return Err(AppError::InvalidInput(format!(
                    "Component name is required in module '{}'",
                    name
                )));
            }
            if !component_names.insert(component_name) {
                return Err(AppError::InvalidInput(format!(
                    "Duplicate component '{}' in module '{}'",
                    component_name, name
                )));
            }
        }
    }
    Ok(())
}
