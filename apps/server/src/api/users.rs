//! User management endpoints (admin/manager only).

use actix_web::{HttpResponse, delete, get, post, web};
use tracing::info;

use crate::auth::AuthUser;
use crate::auth::password::hash_password;
use crate::db::DbPool;
use crate::db::users::NewUser;
use crate::error::{AppError, AppResult, ErrorResponse};
use crate::models::{AuthenticatedCaller, CreateUserRequest, Role, UserResponse};

/// Minimum accepted password length.
pub const MIN_PASSWORD_LEN: usize = 8;

/// Configure user routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(create_user)
        .service(list_users)
        .service(delete_user);
}

fn require_manager(caller: &AuthenticatedCaller) -> AppResult<()> {
    if caller.can_manage() {
        Ok(())
    } else {
        Err(AppError::Forbidden(
            "User management requires an admin or manager".to_string(),
        ))
    }
}

/// Trimmed email when it looks like `local@domain.tld`.
pub fn validate_email(raw: &str) -> AppResult<&str> {
    let email = raw.trim();
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| !local.is_empty() && domain.contains('.'));
    if valid {
        Ok(email)
    } else {
        Err(AppError::InvalidInput(format!("Invalid email '{}'", email)))
    }
}

pub fn check_password_length(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::InvalidInput(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

/// Validate a create-user request into the fields to store.
///
/// Only admins may create other admins.
pub fn prepare_user(req: CreateUserRequest, caller: &AuthenticatedCaller) -> AppResult<NewUser> {
    let name = req.full_name.trim();
    if name.is_empty() {
        return Err(AppError::InvalidInput("fullName is required".to_string()));
    }

    let email = validate_email(&req.email)?;
    check_password_length(&req.password)?;

    let role = match req.role.as_deref().map(str::trim).filter(|r| !r.is_empty()) {
        Some(raw) => Role::parse(raw)
            .ok_or_else(|| AppError::InvalidInput(format!("Unknown role '{}'", raw)))?,
        None => Role::default(),
    };
    if role == Role::Admin && !caller.is_admin() {
        return Err(AppError::Forbidden(
            "Only admins can create admin users".to_string(),
        ));
    }

    Ok(NewUser {
        email: email.to_string(),
        name: name.to_string(),
        phone: req
            .phone
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty()),
        password_hash: hash_password(&req.password)?,
        role,
        projects: req.projects,
    })
}

/// Create a user and assign it to projects.
#[utoipa::path(
    post,
    path = "/api/users/add",
    tag = "Users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Invalid request or duplicate email", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin or manager required", body = ErrorResponse),
        (status = 404, description = "Assigned project not found", body = ErrorResponse)
    ),
    security(("bearer" = []), ("admin_key" = []))
)]
#[post("/users/add")]
pub async fn create_user(
    auth: AuthUser,
    pool: web::Data<DbPool>,
    body: web::Json<CreateUserRequest>,
) -> AppResult<HttpResponse> {
    require_manager(&auth.caller)?;

    let new_user = prepare_user(body.into_inner(), &auth.caller)?;
    let user = pool.create_user(new_user).await?;

    info!(user_id = user.id, role = %user.role, "User created by {}", auth.caller.name);
    Ok(HttpResponse::Created().json(UserResponse::from(user)))
}

/// List users.
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "Users",
    responses(
        (status = 200, description = "Users", body = Vec<UserResponse>),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin or manager required", body = ErrorResponse)
    ),
    security(("bearer" = []), ("admin_key" = []))
)]
#[get("/users")]
pub async fn list_users(auth: AuthUser, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    require_manager(&auth.caller)?;

    let users: Vec<UserResponse> = pool
        .list_users()
        .await?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(HttpResponse::Ok().json(users))
}

/// Delete a user.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "Users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 204, description = "User deleted"),
        (status = 400, description = "User owns recorded test cases", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 403, description = "Admin or manager required", body = ErrorResponse),
        (status = 404, description = "User not found", body = ErrorResponse)
    ),
    security(("bearer" = []), ("admin_key" = []))
)]
#[delete("/users/{id}")]
pub async fn delete_user(
    auth: AuthUser,
    pool: web::Data<DbPool>,
    path: web::Path<i64>,
) -> AppResult<HttpResponse> {
    require_manager(&auth.caller)?;

    let id = path.into_inner();
    if auth.caller.user_id == Some(id) {
        return Err(AppError::InvalidInput("You cannot delete yourself".to_string()));
    }
    if !pool.delete_user(id).await? {
        return Err(AppError::NotFound(format!("User {}", id)));
    }

    info!(user_id = id, "User deleted by {}", auth.caller.name);
    Ok(HttpResponse::NoContent().finish())
}
