//! Self-service profile endpoints for the signed-in user.

use actix_web::{HttpResponse, post, web};
use tracing::{info, warn};

use crate::api::users::{check_password_length, validate_email};
use crate::auth::AuthUser;
use crate::auth::password::{hash_password, verify_password};
use crate::db::DbPool;
use crate::db::users::ProfileChanges;
use crate::error::{AppError, AppResult, ErrorResponse};
use crate::models::{
    AuthenticatedCaller, ChangePasswordRequest, UpdateProfileRequest, UserResponse,
};

/// Configure profile routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(update_profile).service(change_password);
}

fn own_user_id(caller: &AuthenticatedCaller) -> AppResult<i64> {
    caller.user_id.ok_or_else(|| {
        AppError::InvalidInput("The admin key has no profile; sign in as a user".to_string())
    })
}

/// Validate a profile update into the columns to overwrite.
pub fn prepare_profile(req: UpdateProfileRequest) -> AppResult<ProfileChanges> {
    let name = match req.full_name {
        Some(raw) => {
            let name = raw.trim();
            if name.is_empty() {
                return Err(AppError::InvalidInput("fullName must not be blank".to_string()));
            }
            Some(name.to_string())
        }
        None => None,
    };

    let email = match req.email {
        Some(raw) => Some(validate_email(&raw)?.to_string()),
        None => None,
    };

    let phone = req
        .phone
        .map(|p| Some(p.trim().to_string()).filter(|p| !p.is_empty()));

    let changes = ProfileChanges { name, phone, email };
    if changes == ProfileChanges::default() {
        return Err(AppError::InvalidInput(
            "Nothing to update; send fullName, phone or email".to_string(),
        ));
    }
    Ok(changes)
}

/// Update the caller's name, phone or email.
#[utoipa::path(
    post,
    path = "/api/profile/info",
    tag = "Profile",
    request_body = UpdateProfileRequest,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, description = "Invalid field, duplicate email or no user session", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "User no longer exists", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[post("/profile/info")]
pub async fn update_profile(
    auth: AuthUser,
    pool: web::Data<DbPool>,
    body: web::Json<UpdateProfileRequest>,
) -> AppResult<HttpResponse> {
    let user_id = own_user_id(&auth.caller)?;
    let changes = prepare_profile(body.into_inner())?;

    let user = pool
        .update_profile(user_id, changes)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;

    info!(user_id, "Profile updated");
    Ok(HttpResponse::Ok().json(UserResponse::from(user)))
}

/// Change the caller's password after checking the current one.
#[utoipa::path(
    post,
    path = "/api/profile/password",
    tag = "Profile",
    request_body = ChangePasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "New password too short or no user session", body = ErrorResponse),
        (status = 401, description = "Current password is incorrect", body = ErrorResponse),
        (status = 404, description = "User no longer exists", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[post("/profile/password")]
pub async fn change_password(
    auth: AuthUser,
    pool: web::Data<DbPool>,
    body: web::Json<ChangePasswordRequest>,
) -> AppResult<HttpResponse> {
    let user_id = own_user_id(&auth.caller)?;
    let req = body.into_inner();

    let user = pool
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {}", user_id)))?;
    if !verify_password(&req.old_password, &user.password_hash) {
        warn!(user_id, "Password change with wrong current password");
        return Err(AppError::Unauthorized(
            "Current password is incorrect".to_string(),
        ));
    }

    check_password_length(&req.new_password)?;
    if !pool
        .set_password_hash(user_id, hash_password(&req.new_password)?)
        .await?
    {
        return Err(AppError::NotFound(format!("User {}", user_id)));
    }

    info!(user_id, "Password changed");
    Ok(HttpResponse::NoContent().finish())
}
