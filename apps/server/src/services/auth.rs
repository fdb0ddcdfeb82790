//! Login routes.
//!
//! Endpoints:
//! 1. POST /auth/login — Verify email/password, issue an HS256 access token
//! 2. GET /auth/me — Return the user behind the bearer token

use actix_web::{HttpResponse, get, post, web};
use tracing::{info, warn};

use crate::auth::password::verify_password;
use crate::auth::{AuthUser, SessionSigner};
use crate::db::DbPool;
use crate::error::{AppError, AppResult, ErrorResponse};
use crate::models::{LoginRequest, LoginResponse, UserResponse};

const INVALID_CREDENTIALS: &str = "Invalid email or password";

/// Configure login routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(login).service(get_current_user);
}

/// Exchange email and password for an access token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 401, description = "Invalid credentials", body = ErrorResponse)
    )
)]
#[post("/auth/login")]
pub async fn login(
    pool: web::Data<DbPool>,
    signer: web::Data<SessionSigner>,
    body: web::Json<LoginRequest>,
) -> AppResult<HttpResponse> {
    let body = body.into_inner();

    // Same response for unknown email and wrong password
    let user = pool
        .find_user_by_email(&body.email)
        .await?
        .filter(|u| verify_password(&body.password, &u.password_hash))
        .ok_or_else(|| {
            warn!("Login failed for {}", body.email.trim());
            AppError::Unauthorized(INVALID_CREDENTIALS.to_string())
        })?;

    let access_token = signer.issue(&user)?;
    info!(user_id = user.id, "User logged in");

    Ok(HttpResponse::Ok().json(LoginResponse {
        access_token,
        token_type: "Bearer".to_string(),
        expires_in: signer.ttl_secs(),
        user: user.into(),
    }))
}

/// Current user from the access token.
///
/// The bootstrap admin key has no user row and gets `{ "user": null }`.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[get("/auth/me")]
pub async fn get_current_user(auth: AuthUser, pool: web::Data<DbPool>) -> AppResult<HttpResponse> {
    let Some(user_id) = auth.caller.user_id else {
        return Ok(HttpResponse::Ok().json(serde_json::json!({ "user": null })));
    };

    let user = pool
        .get_user(user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User no longer exists".to_string()))?;

    let response: UserResponse = user.into();
    Ok(HttpResponse::Ok().json(serde_json::json!({ "user": response })))
}
