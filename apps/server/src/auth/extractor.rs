//! Actix-web extractors for bearer-token, admin-key and parser-token authentication.
//!
//! # Security
//! - Secret header values are wrapped in `SecretString` as soon as they are read
//! - Secret values are never logged or exposed in debug output
//! - Shared secrets are compared in constant time

use actix_web::dev::Payload;
use actix_web::http::{StatusCode, header};
use actix_web::{FromRequest, HttpRequest, HttpResponse, ResponseError, web};
use secrecy::{ExposeSecret, SecretString};
use std::future::{Ready, ready};

use super::session::{SessionSigner, TokenError};
use super::{AdminKey, ParserToken};
use crate::config::{ADMIN_KEY_HEADER, PARSER_TOKEN_HEADER};
use crate::error::ErrorResponse;
use crate::models::{AuthenticatedCaller, Role};

/// Extract a secret header value, wrapping it in SecretString.
/// Returns None if the header is missing or invalid UTF-8.
fn extract_secret_header(req: &HttpRequest, header_name: &str) -> Option<SecretString> {
    req.headers()
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .map(|s| SecretString::from(s.to_string()))
}

/// Extract the token from an `Authorization: Bearer <token>` header.
fn extract_bearer(req: &HttpRequest) -> Option<SecretString> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| SecretString::from(t.trim().to_string()))
}

/// Authentication error for extractors.
#[derive(Debug)]
pub struct AuthError {
    code: &'static str,
    message: String,
}

impl AuthError {
    fn unauthorized(message: impl Into<String>) -> Self {
        Self {
            code: "UNAUTHORIZED",
            message: message.into(),
        }
    }

    fn expired() -> Self {
        Self {
            code: "TOKEN_EXPIRED",
            message: "Access token expired".to_string(),
        }
    }

    pub fn code(&self) -> &'static str {
        self.code
    }
}

impl std::fmt::Display for AuthError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl ResponseError for AuthError {
    fn status_code(&self) -> StatusCode {
        StatusCode::UNAUTHORIZED
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(StatusCode::UNAUTHORIZED).json(ErrorResponse {
            error: self.code.to_string(),
            message: self.message.clone(),
        })
    }
}

/// Resolve the caller from the admin key or a bearer token.
fn authenticate(req: &HttpRequest) -> Result<AuthenticatedCaller, AuthError> {
    // Check admin key first (for bootstrap operations)
    if let Some(provided) = extract_secret_header(req, ADMIN_KEY_HEADER)
        && let Some(key) = req.app_data::<web::Data<AdminKey>>()
        && key.0.verify(provided.expose_secret())
    {
        return Ok(AuthenticatedCaller::bootstrap_admin());
    }

    let Some(token) = extract_bearer(req) else {
        return Err(AuthError::unauthorized(
            "Missing credentials. Provide an Authorization: Bearer token.",
        ));
    };

    let Some(signer) = req.app_data::<web::Data<SessionSigner>>() else {
        return Err(AuthError::unauthorized("Internal configuration error"));
    };

    match signer.verify(token.expose_secret()) {
        Ok(claims) => Ok(AuthenticatedCaller {
            user_id: Some(claims.user_id),
            name: claims.name,
            role: Role::parse(&claims.role).unwrap_or_default(),
        }),
        Err(TokenError::Expired) => Err(AuthError::expired()),
        Err(TokenError::Invalid(_)) => Err(AuthError::unauthorized("Invalid access token")),
    }
}

/// Extractor that requires a logged-in user (or the bootstrap admin key).
///
/// ```ignore
/// async fn protected_handler(auth: AuthUser) -> impl Responder {
///     // auth.caller contains the authenticated caller info
/// }
/// ```
pub struct AuthUser {
    pub caller: AuthenticatedCaller,
}

impl FromRequest for AuthUser {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(authenticate(req).map(|caller| AuthUser { caller }))
    }
}

/// Extractor for the parser results callback.
///
/// Accepts the configured `X-Parser-Token`, or a user allowed to manage runs.
pub struct ParserAuth {
    /// `None` when authenticated by parser token
    pub caller: Option<AuthenticatedCaller>,
}

impl FromRequest for ParserAuth {
    type Error = AuthError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        if let Some(provided) = extract_secret_header(req, PARSER_TOKEN_HEADER) {
            let valid = req
                .app_data::<web::Data<ParserToken>>()
                .is_some_and(|token| token.0.verify(provided.expose_secret()));
            return ready(if valid {
                Ok(ParserAuth { caller: None })
            } else {
                Err(AuthError::unauthorized("Invalid parser token"))
            });
        }

        let result = authenticate(req).and_then(|caller| {
            if caller.can_manage() {
                Ok(ParserAuth {
                    caller: Some(caller),
                })
            } else {
                Err(AuthError::unauthorized(
                    "Parser token or admin/manager role required",
                ))
            }
        });
        ready(result)
    }
}
