//! Request logging middleware.
//!
//! Logs start and completion of every request under the `api` target.
//! Credentials are never logged; only which kind was presented.

use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::http::{StatusCode, header};
use futures_util::future::LocalBoxFuture;
use std::future::{Ready, ready};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{ADMIN_KEY_HEADER, PARSER_TOKEN_HEADER};

/// Paths polled by orchestrators, logged at DEBUG.
const QUIET_PATHS: &[&str] = &["/api/health", "/api/ready"];

/// Kind of credential a request carries.
fn credential_marker(req: &ServiceRequest) -> &'static str {
    let headers = req.headers();
    if headers.contains_key(PARSER_TOKEN_HEADER) {
        "parser_token"
    } else if headers.contains_key(ADMIN_KEY_HEADER) {
        "admin_key"
    } else if headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("Bearer "))
    {
        "bearer"
    } else {
        "none"
    }
}

/// Request logger middleware factory.
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggerMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerMiddleware { service }))
    }
}

/// Request logger middleware service.
pub struct RequestLoggerMiddleware<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let start = Instant::now();
        let method = req.method().to_string();
        let path = req.path().to_string();
        let quiet = QUIET_PATHS.contains(&path.as_str());
        let remote_addr = req
            .connection_info()
            .realip_remote_addr()
            .unwrap_or("unknown")
            .to_string();
        let credential = credential_marker(&req);

        if quiet {
            debug!(target: "api", method = %method, path = %path, "→ Request started");
        } else {
            info!(
                target: "api",
                method = %method,
                path = %path,
                query = %req.query_string(),
                remote_addr = %remote_addr,
                credential,
                "→ Request started"
            );
        }

        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            let status = res.status();
            let duration_ms = start.elapsed().as_millis() as u64;

            match status {
                s if s.is_success() && quiet => {
                    debug!(target: "api", method = %method, path = %path, status = s.as_u16(), duration_ms, "← Request completed");
                }
                s if s.is_success() || s.is_redirection() => {
                    info!(target: "api", method = %method, path = %path, status = s.as_u16(), duration_ms, "← Request completed");
                }
                s if s == StatusCode::UNAUTHORIZED || s == StatusCode::FORBIDDEN => {
                    warn!(target: "api", method = %method, path = %path, status = s.as_u16(), duration_ms, credential, "← Access denied");
                }
                s if s.is_client_error() => {
                    warn!(target: "api", method = %method, path = %path, status = s.as_u16(), duration_ms, "← Client error");
                }
                s => {
                    warn!(target: "api", method = %method, path = %path, status = s.as_u16(), duration_ms, "← Server error");
                }
            }

            Ok(res)
        })
    }
}
