//! API endpoint modules.

pub mod component;
pub mod health;
pub mod module;
pub mod openapi;
pub mod profile;
pub mod projects;
pub mod regression;
pub mod users;

use actix_web::web;

pub use openapi::ApiDoc;

use crate::services;

/// Register every `/api` route. Mounted inside `web::scope("/api")`.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.configure(health::configure_routes)
        .configure(services::configure_auth_routes)
        .configure(services::configure_upload_routes)
        .configure(services::configure_reconcile_routes)
        .configure(regression::configure_routes)
        .configure(module::configure_routes)
        .configure(component::configure_routes)
        .configure(projects::configure_routes)
        .configure(users::configure_routes)
        .configure(profile::configure_routes);
}
