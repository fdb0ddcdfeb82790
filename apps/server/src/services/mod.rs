//! Business logic services.

pub mod auth;
pub mod parser;
pub mod reconcile;
pub mod storage;
pub mod upload;
pub mod watchdog;

pub use auth::configure_routes as configure_auth_routes;
pub use reconcile::configure_routes as configure_reconcile_routes;
pub use upload::configure_routes as configure_upload_routes;
