//! SeaORM entity definitions for PostgreSQL database.

pub mod component;
pub mod log_artifact;
pub mod module;
pub mod project;
pub mod regression_run;
pub mod test_case;
pub mod test_error;
pub mod unresolved_test_record;
pub mod user;
pub mod user_project;
