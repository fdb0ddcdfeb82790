//! Regression tracker server library.
//!
//! Upload of regression logs, parser invocation, reconciliation of parsed
//! results and the drill-down query API.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod middleware;
pub mod migration;
pub mod models;
pub mod services;
