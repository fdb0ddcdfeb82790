//! Pipeline test suite: upload, parser callback reconciliation and drill-down
//! queries against a real PostgreSQL database.
//!
//! Tests skip themselves unless REGTRACK_TEST_DATABASE_URL points at a
//! disposable database.
//!
//! Run with: cargo test --test pipeline


mod test_auth;
mod test_queries;
mod test_reconcile;
mod test_upload;
