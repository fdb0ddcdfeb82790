//! Parser result payloads and reconciliation outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entity::unresolved_test_record;

use super::run::RunStatus;

/// Body of `POST /api/upload-regression/json`, posted by the external parser.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ParsedResultsRequest {
    pub run_id: i64,
    pub num_of_total: i64,
    pub num_of_failed: i64,
    pub num_of_passed: i64,
    pub num_of_unknown: i64,
    #[serde(default)]
    pub parsed_logs: Vec<ParsedTestRecord>,
}

/// One parsed test, in the shape the parser plugins emit.
///
/// Every field is optional so a single malformed record is reported as
/// unresolved instead of rejecting the whole payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ParsedTestRecord {
    pub test_name: Option<String>,
    pub test_command: Option<String>,
    pub owner: Option<String>,
    pub component: Option<String>,
    pub status: Option<String>,
    /// Module name, used to disambiguate components that share a name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
    #[serde(default)]
    pub summary: ParsedSummary,
}

/// Per-test summary produced by the parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct ParsedSummary {
    #[serde(default)]
    pub identified_errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warnings: Option<i64>,
}

/// Why a parsed record could not be attached to exactly one component/owner pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum UnresolvedReason {
    /// No component of the project with that name is owned by that user
    NoMatch,
    /// More than one component/owner pair matched
    Ambiguous,
    /// Component, owner or test name was missing or blank
    MissingField,
}

impl UnresolvedReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoMatch => "no_match",
            Self::Ambiguous => "ambiguous",
            Self::MissingField => "missing_field",
        }
    }
}

impl std::fmt::Display for UnresolvedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Unresolved record as reported back to the parser.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnresolvedRecord {
    /// Position of the record in `parsedLogs`
    pub index: usize,
    pub test_name: Option<String>,
    pub component: Option<String>,
    pub owner: Option<String>,
    pub reason: UnresolvedReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Response of a successful reconciliation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub run_id: i64,
    pub status: RunStatus,
    pub tests_inserted: usize,
    pub errors_inserted: usize,
    pub artifacts_recorded: usize,
    pub unresolved: Vec<UnresolvedRecord>,
}

/// Stored unresolved record, as listed by `GET /api/regression/{id}/unresolved`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UnresolvedRecordResponse {
    pub id: i64,
    pub run_id: i64,
    pub position: i32,
    pub test_name: Option<String>,
    pub component: Option<String>,
    pub owner: Option<String>,
    pub reason: String,
    pub detail: Option<String>,
    #[schema(value_type = Object)]
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl From<unresolved_test_record::Model> for UnresolvedRecordResponse {
    fn from(m: unresolved_test_record::Model) -> Self {
        Self {
            id: m.id,
            run_id: m.run_id,
            position: m.position,
            test_name: m.test_name,
            component: m.component,
            owner: m.owner,
            reason: m.reason,
            detail: m.detail,
            payload: m.payload,
            created_at: m.created_at,
        }
    }
}
