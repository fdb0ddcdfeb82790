//! Regression run domain models and DTOs.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entity::regression_run;

/// Lifecycle of a regression run.
///
/// `pending` on upload, `running` once the parser is launched, then exactly one
/// of `complete` (results reconciled) or `failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Complete,
    Failed,
}

impl RunStatus {
    /// States from which a run may still be reconciled or failed.
    pub const OPEN: [RunStatus; 2] = [RunStatus::Pending, RunStatus::Running];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "running" => Some(Self::Running),
            "complete" => Some(Self::Complete),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of a single test as stored on a test case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestStatus {
    Pass,
    Fail,
    Unknown,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pass => "PASS",
            Self::Fail => "FAIL",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Lenient parse of parser output: anything that is not PASS or FAIL
    /// (including missing values and misspellings) is UNKNOWN.
    pub fn from_parser(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_uppercase()).as_deref() {
            Some("PASS") | Some("PASSED") => Self::Pass,
            Some("FAIL") | Some("FAILED") => Self::Fail,
            _ => Self::Unknown,
        }
    }
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Regression run as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RegressionRunResponse {
    pub id: i64,
    pub project_id: i64,
    pub run_name: String,
    pub plugin: String,
    pub execution_date: NaiveDate,
    pub total_tests: i32,
    pub passed_tests: i32,
    pub failed_tests: i32,
    pub unknown_tests: i32,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<regression_run::Model> for RegressionRunResponse {
    fn from(m: regression_run::Model) -> Self {
        Self {
            id: m.id,
            project_id: m.project_id,
            run_name: m.run_name,
            plugin: m.plugin,
            execution_date: m.execution_date,
            total_tests: m.total_tests,
            passed_tests: m.passed_tests,
            failed_tests: m.failed_tests,
            unknown_tests: m.unknown_tests,
            status: m.status,
            error_message: m.error_message,
            created_at: m.created_at,
            completed_at: m.completed_at,
        }
    }
}

/// A file rejected during upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct RejectedFile {
    pub file: String,
    pub reason: String,
}

/// Response for `POST /api/upload-regression`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub run_id: i64,
    pub status: RunStatus,
    pub files_accepted: Vec<String>,
    pub files_rejected: Vec<RejectedFile>,
}

/// Filter for listing runs.
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct ListRunsQuery {
    /// One of pending, running, complete, failed
    pub status: Option<String>,
}

/// Query string for component log retrieval.
#[derive(Debug, Clone, Deserialize, ToSchema, IntoParams)]
pub struct LogQuery {
    /// Component name used to derive the log file name
    pub name: Option<String>,
}
