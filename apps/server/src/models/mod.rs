//! Domain models and DTOs for the regression tracker.

pub mod drilldown;
pub mod project;
pub mod reconcile;
pub mod run;
pub mod user;

// Re-export commonly used types
pub use drilldown::{
    ComponentError, ComponentSummary, ComponentTest, Contribution, FailingTest, HistoryEntry,
    ModuleComponent, ModuleSummary, RunModule,
};
pub use project::{
    CreateProjectRequest, NewComponent, NewModule, ProjectComponent, ProjectDetail, ProjectModule,
    ProjectResponse, TeamMember,
};
pub use reconcile::{
    ParsedResultsRequest, ParsedSummary, ParsedTestRecord, ReconcileReport, UnresolvedReason,
    UnresolvedRecord, UnresolvedRecordResponse,
};
pub use run::{
    ListRunsQuery, LogQuery, RegressionRunResponse, RejectedFile, RunStatus, TestStatus,
    UploadResponse,
};
pub use user::{
    AuthenticatedCaller, ChangePasswordRequest, CreateUserRequest, LoginRequest, LoginResponse,
    Role, SessionClaims, UpdateProfileRequest, UserResponse,
};
