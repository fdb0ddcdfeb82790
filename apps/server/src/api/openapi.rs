//! OpenAPI documentation configuration.

use utoipa::OpenApi;

use crate::{api, error, models, services};

/// OpenAPI documentation.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Regression Tracker Server",
        version = "0.1.0",
        description = "Uploads regression logs, reconciles parser results and serves run drill-downs"
    ),
    servers(
        (url = "/", description = "Local server")
    ),
    paths(
        // Health
        api::health::health,
        api::health::ready,
        // Auth
        services::auth::login,
        services::auth::get_current_user,
        // Ingestion
        services::upload::upload_regression,
        services::reconcile::submit_results,
        // Regressions
        api::regression::get_regression,
        api::regression::get_regression_errors,
        api::regression::get_regression_modules,
        api::regression::get_unresolved_records,
        api::regression::list_regressions,
        api::regression::list_project_regressions,
        api::regression::get_project_team,
        // Modules
        api::module::get_module_summary,
        api::module::get_module_contribution,
        api::module::get_module_errors,
        api::module::get_module_components,
        // Components
        api::component::get_component_summary,
        api::component::get_component_errors,
        api::component::get_component_history,
        api::component::get_component_logs,
        // Projects
        api::projects::list_projects,
        api::projects::get_project,
        api::projects::create_project,
        // Users
        api::users::create_user,
        api::users::list_users,
        api::users::delete_user,
        // Profile
        api::profile::update_profile,
        api::profile::change_password,
    ),
    components(
        schemas(
            // Common
            error::ErrorResponse,
            // Health
            api::health::HealthResponse,
            api::health::ReadyResponse,
            // Runs
            models::RunStatus,
            models::TestStatus,
            models::RegressionRunResponse,
            models::RejectedFile,
            models::UploadResponse,
            models::ListRunsQuery,
            models::LogQuery,
            // Reconciliation
            models::ParsedResultsRequest,
            models::ParsedTestRecord,
            models::ParsedSummary,
            models::UnresolvedReason,
            models::UnresolvedRecord,
            models::ReconcileReport,
            models::UnresolvedRecordResponse,
            // Drill-down
            models::FailingTest,
            models::RunModule,
            models::ModuleSummary,
            models::Contribution,
            models::ModuleComponent,
            models::ComponentTest,
            models::ComponentSummary,
            models::ComponentError,
            models::HistoryEntry,
            // Projects
            models::CreateProjectRequest,
            models::NewModule,
            models::NewComponent,
            models::ProjectResponse,
            models::ProjectDetail,
            models::ProjectModule,
            models::ProjectComponent,
            models::TeamMember,
            // Users
            models::Role,
            models::LoginRequest,
            models::LoginResponse,
            models::CreateUserRequest,
            models::UserResponse,
            models::UpdateProfileRequest,
            models::ChangePasswordRequest,
        )
    ),
    tags(
        (name = "Health", description = "Health check endpoints"),
        (name = "Auth", description = "Login"),
        (name = "Regressions", description = "Run upload, reconciliation and run views"),
        (name = "Modules", description = "Module drill-down within a run"),
        (name = "Components", description = "Component drill-down within a run"),
        (name = "Projects", description = "Projects and teams"),
        (name = "Users", description = "User management"),
        (name = "Profile", description = "The signed-in user's own profile")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

/// Add bearer, admin key and parser token security schemes.
struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};

        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
            components.add_security_scheme(
                "admin_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                    crate::config::ADMIN_KEY_HEADER,
                ))),
            );
            components.add_security_scheme(
                "parser_token",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                    crate::config::PARSER_TOKEN_HEADER,
                ))),
            );
        }
    }
}
