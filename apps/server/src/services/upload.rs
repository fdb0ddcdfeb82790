//! Upload receiver for regression logs.
//!
//! `POST /api/upload-regression` (multipart/form-data)
//!
//! Text fields `projectId`, `plugin`, `runDate`, `regressionName` and one or
//! more files under `logs`. Files are streamed into a staging directory, the
//! run row is inserted in a transaction that commits only once every file has
//! been moved into `{upload_root}/{run_id}/`, then the parser is launched.

use std::path::Path;
use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{HttpResponse, post, web};
use chrono::{DateTime, NaiveDate};
use futures_util::StreamExt;
use sea_orm::TransactionTrait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::auth::AuthUser;
use crate::db::DbPool;
use crate::db::runs::{NewRun, insert_run};
use crate::error::{AppError, AppResult, ErrorResponse};
use crate::models::{RejectedFile, RunStatus, UploadResponse};
use crate::services::parser::ParserLauncher;
use crate::services::storage::{LogStore, safe_file_name};

// ============================================================================
// Constants
// ============================================================================

/// Multipart field carrying log files.
const LOGS_FIELD: &str = "logs";

/// Upper bound for a single text field.
const MAX_TEXT_FIELD_BYTES: usize = 4 * 1024;

// ============================================================================
// Types
// ============================================================================

/// Raw form contents as received.
#[derive(Debug, Default)]
pub struct UploadForm {
    pub project_id: Option<String>,
    pub plugin: Option<String>,
    pub run_date: Option<String>,
    pub regression_name: Option<String>,
    /// Stored file names, in first-seen order
    pub files: Vec<String>,
    pub rejected: Vec<RejectedFile>,
}

/// Validated run metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadMetadata {
    pub project_id: i64,
    pub plugin: String,
    pub execution_date: NaiveDate,
    pub run_name: String,
}

// ============================================================================
// Route Configuration
// ============================================================================

/// Configure upload routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(upload_regression);
}

/// Upload the logs of a regression run.
#[utoipa::path(
    post,
    path = "/api/upload-regression",
    tag = "Regressions",
    responses(
        (status = 200, description = "Run created and parser launched", body = UploadResponse),
        (status = 400, description = "Missing or invalid fields", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Project not found", body = ErrorResponse),
        (status = 500, description = "Parser could not be launched", body = ErrorResponse),
        (status = 503, description = "Too many concurrent uploads", body = ErrorResponse)
    ),
    security(("bearer" = []))
)]
#[post("/upload-regression")]
pub async fn upload_regression(
    auth: AuthUser,
    mut payload: Multipart,
    pool: web::Data<DbPool>,
    store: web::Data<LogStore>,
    launcher: web::Data<ParserLauncher>,
    upload_semaphore: web::Data<Arc<Semaphore>>,
) -> AppResult<HttpResponse> {
    // Acquire upload permit (bounds concurrent disk writes)
    let _permit = upload_semaphore.try_acquire().map_err(|_| {
        warn!("Upload rejected: too many concurrent uploads");
        AppError::ServiceUnavailable(
            "Too many concurrent uploads. Please try again later.".to_string(),
        )
    })?;

    info!("Receiving regression upload from {}", auth.caller.name);

    let staging = store.create_staging().await?;
    let result = process_upload(&mut payload, &staging, &pool, &store, &launcher).await;
    store.remove_dir(&staging).await;

    let response = result?;
    Ok(HttpResponse::Ok().json(response))
}

// ============================================================================
// Upload Pipeline
// ============================================================================

async fn process_upload(
    payload: &mut Multipart,
    staging: &Path,
    pool: &DbPool,
    store: &LogStore,
    launcher: &ParserLauncher,
) -> AppResult<UploadResponse> {
    let form = receive_form(payload, staging).await?;
    let meta = validate(&form)?;

    if !pool.project_exists(meta.project_id).await? {
        return Err(AppError::NotFound(format!("Project {}", meta.project_id)));
    }

    let txn = pool
        .connection()
        .begin()
        .await
        .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

    let run = insert_run(
        &txn,
        NewRun {
            project_id: meta.project_id,
            run_name: meta.run_name.clone(),
            plugin: meta.plugin.clone(),
            execution_date: meta.execution_date,
        },
    )
    .await?;

    let run_dir = match store.promote(staging, run.id, &form.files).await {
        Ok(dir) => dir,
        Err(e) => {
            if let Err(rollback_err) = txn.rollback().await {
                warn!("Failed to roll back run {}: {}", run.id, rollback_err);
            }
            return Err(e);
        }
    };

    if let Err(e) = txn.commit().await {
        store.remove_dir(&run_dir).await;
        return Err(AppError::Database(format!("Failed to commit run: {}", e)));
    }

    info!(
        run_id = run.id,
        project_id = meta.project_id,
        plugin = %meta.plugin,
        files = form.files.len(),
        rejected = form.rejected.len(),
        "Regression run created"
    );

    if let Err(e) = launcher.launch(run.id, &meta.plugin, &run_dir) {
        error!(run_id = run.id, "{}", e);
        pool.fail_run(run.id, e.to_string()).await?;
        return Err(e);
    }

    // The parser may already have reported (or failed) by now.
    let status = if pool
        .transition_run(run.id, &[RunStatus::Pending], RunStatus::Running, None)
        .await?
    {
        RunStatus::Running
    } else {
        pool.get_run(run.id)
            .await?
            .and_then(|r| RunStatus::parse(&r.status))
            .unwrap_or(RunStatus::Running)
    };

    Ok(UploadResponse {
        message: "Regression uploaded, parsing started".to_string(),
        run_id: run.id,
        status,
        files_accepted: form.files,
        files_rejected: form.rejected,
    })
}

/// Stream the multipart body: text fields into the form, log files into `staging`.
async fn receive_form(payload: &mut Multipart, staging: &Path) -> AppResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(item) = payload.next().await {
        let mut field =
            item.map_err(|e| AppError::InvalidInput(format!("Multipart error: {}", e)))?;

        let name = field.name().unwrap_or_default().to_string();
        let filename = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string);

        let Some(filename) = filename else {
            let value = read_text_field(&mut field, &name).await?;
            match name.as_str() {
                "projectId" => form.project_id = Some(value),
                "plugin" => form.plugin = Some(value),
                "runDate" => form.run_date = Some(value),
                "regressionName" => form.regression_name = Some(value),
                other => debug!("Ignoring unknown form field '{}'", other),
            }
            continue;
        };

        if name != LOGS_FIELD {
            drain_field(&mut field).await;
            form.rejected.push(RejectedFile {
                file: filename,
                reason: format!("Unexpected file field '{}'", name),
            });
            continue;
        }

        let Some(stored_name) = safe_file_name(&filename) else {
            drain_field(&mut field).await;
            form.rejected.push(RejectedFile {
                file: filename,
                reason: "Invalid file name".to_string(),
            });
            continue;
        };

        // Same name twice: the later file replaces the earlier one
        let mut file = tokio::fs::File::create(staging.join(&stored_name))
            .await
            .map_err(|e| AppError::FileSystem(format!("Failed to create staged file: {}", e)))?;

        let mut size: usize = 0;
        while let Some(chunk) = field.next().await {
            let data = chunk.map_err(|e| AppError::InvalidInput(format!("Read error: {}", e)))?;
            size += data.len();
            file.write_all(&data)
                .await
                .map_err(|e| AppError::FileSystem(format!("Failed to write staged file: {}", e)))?;
        }
        file.flush()
            .await
            .map_err(|e| AppError::FileSystem(format!("Failed to flush staged file: {}", e)))?;

        debug!("Staged {} ({} bytes)", stored_name, size);
        if !form.files.contains(&stored_name) {
            form.files.push(stored_name);
        }
    }

    Ok(form)
}

async fn read_text_field(field: &mut actix_multipart::Field, name: &str) -> AppResult<String> {
    let mut bytes = Vec::new();
    while let Some(chunk) = field.next().await {
        let data = chunk.map_err(|e| AppError::InvalidInput(format!("Read error: {}", e)))?;
        if bytes.len() + data.len() > MAX_TEXT_FIELD_BYTES {
            return Err(AppError::InvalidInput(format!("Field '{}' is too long", name)));
        }
        bytes.extend_from_slice(&data);
    }
    String::from_utf8(bytes)
        .map_err(|_| AppError::InvalidInput(format!("Field '{}' is not valid UTF-8", name)))
}

/// Drain a multipart field without saving.
async fn drain_field(field: &mut actix_multipart::Field) {
    while let Some(chunk) = field.next().await {
        let _ = chunk;
    }
}

// ============================================================================
// Validation
// ============================================================================

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Accepts `YYYY-MM-DD` or an RFC 3339 timestamp (truncated to its date).
pub fn parse_run_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|d| d.date_naive()))
}

/// Plugin ids are passed to the parser as an argument.
pub fn is_valid_plugin(plugin: &str) -> bool {
    !plugin.is_empty()
        && plugin
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Validate a received form. Nothing has been written to the database yet.
pub fn validate(form: &UploadForm) -> AppResult<UploadMetadata> {
    let project_id = non_blank(&form.project_id);
    let plugin = non_blank(&form.plugin);
    let run_date = non_blank(&form.run_date);
    let run_name = non_blank(&form.regression_name);

    let mut missing = Vec::new();
    for (field, value) in [
        ("projectId", project_id),
        ("plugin", plugin),
        ("runDate", run_date),
        ("regressionName", run_name),
    ] {
        if value.is_none() {
            missing.push(field.to_string());
        }
    }
    if form.files.is_empty() {
        missing.push(LOGS_FIELD.to_string());
    }

    let (Some(project_id), Some(plugin), Some(run_date), Some(run_name), true) =
        (project_id, plugin, run_date, run_name, missing.is_empty())
    else {
        return Err(AppError::MissingFields(missing));
    };

    let project_id = project_id
        .parse::<i64>()
        .ok()
        .filter(|id| *id > 0)
        .ok_or_else(|| AppError::InvalidInput("projectId must be a positive integer".to_string()))?;

    if !is_valid_plugin(plugin) {
        return Err(AppError::InvalidInput(
            "plugin may only contain letters, digits, '-' and '_'".to_string(),
        ));
    }

    let execution_date = parse_run_date(run_date).ok_or_else(|| {
        AppError::InvalidInput(format!("runDate '{}' is not a date (YYYY-MM-DD)", run_date))
    })?;

    Ok(UploadMetadata {
        project_id,
        plugin: plugin.to_string(),
        execution_date,
        run_name: run_name.to_string(),
    })
}
