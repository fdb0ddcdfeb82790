//! Result reconciliation: turns a parser's results into test case and error
//! rows of a run.
//!
//! `POST /api/upload-regression/json`
//!
//! Everything happens inside one transaction: the guarded counter update, the
//! test cases and their errors, the unresolved records and the log artifacts.
//! Either the whole reconciliation is visible or none of it is.

use std::collections::HashSet;

use actix_web::{HttpResponse, post, web};
use sea_orm::TransactionTrait;
use tracing::{info, warn};

use crate::auth::ParserAuth;
use crate::db::DbPool;
use crate::db::reconcile::{
    NewTestCase, NewUnresolved, OwnerCandidate, RunCounts, complete_run, find_owner_candidates,
    insert_log_artifact, insert_test_case, insert_test_error, insert_unresolved,
};
use crate::db::runs::find_run;
use crate::error::{AppError, AppResult, ErrorResponse};
use crate::models::{
    ParsedResultsRequest, ParsedTestRecord, ReconcileReport, RunStatus, TestStatus,
    UnresolvedReason, UnresolvedRecord,
};
use crate::services::storage::{LogStore, component_log_name, is_plain_file_name};

/// Configure reconciliation routes.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(submit_results);
}

/// Receive parsed results for a run.
///
/// Authenticated by `X-Parser-Token`, or by an admin/manager session.
#[utoipa::path(
    post,
    path = "/api/upload-regression/json",
    tag = "Regressions",
    request_body = ParsedResultsRequest,
    params(
        ("X-Parser-Token" = Option<String>, Header, description = "Parser callback token")
    ),
    responses(
        (status = 200, description = "Results reconciled", body = ReconcileReport),
        (status = 400, description = "Invalid counters", body = ErrorResponse),
        (status = 401, description = "Unauthorized", body = ErrorResponse),
        (status = 404, description = "Run not found", body = ErrorResponse),
        (status = 409, description = "Run already reconciled", body = ErrorResponse)
    )
)]
#[post("/upload-regression/json")]
pub async fn submit_results(
    auth: ParserAuth,
    pool: web::Data<DbPool>,
    store: web::Data<LogStore>,
    body: web::Json<ParsedResultsRequest>,
) -> AppResult<HttpResponse> {
    let submitted_by = auth
        .caller
        .as_ref()
        .map(|c| c.name.as_str())
        .unwrap_or("parser");
    info!(
        run_id = body.run_id,
        records = body.parsed_logs.len(),
        "Reconciling results submitted by {}",
        submitted_by
    );

    let report = reconcile(&pool, &store, body.into_inner()).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Check the counters and convert them to the stored width.
pub fn validate_counts(req: &ParsedResultsRequest) -> AppResult<RunCounts> {
    let fields = [
        ("numOfTotal", req.num_of_total),
        ("numOfPassed", req.num_of_passed),
        ("numOfFailed", req.num_of_failed),
        ("numOfUnknown", req.num_of_unknown),
    ];

    let mut values = [0i32; 4];
    for (slot, (name, value)) in values.iter_mut().zip(fields) {
        if value < 0 {
            return Err(AppError::InvalidInput(format!(
                "{} must not be negative",
                name
            )));
        }
        *slot = i32::try_from(value)
            .map_err(|_| AppError::InvalidInput(format!("{} is too large", name)))?;
    }
    let [total, passed, failed, unknown] = values;

    if i64::from(total) != i64::from(passed) + i64::from(failed) + i64::from(unknown) {
        return Err(AppError::InvalidInput(format!(
            "numOfTotal ({}) must equal numOfPassed + numOfFailed + numOfUnknown ({} + {} + {})",
            total, passed, failed, unknown
        )));
    }

    let counts = RunCounts {
        total,
        passed,
        failed,
        unknown,
    };
    if !req.parsed_logs.is_empty() {
        let derived = derive_counts(&req.parsed_logs);
        if derived != counts {
            return Err(AppError::InvalidInput(format!(
                "counters (total {}, passed {}, failed {}, unknown {}) do not match parsedLogs \
                 (total {}, passed {}, failed {}, unknown {})",
                counts.total,
                counts.passed,
                counts.failed,
                counts.unknown,
                derived.total,
                derived.passed,
                derived.failed,
                derived.unknown
            )));
        }
    }

    Ok(counts)
}

/// Count records per status the way they are stored.
pub fn derive_counts(records: &[ParsedTestRecord]) -> RunCounts {
    let mut counts = RunCounts::default();
    for record in records {
        counts.total = counts.total.saturating_add(1);
        let slot = match TestStatus::from_parser(record.status.as_deref()) {
            TestStatus::Pass => &mut counts.passed,
            TestStatus::Fail => &mut counts.failed,
            TestStatus::Unknown => &mut counts.unknown,
        };
        *slot = slot.saturating_add(1);
    }
    counts
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Names of required fields that are missing or blank, if any.
pub fn missing_fields(record: &ParsedTestRecord) -> Option<String> {
    let missing: Vec<&str> = [
        ("test_name", &record.test_name),
        ("component", &record.component),
        ("owner", &record.owner),
    ]
    .into_iter()
    .filter(|(_, value)| present(value).is_none())
    .map(|(name, _)| name)
    .collect();

    if missing.is_empty() {
        None
    } else {
        Some(format!("missing {}", missing.join(", ")))
    }
}

/// Outcome of matching a record against component/owner candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved(OwnerCandidate),
    NoMatch,
    Ambiguous(usize),
}

/// Pick the single candidate a record resolves to.
///
/// Several candidates are narrowed by the record's module name when it has
/// one; anything other than exactly one survivor is ambiguous.
pub fn classify_candidates(mut candidates: Vec<OwnerCandidate>, module: Option<&str>) -> Resolution {
    match candidates.len() {
        0 => return Resolution::NoMatch,
        1 => return candidates.pop().map_or(Resolution::NoMatch, Resolution::Resolved),
        _ => {}
    }

    let total = candidates.len();
    let Some(module) = module.map(str::trim).filter(|m| !m.is_empty()) else {
        return Resolution::Ambiguous(total);
    };

    candidates.retain(|c| c.module_name == module);
    match candidates.len() {
        1 => candidates.pop().map_or(Resolution::NoMatch, Resolution::Resolved),
        0 => Resolution::Ambiguous(total),
        n => Resolution::Ambiguous(n),
    }
}

/// Apply parsed results to a run in a single transaction.
pub async fn reconcile(
    pool: &DbPool,
    store: &LogStore,
    req: ParsedResultsRequest,
) -> AppResult<ReconcileReport> {
    let counts = validate_counts(&req)?;
    let run_id = req.run_id;

    let txn = pool
        .connection()
        .begin()
        .await
        .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

    let run = find_run(&txn, run_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Regression run {}", run_id)))?;

    if complete_run(&txn, run_id, counts).await? == 0 {
        return Err(AppError::AlreadyReconciled {
            run_id,
            status: run.status,
        });
    }

    let mut tests_inserted = 0;
    let mut errors_inserted = 0;
    let mut artifacts_recorded = 0;
    let mut unresolved = Vec::new();
    let mut logged_components = HashSet::new();

    for (index, record) in req.parsed_logs.iter().enumerate() {
        let outcome = match missing_fields(record) {
            Some(detail) => Err((UnresolvedReason::MissingField, detail)),
            None => {
                let component = present(&record.component).unwrap_or_default();
                let owner = present(&record.owner).unwrap_or_default();
                let candidates =
                    find_owner_candidates(&txn, run.project_id, component, owner).await?;

                match classify_candidates(candidates, record.module.as_deref()) {
                    Resolution::Resolved(candidate) => Ok(candidate),
                    Resolution::NoMatch => Err((
                        UnresolvedReason::NoMatch,
                        format!(
                            "no component '{}' owned by '{}' in project {}",
                            component, owner, run.project_id
                        ),
                    )),
                    Resolution::Ambiguous(n) => Err((
                        UnresolvedReason::Ambiguous,
                        format!("{} component/owner pairs match '{}'", n, component),
                    )),
                }
            }
        };

        let candidate = match outcome {
            Ok(candidate) => candidate,
            Err((reason, detail)) => {
                warn!(
                    run_id,
                    index,
                    reason = %reason,
                    "Unresolved test record: {}",
                    detail
                );
                insert_unresolved(
                    &txn,
                    NewUnresolved {
                        run_id,
                        position: i32::try_from(index).unwrap_or(i32::MAX),
                        test_name: record.test_name.clone(),
                        component: record.component.clone(),
                        owner: record.owner.clone(),
                        reason,
                        detail: Some(detail.clone()),
                        payload: serde_json::to_value(record)?,
                    },
                )
                .await?;
                unresolved.push(UnresolvedRecord {
                    index,
                    test_name: record.test_name.clone(),
                    component: record.component.clone(),
                    owner: record.owner.clone(),
                    reason,
                    detail: Some(detail),
                });
                continue;
            }
        };

        let test = insert_test_case(
            &txn,
            NewTestCase {
                run_id,
                component_id: candidate.component_id,
                owner_id: candidate.owner_id,
                test_name: present(&record.test_name).unwrap_or_default(),
                test_command: record.test_command.as_deref().unwrap_or_default(),
                status: TestStatus::from_parser(record.status.as_deref()),
            },
        )
        .await?;
        tests_inserted += 1;

        for message in &record.summary.identified_errors {
            insert_test_error(&txn, test.id, message).await?;
            errors_inserted += 1;
        }

        if logged_components.insert(candidate.component_id) {
            let file_name = component_log_name(present(&record.component).unwrap_or_default());
            if is_plain_file_name(&file_name) && store.log_exists(run_id, &file_name).await {
                insert_log_artifact(&txn, run_id, candidate.component_id, &file_name).await?;
                artifacts_recorded += 1;
            }
        }
    }

    txn.commit()
        .await
        .map_err(|e| AppError::Database(format!("Failed to commit reconciliation: {}", e)))?;

    info!(
        run_id,
        tests_inserted,
        errors_inserted,
        artifacts_recorded,
        unresolved = unresolved.len(),
        "Run reconciled"
    );

    Ok(ReconcileReport {
        run_id,
        status: RunStatus::Complete,
        tests_inserted,
        errors_inserted,
        artifacts_recorded,
        unresolved,
    })
}
