//! Reconciliation tests: POST /api/upload-regression/json and parser supervision.

use std::time::Duration;

use actix_web::test;
use regtrack_lib::db::DbPool;
use regtrack_lib::entity::regression_run;
use regtrack_lib::services::parser::ParserLauncher;
use serde_json::{Value, json};

use super::test_helpers::*;

fn record(test_name: &str, component: &str, owner: &str, status: &str) -> Value {
    json!({
        "test_name": test_name,
        "test_command": format!("run {}", test_name),
        "owner": owner,
        "component": component,
        "status": status,
        "summary": {"errors": 0, "warnings": 0, "identified_errors": []}
    })
}

fn reasons(report: &Value) -> Vec<String> {
    let mut reasons: Vec<String> = report["unresolved"]
        .as_array()
        .expect("unresolved list")
        .iter()
        .map(|u| u["reason"].as_str().unwrap_or_default().to_string())
        .collect();
    reasons.sort();
    reasons
}

async fn wait_for_status(pool: &DbPool, run_id: i64, wanted: &str) -> regression_run::Model {
    for _ in 0..100 {
        let run = pool.get_run(run_id).await.unwrap().expect("run exists");
        if run.status == wanted {
            return run;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    panic!("run {} never reached {}", run_id, wanted);
}

#[actix_rt::test]
async fn test_reconcile_resolves_and_records_unresolved() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;

    let run_id = insert_pending_run(&env.pool, seed.project_id, "nightly").await;
    let run_dir = env.store.run_dir(run_id);
    tokio::fs::create_dir_all(&run_dir).await.unwrap();
    tokio::fs::write(run_dir.join("auth.txt"), "auth output").await.unwrap();

    let mut failing = record("billing_refund", "billing", &seed.owner_name, "FAIL");
    failing["summary"]["identified_errors"] = json!(["refund timed out", "ledger mismatch"]);
    let mut core_auth = record("auth_login", "auth", &seed.owner_name, "PASS");
    core_auth["module"] = json!("Core");

    let (status, report) = submit_results(
        &app,
        json!({
            "runId": run_id,
            "numOfTotal": 5,
            "numOfFailed": 2,
            "numOfPassed": 2,
            "numOfUnknown": 1,
            "parsedLogs": [
                failing,
                core_auth,
                record("auth_logout", "auth", &seed.owner_name, "PASS"),
                record("billing_invoice", "billing", "Nobody Known", "UNKNOWN"),
                {"component": "billing", "owner": seed.owner_name, "status": "FAIL"}
            ]
        }),
    )
    .await;

    assert_eq!(status, 200, "{}", report);
    assert_eq!(report["status"], "complete");
    assert_eq!(report["testsInserted"], 2);
    assert_eq!(report["errorsInserted"], 2);
    assert_eq!(report["artifactsRecorded"], 1);
    assert_eq!(reasons(&report), vec!["ambiguous", "missing_field", "no_match"]);

    let run = env.pool.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, "complete");
    assert_eq!(run.total_tests, 5);
    assert_eq!(run.passed_tests, 2);
    assert_eq!(run.failed_tests, 2);
    assert_eq!(run.unknown_tests, 1);
    assert!(run.completed_at.is_some());

    let (status, unresolved) =
        admin_get(&app, &format!("/api/regression/{}/unresolved", run_id)).await;
    assert_eq!(status, 200);
    let rows = unresolved.as_array().unwrap();
    assert_eq!(rows.len(), 3);
    let missing = rows
        .iter()
        .find(|r| r["reason"] == "missing_field")
        .expect("missing field row");
    assert_eq!(missing["payload"]["component"], "billing");
}

#[actix_rt::test]
async fn test_second_submission_conflicts() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;
    let run_id = insert_pending_run(&env.pool, seed.project_id, "twice").await;

    let body = json!({
        "runId": run_id,
        "numOfTotal": 1,
        "numOfFailed": 0,
        "numOfPassed": 1,
        "numOfUnknown": 0,
        "parsedLogs": [record("billing_ok", "billing", &seed.owner_name, "PASS")]
    });

    let (status, _) = submit_results(&app, body.clone()).await;
    assert_eq!(status, 200);

    let (status, err) = submit_results(&app, body).await;
    assert_eq!(status, 409);
    assert_eq!(err["error"], "ALREADY_RECONCILED");

    let (_, modules) = admin_get(&app, &format!("/api/regression/{}/modules", run_id)).await;
    let core = modules
        .as_array()
        .unwrap()
        .iter()
        .find(|m| m["module_id"] == seed.core_id)
        .expect("core module listed");
    assert_eq!(core["total_tests"], 1);
}

#[actix_rt::test]
async fn test_inconsistent_counts_leave_run_open() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;
    let run_id = insert_pending_run(&env.pool, seed.project_id, "bad-counts").await;

    let (status, err) = submit_results(
        &app,
        json!({
            "runId": run_id,
            "numOfTotal": 3,
            "numOfFailed": 1,
            "numOfPassed": 1,
            "numOfUnknown": 0,
            "parsedLogs": []
        }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(err["error"], "INVALID_INPUT");

    let run = env.pool.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, "pending");
}

#[actix_rt::test]
async fn test_counters_must_match_records() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;
    let run_id = insert_pending_run(&env.pool, seed.project_id, "understated").await;

    let (status, err) = submit_results(
        &app,
        json!({
            "runId": run_id,
            "numOfTotal": 0,
            "numOfFailed": 0,
            "numOfPassed": 0,
            "numOfUnknown": 0,
            "parsedLogs": [
                record("billing_refund", "billing", &seed.owner_name, "FAIL"),
                record("billing_invoice", "billing", &seed.owner_name, "FAIL")
            ]
        }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(err["error"], "INVALID_INPUT");

    let run = env.pool.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, "pending");
    assert_eq!(run.total_tests, 0);
    let (_, modules) = admin_get(&app, &format!("/api/regression/{}/modules", run_id)).await;
    assert!(modules.as_array().unwrap().is_empty());
}

#[actix_rt::test]
async fn test_empty_parsed_logs_only_updates_counters() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;
    let run_id = insert_pending_run(&env.pool, seed.project_id, "counters-only").await;

    let (status, report) = submit_results(
        &app,
        json!({
            "runId": run_id,
            "numOfTotal": 7,
            "numOfFailed": 2,
            "numOfPassed": 4,
            "numOfUnknown": 1,
            "parsedLogs": []
        }),
    )
    .await;
    assert_eq!(status, 200, "{}", report);
    assert_eq!(report["status"], "complete");
    assert_eq!(report["testsInserted"], 0);
    assert_eq!(report["errorsInserted"], 0);
    assert!(report["unresolved"].as_array().unwrap().is_empty());

    let run = env.pool.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, "complete");
    assert_eq!(run.total_tests, 7);
    assert_eq!(run.passed_tests, 4);
    assert_eq!(run.failed_tests, 2);
    assert_eq!(run.unknown_tests, 1);

    let (_, modules) = admin_get(&app, &format!("/api/regression/{}/modules", run_id)).await;
    assert!(modules.as_array().unwrap().is_empty());
    let (_, failing) = admin_get(&app, &format!("/api/regression/{}/errors", run_id)).await;
    assert!(failing.as_array().unwrap().is_empty());
}

#[actix_rt::test]
async fn test_module_picks_between_homonym_components() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;
    let run_id = insert_pending_run(&env.pool, seed.project_id, "homonyms").await;

    // `auth` exists in both Core and Edge.
    let mut edge_auth = record("edge_handshake", "auth", &seed.owner_name, "FAIL");
    edge_auth["module"] = json!("Edge");
    edge_auth["summary"]["identified_errors"] = json!(["handshake refused"]);
    let mut core_auth = record("auth_login", "auth", &seed.owner_name, "PASS");
    core_auth["module"] = json!("Core");

    let (status, report) = submit_results(
        &app,
        json!({
            "runId": run_id,
            "numOfTotal": 3,
            "numOfFailed": 1,
            "numOfPassed": 2,
            "numOfUnknown": 0,
            "parsedLogs": [
                edge_auth,
                core_auth,
                record("auth_guess", "auth", &seed.owner_name, "PASS")
            ]
        }),
    )
    .await;
    assert_eq!(status, 200, "{}", report);
    assert_eq!(report["testsInserted"], 2);
    assert_eq!(reasons(&report), vec!["ambiguous"]);

    let edge_component = format!(
        "/api/regression/{}/module/{}/component/{}",
        run_id, seed.edge_id, seed.edge_auth_id
    );
    let (status, component) = admin_get(&app, &edge_component).await;
    assert_eq!(status, 200);
    let tests = component["tests"].as_array().unwrap();
    assert_eq!(tests.len(), 1);
    assert_eq!(tests[0]["test_name"], "edge_handshake");

    let (_, errors) = admin_get(&app, &format!("{}/errors", edge_component)).await;
    assert_eq!(errors[0]["message"], "handshake refused");

    let core_component = format!(
        "/api/regression/{}/module/{}/component/{}",
        run_id, seed.core_id, seed.auth_id
    );
    let (_, component) = admin_get(&app, &core_component).await;
    assert_eq!(component["tests"].as_array().unwrap().len(), 1);
    assert_eq!(component["tests"][0]["test_name"], "auth_login");
}

#[actix_rt::test]
async fn test_unknown_run_is_not_found() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;

    let (status, _) = submit_results(
        &app,
        json!({
            "runId": 999_999_999,
            "numOfTotal": 0,
            "numOfFailed": 0,
            "numOfPassed": 0,
            "numOfUnknown": 0
        }),
    )
    .await;
    assert_eq!(status, 404);
}

#[actix_rt::test]
async fn test_callback_rejects_wrong_token_and_plain_users() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;
    let run_id = insert_pending_run(&env.pool, seed.project_id, "guarded").await;
    let body = json!({
        "runId": run_id,
        "numOfTotal": 0,
        "numOfFailed": 0,
        "numOfPassed": 0,
        "numOfUnknown": 0
    });

    let req = test::TestRequest::post()
        .uri("/api/upload-regression/json")
        .insert_header(("X-Parser-Token", "not-the-token"))
        .set_json(body.clone())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let token = login(&app, &seed.owner_email).await;
    let req = test::TestRequest::post()
        .uri("/api/upload-regression/json")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let run = env.pool.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, "pending");
}

#[actix_rt::test]
async fn test_parser_failure_marks_run_failed() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let run_id = insert_pending_run(&pool, seed.project_id, "crashing").await;

    let mut settings = idle_parser_settings();
    settings.base_args = vec!["-c".to_string(), "exit 3".to_string(), "parser".to_string()];
    let launcher = ParserLauncher::new(settings, pool.clone());
    let folder = tempfile::tempdir().unwrap();
    launcher.launch(run_id, "generic", folder.path()).unwrap();

    let run = wait_for_status(&pool, run_id, "failed").await;
    assert_eq!(
        run.error_message.as_deref(),
        Some("parser exited with status 3")
    );
}

#[actix_rt::test]
async fn test_parser_timeout_marks_run_failed() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let run_id = insert_pending_run(&pool, seed.project_id, "hanging").await;

    let mut settings = idle_parser_settings();
    settings.timeout_secs = 1;
    let launcher = ParserLauncher::new(settings, pool.clone());
    let folder = tempfile::tempdir().unwrap();
    launcher.launch(run_id, "generic", folder.path()).unwrap();

    let run = wait_for_status(&pool, run_id, "failed").await;
    assert_eq!(
        run.error_message.as_deref(),
        Some("parser timed out after 1 seconds")
    );
}

#[actix_rt::test]
async fn test_late_parser_exit_keeps_completed_run() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;
    let run_id = insert_pending_run(&env.pool, seed.project_id, "late-exit").await;

    let mut settings = idle_parser_settings();
    settings.base_args = vec!["-c".to_string(), "sleep 1; exit 2".to_string(), "parser".to_string()];
    let launcher = ParserLauncher::new(settings, env.pool.clone());
    let folder = tempfile::tempdir().unwrap();
    launcher.launch(run_id, "generic", folder.path()).unwrap();

    let (status, _) = submit_results(
        &app,
        json!({
            "runId": run_id,
            "numOfTotal": 0,
            "numOfFailed": 0,
            "numOfPassed": 0,
            "numOfUnknown": 0
        }),
    )
    .await;
    assert_eq!(status, 200);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let run = env.pool.get_run(run_id).await.unwrap().unwrap();
    assert_eq!(run.status, "complete");
    assert!(run.error_message.is_none());
}
