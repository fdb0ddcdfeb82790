//! Drill-down query tests over reconciled runs.

use actix_web::test;
use chrono::NaiveDate;
use regtrack_lib::db::DbPool;
use regtrack_lib::db::runs::{NewRun, insert_run};
use serde_json::{Value, json};

use super::test_helpers::*;

/// Insert a run on `date` and reconcile the given records into it.
async fn reconciled_run<S>(
    app: &S,
    pool: &DbPool,
    seed: &Seed,
    name: &str,
    date: NaiveDate,
    records: Vec<Value>,
) -> i64
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let run_id = insert_run(
        pool.connection(),
        NewRun {
            project_id: seed.project_id,
            run_name: name.to_string(),
            plugin: "generic".to_string(),
            execution_date: date,
        },
    )
    .await
    .unwrap()
    .id;

    let count = |status: &str| records.iter().filter(|r| r["status"] == status).count();
    let (passed, failed, unknown) = (count("PASS"), count("FAIL"), count("UNKNOWN"));
    let (status, body) = submit_results(
        app,
        json!({
            "runId": run_id,
            "numOfTotal": records.len(),
            "numOfFailed": failed,
            "numOfPassed": passed,
            "numOfUnknown": unknown,
            "parsedLogs": records
        }),
    )
    .await;
    assert_eq!(status, 200, "{}", body);
    run_id
}

fn core_record(seed: &Seed, test_name: &str, component: &str, status: &str, errors: &[&str]) -> Value {
    json!({
        "test_name": test_name,
        "test_command": format!("run {}", test_name),
        "owner": seed.owner_name,
        "component": component,
        "module": "Core",
        "status": status,
        "summary": {"identified_errors": errors}
    })
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, day).unwrap()
}

#[actix_rt::test]
async fn test_run_views() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;

    let run_id = reconciled_run(
        &app,
        &env.pool,
        &seed,
        "views",
        date(2),
        vec![
            core_record(&seed, "auth_login", "auth", "PASS", &[]),
            core_record(&seed, "auth_reset", "auth", "FAIL", &["token expired"]),
            core_record(&seed, "billing_sync", "billing", "UNKNOWN", &[]),
        ],
    )
    .await;

    let (status, run) = admin_get(&app, &format!("/api/regression/{}", run_id)).await;
    assert_eq!(status, 200);
    assert_eq!(run["status"], "complete");
    assert_eq!(run["total_tests"], 3);
    assert_eq!(run["execution_date"], "2025-06-02");

    let (status, _) = admin_get(&app, "/api/regression/999999999").await;
    assert_eq!(status, 404);

    let (_, failing) = admin_get(&app, &format!("/api/regression/{}/errors", run_id)).await;
    let names: Vec<&str> = failing
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|t| t["test_name"].as_str())
        .collect();
    assert_eq!(names, vec!["auth_reset", "billing_sync"]);

    let (_, modules) = admin_get(&app, &format!("/api/regression/{}/modules", run_id)).await;
    let modules = modules.as_array().unwrap();
    assert_eq!(modules.len(), 1);
    assert_eq!(modules[0]["module_id"], seed.core_id);
    assert_eq!(modules[0]["component_count"], 2);
    assert_eq!(modules[0]["failed_tests"], 1);

    let (_, unresolved) = admin_get(&app, &format!("/api/regression/{}/unresolved", run_id)).await;
    assert!(unresolved.as_array().unwrap().is_empty());

    let (_, runs) =
        admin_get(&app, &format!("/api/regressions/project/{}", seed.project_id)).await;
    assert_eq!(runs.as_array().unwrap().len(), 1);

    let (_, team) =
        admin_get(&app, &format!("/api/regressions/project/{}/team", seed.project_id)).await;
    assert!(
        team.as_array()
            .unwrap()
            .iter()
            .any(|m| m["user_id"] == seed.owner_id)
    );
}

#[actix_rt::test]
async fn test_module_and_component_drilldown() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;

    let first = reconciled_run(
        &app,
        &env.pool,
        &seed,
        "first",
        date(3),
        vec![core_record(&seed, "auth_login", "auth", "FAIL", &["bad password"])],
    )
    .await;
    let second = reconciled_run(
        &app,
        &env.pool,
        &seed,
        "second",
        date(4),
        vec![
            core_record(&seed, "auth_login", "auth", "PASS", &[]),
            core_record(&seed, "billing_sync", "billing", "FAIL", &["timeout", "retry failed"]),
        ],
    )
    .await;

    let module_base = format!("/api/regression/{}/module/{}", second, seed.core_id);

    let (status, summary) = admin_get(&app, &module_base).await;
    assert_eq!(status, 200);
    assert_eq!(summary["module_name"], "Core");
    assert_eq!(summary["total_tests"], 2);
    assert_eq!(summary["passed_tests"], 1);
    assert_eq!(summary["last_regression_date"], "2025-06-04");

    let (_, untouched) = admin_get(
        &app,
        &format!("/api/regression/{}/module/{}", second, seed.edge_id),
    )
    .await;
    assert!(untouched.is_null());

    let (_, contribution) = admin_get(&app, &format!("{}/contribution", module_base)).await;
    assert_eq!(contribution[0]["user_id"], seed.owner_id);
    assert_eq!(contribution[0]["test_count"], 2);

    let (_, module_errors) = admin_get(&app, &format!("{}/errors", module_base)).await;
    assert_eq!(module_errors.as_array().unwrap().len(), 1);
    assert_eq!(module_errors[0]["component_name"], "billing");

    let (_, components) = admin_get(&app, &format!("{}/components", module_base)).await;
    let components = components.as_array().unwrap();
    assert_eq!(components.len(), 2);
    assert_eq!(components[0]["component_name"], "auth");

    let billing_base = format!("{}/component/{}", module_base, seed.billing_id);
    let (_, component) = admin_get(&app, &billing_base).await;
    assert_eq!(component["component_name"], "billing");
    assert_eq!(component["tests"].as_array().unwrap().len(), 1);
    assert_eq!(component["tests"][0]["owner_name"], seed.owner_name.as_str());

    let (_, errors) = admin_get(&app, &format!("{}/errors", billing_base)).await;
    let messages: Vec<&str> = errors
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["message"].as_str())
        .collect();
    assert_eq!(messages, vec!["timeout", "retry failed"]);

    let auth_history = format!("{}/component/{}/history", module_base, seed.auth_id);
    let (_, history) = admin_get(&app, &auth_history).await;
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["run_id"], second);
    assert_eq!(history[1]["run_id"], first);
    assert_eq!(history[1]["errors"][0], "bad password");
}

#[actix_rt::test]
async fn test_component_logs() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;

    let run_id = insert_pending_run(&env.pool, seed.project_id, "logs").await;
    let run_dir = env.store.run_dir(run_id);
    tokio::fs::create_dir_all(&run_dir).await.unwrap();
    tokio::fs::write(run_dir.join("auth.txt"), "auth output\nline two\n")
        .await
        .unwrap();

    let (status, _) = submit_results(
        &app,
        json!({
            "runId": run_id,
            "numOfTotal": 2,
            "numOfFailed": 0,
            "numOfPassed": 2,
            "numOfUnknown": 0,
            "parsedLogs": [
                core_record(&seed, "auth_login", "auth", "PASS", &[]),
                core_record(&seed, "billing_sync", "billing", "PASS", &[])
            ]
        }),
    )
    .await;
    assert_eq!(status, 200);

    let base = format!("/api/regression/{}/module/{}/component", run_id, seed.core_id);

    let req = test::TestRequest::get()
        .uri(&format!("{}/{}/logs", base, seed.auth_id))
        .insert_header(("X-Admin-Key", TEST_ADMIN_KEY))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body = test::read_body(resp).await;
    assert_eq!(&body[..], b"auth output\nline two\n");

    // No artifact for billing: a name is required, and the file is absent.
    let (status, _) = admin_get(&app, &format!("{}/{}/logs", base, seed.billing_id)).await;
    assert_eq!(status, 400);
    let (status, _) = admin_get(
        &app,
        &format!("{}/{}/logs?name=billing", base, seed.billing_id),
    )
    .await;
    assert_eq!(status, 404);

    let (status, err) = admin_get(
        &app,
        &format!("{}/{}/logs?name=nested/billing", base, seed.billing_id),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(err["error"], "INVALID_INPUT");
    let (status, _) = admin_get(
        &app,
        &format!("{}/{}/logs?name=nested%5Cbilling", base, seed.billing_id),
    )
    .await;
    assert_eq!(status, 400);
}

#[actix_rt::test]
async fn test_list_regressions_by_status() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;

    let pending = insert_pending_run(&env.pool, seed.project_id, "queued").await;

    let (status, runs) = admin_get(&app, "/api/regressions?status=pending").await;
    assert_eq!(status, 200);
    let runs = runs.as_array().unwrap();
    assert!(runs.iter().any(|r| r["id"] == pending));
    assert!(runs.iter().all(|r| r["status"] == "pending"));

    let (status, _) = admin_get(&app, "/api/regressions?status=finished").await;
    assert_eq!(status, 400);

    let token = login(&app, &seed.owner_email).await;
    let req = test::TestRequest::get()
        .uri("/api/regressions?status=pending")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);
}
