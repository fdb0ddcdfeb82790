//! Upload tests: POST /api/upload-regression.

use std::sync::Arc;

use actix_web::test;
use serde_json::Value;
use tokio::sync::Semaphore;

use super::test_helpers::*;

fn upload_request(token: &str, parts: &[Part<'_>]) -> actix_http::Request {
    let (content_type, body) = multipart_body(parts);
    test::TestRequest::post()
        .uri("/api/upload-regression")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .insert_header(("Content-Type", content_type))
        .set_payload(body)
        .to_request()
}

#[actix_rt::test]
async fn test_upload_creates_running_run_with_logs() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;
    let token = login(&app, &seed.owner_email).await;

    let project_id = seed.project_id.to_string();
    let req = upload_request(
        &token,
        &[
            ("projectId", None, project_id.as_str()),
            ("plugin", None, "generic"),
            ("runDate", None, "2025-06-01"),
            ("regressionName", None, "nightly"),
            ("logs", Some("auth.txt"), "auth log"),
            ("logs", Some("nested/billing.txt"), "billing log"),
            ("attachment", Some("notes.txt"), "ignored"),
        ],
    );
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;

    let run_id = body["runId"].as_i64().expect("run id");
    assert_eq!(body["status"], "running");
    let mut accepted: Vec<&str> = body["filesAccepted"]
        .as_array()
        .expect("accepted files")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    accepted.sort_unstable();
    assert_eq!(accepted, vec!["auth.txt", "billing.txt"]);
    assert_eq!(body["filesRejected"][0]["file"], "notes.txt");

    assert!(env.store.log_exists(run_id, "auth.txt").await);
    assert!(env.store.log_exists(run_id, "billing.txt").await);
    assert!(!env.store.log_exists(run_id, "notes.txt").await);

    let run = env.pool.get_run(run_id).await.unwrap().expect("run stored");
    assert_eq!(run.project_id, seed.project_id);
    assert_eq!(run.run_name, "nightly");
    assert_eq!(run.status, "running");
    assert_eq!(run.total_tests, 0);
}

#[actix_rt::test]
async fn test_upload_duplicate_log_name_keeps_later_file() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;
    let token = login(&app, &seed.owner_email).await;

    let project_id = seed.project_id.to_string();
    let req = upload_request(
        &token,
        &[
            ("projectId", None, project_id.as_str()),
            ("plugin", None, "generic"),
            ("runDate", None, "2025-06-01"),
            ("regressionName", None, "three-files"),
            ("logs", Some("auth.txt"), "first auth run"),
            ("logs", Some("billing.txt"), "billing log"),
            ("logs", Some("retry/auth.txt"), "second auth run"),
        ],
    );
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    let run_id = body["runId"].as_i64().expect("run id");

    let mut accepted: Vec<&str> = body["filesAccepted"]
        .as_array()
        .expect("accepted files")
        .iter()
        .filter_map(Value::as_str)
        .collect();
    accepted.sort_unstable();
    assert_eq!(accepted, vec!["auth.txt", "billing.txt"]);

    let auth = env.store.read_log(run_id, "auth.txt").await.unwrap();
    assert_eq!(auth.as_deref(), Some(&b"second auth run"[..]));
    let billing = env.store.read_log(run_id, "billing.txt").await.unwrap();
    assert_eq!(billing.as_deref(), Some(&b"billing log"[..]));

    let mut entries = tokio::fs::read_dir(env.store.run_dir(run_id)).await.unwrap();
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    names.sort_unstable();
    assert_eq!(names, vec!["auth.txt", "billing.txt"]);
}

#[actix_rt::test]
async fn test_upload_missing_fields_creates_nothing() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;
    let token = login(&app, &seed.owner_email).await;

    let project_id = seed.project_id.to_string();
    let req = upload_request(
        &token,
        &[
            ("projectId", None, project_id.as_str()),
            ("plugin", None, "generic"),
            ("runDate", None, "2025-06-01"),
        ],
    );
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "MISSING_FIELDS");
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("regressionName"), "{}", message);
    assert!(message.contains("logs"), "{}", message);

    let runs = env.pool.list_runs_for_project(seed.project_id).await.unwrap();
    assert!(runs.is_empty());

    let mut entries = tokio::fs::read_dir(env.store.root()).await.unwrap();
    while let Some(entry) = entries.next_entry().await.unwrap() {
        assert_eq!(entry.file_name(), ".staging", "unexpected {:?}", entry.path());
    }
}

#[actix_rt::test]
async fn test_upload_unknown_project_is_not_found() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;
    let token = login(&app, &seed.owner_email).await;

    let req = upload_request(
        &token,
        &[
            ("projectId", None, "999999999"),
            ("plugin", None, "generic"),
            ("runDate", None, "2025-06-01"),
            ("regressionName", None, "nightly"),
            ("logs", Some("auth.txt"), "auth log"),
        ],
    );
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_rt::test]
async fn test_upload_requires_login() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;

    let (content_type, body) = multipart_body(&[("plugin", None, "generic")]);
    let req = test::TestRequest::post()
        .uri("/api/upload-regression")
        .insert_header(("Content-Type", content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_rt::test]
async fn test_upload_rejected_when_permits_exhausted() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let mut env = TestEnv::new(pool).await;
    env.permits = Arc::new(Semaphore::new(0));
    let app = create_test_app(&env).await;
    let token = login(&app, &seed.owner_email).await;

    let req = upload_request(&token, &[("plugin", None, "generic")]);
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 503);
}
