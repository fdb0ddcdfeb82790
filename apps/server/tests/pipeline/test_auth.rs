//! Login, access control, project and user management tests.

use actix_web::test;
use serde_json::{Value, json};

use super::test_helpers::*;

async fn post_json<S>(app: &S, uri: &str, auth: (&str, String), body: Value) -> (u16, Value)
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = test::TestRequest::post()
        .uri(uri)
        .insert_header(auth)
        .set_json(body)
        .to_request();
    let resp = test::call_service(app, req).await;
    let status = resp.status().as_u16();
    let body = test::read_body(resp).await;
    (status, serde_json::from_slice(&body).unwrap_or(Value::Null))
}

fn admin() -> (&'static str, String) {
    ("X-Admin-Key", TEST_ADMIN_KEY.to_string())
}

fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {}", token))
}

#[actix_rt::test]
async fn test_login_and_current_user() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;

    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": seed.owner_email.to_uppercase(), "password": TEST_PASSWORD }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["user"]["id"], seed.owner_id);
    assert!(body["user"].get("password_hash").is_none());

    let token = body["accessToken"].as_str().unwrap();
    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(bearer(token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let me: Value = test::read_body_json(resp).await;
    assert_eq!(me["user"]["name"], seed.owner_name.as_str());

    let (status, me) = admin_get(&app, "/api/auth/me").await;
    assert_eq!(status, 200);
    assert!(me["user"].is_null());
}

#[actix_rt::test]
async fn test_login_failures_look_the_same() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;

    let mut messages = Vec::new();
    for (email, password) in [
        (seed.owner_email.as_str(), "wrong-password"),
        ("nobody@example.com", TEST_PASSWORD),
    ] {
        let req = test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({ "email": email, "password": password }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
        let body: Value = test::read_body_json(resp).await;
        messages.push(body["message"].clone());
    }
    assert_eq!(messages[0], messages[1]);

    let req = test::TestRequest::get()
        .uri("/api/auth/me")
        .insert_header(bearer("not-a-token"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_rt::test]
async fn test_project_visibility() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;

    let owner = login(&app, &seed.owner_email).await;
    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{}", seed.project_id))
        .insert_header(bearer(&owner))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let detail: Value = test::read_body_json(resp).await;
    assert_eq!(detail["modules"].as_array().unwrap().len(), 2);

    let req = test::TestRequest::get()
        .uri("/api/projects")
        .insert_header(bearer(&owner))
        .to_request();
    let resp = test::call_service(&app, req).await;
    let projects: Value = test::read_body_json(resp).await;
    let projects = projects.as_array().unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0]["id"], seed.project_id);

    let outsider = login(&app, &seed.outsider_email).await;
    let req = test::TestRequest::get()
        .uri(&format!("/api/projects/{}", seed.project_id))
        .insert_header(bearer(&outsider))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let (status, _) = admin_get(&app, "/api/projects/999999999").await;
    assert_eq!(status, 404);
}

#[actix_rt::test]
async fn test_create_project_requires_manager() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;

    let name = unique("created");
    let body = json!({
        "name": name,
        "description": "created through the API",
        "modules": [{"name": "Api", "components": [{"name": "routes"}, {"name": "auth"}]}]
    });

    let owner = login(&app, &seed.owner_email).await;
    let (status, _) = post_json(&app, "/api/projects/add", bearer(&owner), body.clone()).await;
    assert_eq!(status, 403);

    let (status, detail) = post_json(&app, "/api/projects/add", admin(), body.clone()).await;
    assert_eq!(status, 201, "{}", detail);
    assert_eq!(detail["name"], name.as_str());
    assert_eq!(detail["modules"][0]["components"].as_array().unwrap().len(), 2);

    let (status, err) = post_json(&app, "/api/projects/add", admin(), body).await;
    assert_eq!(status, 400);
    assert_eq!(err["error"], "INVALID_INPUT");
}

#[actix_rt::test]
async fn test_user_management() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;

    let manager_email = format!("{}@example.com", unique("manager"));
    let (status, manager) = post_json(
        &app,
        "/api/users/add",
        admin(),
        json!({
            "fullName": unique("Manager"),
            "email": manager_email,
            "password": TEST_PASSWORD,
            "role": "manager",
            "projects": [seed.project_id]
        }),
    )
    .await;
    assert_eq!(status, 201, "{}", manager);
    assert_eq!(manager["role"], "manager");

    let manager_token = login(&app, &manager_email).await;

    // Managers cannot mint admins.
    let (status, _) = post_json(
        &app,
        "/api/users/add",
        bearer(&manager_token),
        json!({
            "fullName": "Would Be Admin",
            "email": format!("{}@example.com", unique("admin")),
            "password": TEST_PASSWORD,
            "role": "admin"
        }),
    )
    .await;
    assert_eq!(status, 403);

    let member_email = format!("{}@example.com", unique("member"));
    let member_request = json!({
        "fullName": unique("Member"),
        "email": member_email,
        "password": TEST_PASSWORD
    });
    let (status, member) =
        post_json(&app, "/api/users/add", bearer(&manager_token), member_request.clone()).await;
    assert_eq!(status, 201);
    assert_eq!(member["role"], "user");

    let (status, _) =
        post_json(&app, "/api/users/add", bearer(&manager_token), member_request).await;
    assert_eq!(status, 400);

    let (status, users) = admin_get(&app, "/api/users").await;
    assert_eq!(status, 200);
    assert!(users.as_array().unwrap().iter().any(|u| u["id"] == member["id"]));

    let member_token = login(&app, &member_email).await;
    let req = test::TestRequest::get()
        .uri("/api/users")
        .insert_header(bearer(&member_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 403);

    let manager_id = manager["id"].as_i64().unwrap();
    let req = test::TestRequest::delete()
        .uri(&format!("/api/users/{}", manager_id))
        .insert_header(bearer(&manager_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let member_id = member["id"].as_i64().unwrap();
    let req = test::TestRequest::delete()
        .uri(&format!("/api/users/{}", member_id))
        .insert_header(bearer(&manager_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 204);

    let req = test::TestRequest::delete()
        .uri(&format!("/api/users/{}", member_id))
        .insert_header(bearer(&manager_token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

async fn login_status<S>(app: &S, email: &str, password: &str) -> u16
where
    S: actix_web::dev::Service<
            actix_http::Request,
            Response = actix_web::dev::ServiceResponse,
            Error = actix_web::Error,
        >,
{
    let req = test::TestRequest::post()
        .uri("/api/auth/login")
        .set_json(json!({ "email": email, "password": password }))
        .to_request();
    test::call_service(app, req).await.status().as_u16()
}

#[actix_rt::test]
async fn test_profile_info_updates_own_allowed_columns() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;
    let token = login(&app, &seed.owner_email).await;

    let new_name = unique("Renamed");
    let (status, user) = post_json(
        &app,
        "/api/profile/info",
        bearer(&token),
        json!({
            "fullName": new_name,
            "phone": "+1 555 0100",
            "role": "admin",
            "password_hash": "plain"
        }),
    )
    .await;
    assert_eq!(status, 200, "{}", user);
    assert_eq!(user["id"], seed.owner_id);
    assert_eq!(user["name"], new_name.as_str());
    assert_eq!(user["phone"], "+1 555 0100");
    assert_eq!(user["role"], "user");
    assert_eq!(user["email"], seed.owner_email.as_str());

    let stored = env.pool.get_user(seed.owner_id).await.unwrap().unwrap();
    assert_eq!(stored.role, "user");
    assert_ne!(stored.password_hash, "plain");
    assert_eq!(login_status(&app, &seed.owner_email, TEST_PASSWORD).await, 200);

    let (status, err) = post_json(
        &app,
        "/api/profile/info",
        bearer(&token),
        json!({ "email": seed.outsider_email }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(err["error"], "INVALID_INPUT");

    let (status, _) = post_json(&app, "/api/profile/info", bearer(&token), json!({})).await;
    assert_eq!(status, 400);

    let (status, _) = post_json(
        &app,
        "/api/profile/info",
        admin(),
        json!({ "fullName": "Bootstrap" }),
    )
    .await;
    assert_eq!(status, 400);

    let req = test::TestRequest::post()
        .uri("/api/profile/info")
        .set_json(json!({ "fullName": "Anonymous" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_rt::test]
async fn test_profile_password_requires_current_password() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let seed = seed_project(&pool).await;
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;
    let token = login(&app, &seed.owner_email).await;
    let new_password = "rotated-pipeline-password";

    let (status, err) = post_json(
        &app,
        "/api/profile/password",
        bearer(&token),
        json!({ "oldPassword": "not-my-password", "newPassword": new_password }),
    )
    .await;
    assert_eq!(status, 401);
    assert_eq!(err["error"], "UNAUTHORIZED");

    let (status, _) = post_json(
        &app,
        "/api/profile/password",
        bearer(&token),
        json!({ "oldPassword": TEST_PASSWORD, "newPassword": "short" }),
    )
    .await;
    assert_eq!(status, 400);
    assert_eq!(login_status(&app, &seed.owner_email, TEST_PASSWORD).await, 200);

    let (status, _) = post_json(
        &app,
        "/api/profile/password",
        bearer(&token),
        json!({ "oldPassword": TEST_PASSWORD, "newPassword": new_password }),
    )
    .await;
    assert_eq!(status, 204);

    assert_eq!(login_status(&app, &seed.owner_email, TEST_PASSWORD).await, 401);
    assert_eq!(login_status(&app, &seed.owner_email, new_password).await, 200);

    let stored = env.pool.get_user(seed.owner_id).await.unwrap().unwrap();
    assert!(stored.password_hash.starts_with("$argon2id$"));
}

#[actix_rt::test]
async fn test_health_endpoints() {
    let Some(pool) = create_test_pool().await else {
        return;
    };
    let env = TestEnv::new(pool).await;
    let app = create_test_app(&env).await;

    let req = test::TestRequest::get().uri("/api/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    let req = test::TestRequest::get().uri("/api/ready").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}
