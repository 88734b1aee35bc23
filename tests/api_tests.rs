mod common;

use reqwest::StatusCode;
use serde_json::json;

use common::{ADMIN_EMAIL, ADMIN_PASSWORD};

// ── Health ──────────────────────────────────────────────────────

#[tokio::test]
async fn health_returns_ok() {
    let app = common::spawn_app().await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(resp.text().await.unwrap(), "ok");
}

// ── Auth ────────────────────────────────────────────────────────

#[tokio::test]
async fn login_valid_credentials() {
    let app = common::spawn_app().await;

    let (body, status) = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].is_string());
    assert_eq!(body["token_type"], "Bearer");

    let token = body["access_token"].as_str().unwrap();
    let (me, status) = app.get_auth("/api/v1/auth/me", token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["person_id"], 1);
    assert_eq!(me["is_admin"], true);
}

#[tokio::test]
async fn login_invalid_credentials() {
    let app = common::spawn_app().await;

    let (_, status) = app.login(ADMIN_EMAIL, "wrongpassword").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, status) = app.login("nobody@test.com", ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn login_rate_limited_after_repeated_failures() {
    let app = common::spawn_app().await;

    for _ in 0..5 {
        let (_, status) = app.login(ADMIN_EMAIL, "wrongpassword").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    let (_, status) = app.login(ADMIN_EMAIL, ADMIN_PASSWORD).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn requests_without_token_are_unauthorized() {
    let app = common::spawn_app().await;

    let resp = app
        .client
        .get(app.url("/api/v1/time-records/own"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let (_, status) = app.get_auth("/api/v1/company", "not-a-token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

// ── Company ─────────────────────────────────────────────────────

#[tokio::test]
async fn company_read_by_all_updated_by_admin() {
    let app = common::spawn_app().await;
    let admin = app.admin_token().await;
    app.create_person(&admin, "Bob", "bob@test.com").await;
    let bob = app.token("bob@test.com", "password123").await;

    let (body, status) = app.get_auth("/api/v1/company", &bob).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Test Company");

    let (_, status) = app
        .put_auth("/api/v1/company", &bob, &json!({ "name": "Bob Inc" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (body, status) = app
        .put_auth("/api/v1/company", &admin, &json!({ "name": "Acme" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Acme");
}

// ── Persons ─────────────────────────────────────────────────────

#[tokio::test]
async fn persons_crud() {
    let app = common::spawn_app().await;
    let admin = app.admin_token().await;

    let bob_id = app.create_person(&admin, "Bob", "bob@test.com").await;
    let bob = app.token("bob@test.com", "password123").await;

    // Duplicate name, different case and padding
    let (body, status) = app
        .post_auth(
            "/api/v1/persons",
            &admin,
            &json!({ "name": " BOB ", "email": "bob2@test.com", "password": "password123" }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "PersonNameExists");

    // Only admins create persons
    let (_, status) = app
        .post_auth(
            "/api/v1/persons",
            &bob,
            &json!({ "name": "Eve", "email": "eve@test.com", "password": "password123" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Listing everyone is never allowed; listing the own company is
    let (_, status) = app.get_auth("/api/v1/persons", &admin).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (body, status) = app.get_auth("/api/v1/companies/1/persons", &bob).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (body, status) = app
        .get_auth(&format!("/api/v1/persons/{bob_id}"), &bob)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Bob");
    assert_eq!(body["is_default"], false);

    // Self rename
    let (_, status) = app
        .put_auth(
            &format!("/api/v1/persons/{bob_id}"),
            &bob,
            &json!({ "name": "Robert", "row_version": body["row_version"] }),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Admin cannot rename someone else
    let (_, status) = app
        .put_auth(
            &format!("/api/v1/persons/{bob_id}"),
            &admin,
            &json!({ "name": "Bobby" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, status) = app.get_auth("/api/v1/persons/999", &admin).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn default_person_cannot_be_deleted() {
    let app = common::spawn_app().await;
    let admin = app.admin_token().await;

    let (body, status) = app.delete_auth("/api/v1/persons/1", &admin).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "PersonDefault");
}

#[tokio::test]
async fn deleted_person_can_no_longer_login() {
    let app = common::spawn_app().await;
    let admin = app.admin_token().await;
    let bob_id = app.create_person(&admin, "Bob", "bob@test.com").await;
    let bob = app.token("bob@test.com", "password123").await;

    let (_, status) = app
        .delete_auth(&format!("/api/v1/persons/{bob_id}"), &bob)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, status) = app.login("bob@test.com", "password123").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, status) = app
        .delete_auth(&format!("/api/v1/persons/{bob_id}"), &bob)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

// ── Time records ────────────────────────────────────────────────

#[tokio::test]
async fn time_records_crud() {
    let app = common::spawn_app().await;
    let admin = app.admin_token().await;
    app.create_person(&admin, "Bob", "bob@test.com").await;
    let bob = app.token("bob@test.com", "password123").await;

    let (body, status) = app
        .create_record(&bob, "2024-01-01T08:00:00Z", Some("2024-01-01T15:00:00Z"))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = body["id"].as_i64().unwrap();

    let (body, status) = app
        .get_auth(&format!("/api/v1/time-records/own/{id}"), &bob)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["start_date_time"], "2024-01-01T08:00:00Z");
    assert_eq!(body["row_version"], 1);

    let (_, status) = app
        .put_auth(
            &format!("/api/v1/time-records/{id}"),
            &bob,
            &json!({
                "start_date_time": "2024-01-01T09:00:00Z",
                "end_date_time": "2024-01-01T15:00:00Z",
                "row_version": 1,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    // Same version again is stale now
    let (body, status) = app
        .put_auth(
            &format!("/api/v1/time-records/{id}"),
            &bob,
            &json!({
                "start_date_time": "2024-01-01T10:00:00Z",
                "end_date_time": null,
                "row_version": 1,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ConcurrencyConflict");

    let (body, status) = app
        .delete_auth(&format!("/api/v1/time-records/{id}?row_version=1"), &bob)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ConcurrencyConflict");

    let (_, status) = app
        .delete_auth(&format!("/api/v1/time-records/{id}?row_version=2"), &bob)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, status) = app
        .get_auth(&format!("/api/v1/time-records/own/{id}"), &bob)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn overlapping_records_conflict_per_person() {
    let app = common::spawn_app().await;
    let admin = app.admin_token().await;
    app.create_person(&admin, "Bob", "bob@test.com").await;
    let bob = app.token("bob@test.com", "password123").await;

    let (_, status) = app
        .create_record(&bob, "2024-01-01T08:00:00Z", Some("2024-01-01T15:00:00Z"))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (_, status) = app
        .create_record(&bob, "2024-01-02T08:00:00Z", Some("2024-01-02T15:00:00Z"))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (body, status) = app
        .create_record(&bob, "2024-01-01T09:00:00Z", Some("2024-01-01T16:00:00Z"))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "TimeRecordOverlappingExists");

    let (_, status) = app
        .create_record(&admin, "2024-01-01T09:00:00Z", Some("2024-01-01T16:00:00Z"))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, status) = app
        .create_record(&bob, "2024-01-01T15:00:00Z", Some("2024-01-01T18:00:00Z"))
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (body, status) = app
        .create_record(&bob, "2024-01-03T15:00:00Z", Some("2024-01-03T08:00:00Z"))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InvalidTimeRange");
}

#[tokio::test]
async fn records_of_others_are_hidden_or_forbidden() {
    let app = common::spawn_app().await;
    let admin = app.admin_token().await;
    app.create_person(&admin, "Bob", "bob@test.com").await;
    app.create_person(&admin, "Carol", "carol@test.com").await;
    let bob = app.token("bob@test.com", "password123").await;
    let carol = app.token("carol@test.com", "password123").await;

    let (body, _) = app
        .create_record(&bob, "2024-01-01T08:00:00Z", Some("2024-01-01T15:00:00Z"))
        .await;
    let id = body["id"].as_i64().unwrap();

    // Not found rather than forbidden, so ids cannot be probed
    let (_, status) = app
        .get_auth(&format!("/api/v1/time-records/own/{id}"), &carol)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, status) = app
        .get_auth(&format!("/api/v1/time-records/{id}"), &carol)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (body, status) = app
        .get_auth(&format!("/api/v1/time-records/{id}"), &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);

    let (_, status) = app
        .delete_auth(&format!("/api/v1/time-records/{id}?row_version=1"), &carol)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, status) = app
        .put_auth(
            &format!("/api/v1/time-records/{id}"),
            &carol,
            &json!({
                "start_date_time": "2024-01-01T09:00:00Z",
                "end_date_time": null,
                "row_version": 1,
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn time_records_are_paginated() {
    let app = common::spawn_app().await;
    let admin = app.admin_token().await;
    app.create_person(&admin, "Bob", "bob@test.com").await;
    let bob = app.token("bob@test.com", "password123").await;

    for day in 1..=3 {
        let (_, status) = app
            .create_record(
                &bob,
                &format!("2024-01-0{day}T08:00:00Z"),
                Some(format!("2024-01-0{day}T12:00:00Z").as_str()),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }
    let (_, status) = app
        .create_record(&admin, "2024-01-01T08:00:00Z", None)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (body, status) = app
        .get_auth("/api/v1/time-records/own?page_size=2&page_number=2", &bob)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_registers"], 3);
    assert_eq!(body["result"].as_array().unwrap().len(), 1);

    let (body, status) = app
        .get_auth("/api/v1/time-records?page_size=10&page_number=1", &admin)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total_registers"], 4);

    let (_, status) = app
        .get_auth("/api/v1/time-records?page_size=10&page_number=1", &bob)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (body, status) = app
        .get_auth("/api/v1/time-records/own?page_size=0", &bob)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "InvalidPagination");
}
