#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde_json::{json, Value};

use timetrack::auth::identity::{IdentityProvider, PasswordIdentityProvider};
use timetrack::config::{BootstrapConfig, Config, RetrySettings};
use timetrack::db::memory::MemoryStore;
use timetrack::db::Store;
use timetrack::services::UserContext;
use timetrack::state::{AppState, SharedState};

pub const ADMIN_EMAIL: &str = "admin@test.com";
pub const ADMIN_PASSWORD: &str = "password123";
pub const ADMIN_NAME: &str = "Admin";

/// A running test server backed by its own in-memory store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: SharedState,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Login and return the auth response body + status.
    pub async fn login(&self, email: &str, password: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url("/api/v1/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .expect("login request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Login and return the access token, asserting success.
    pub async fn token(&self, email: &str, password: &str) -> String {
        let (body, status) = self.login(email, password).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    /// Access token of the seeded default admin.
    pub async fn admin_token(&self) -> String {
        self.token(ADMIN_EMAIL, ADMIN_PASSWORD).await
    }

    /// Create a person as admin, return its id.
    pub async fn create_person(&self, admin_token: &str, name: &str, email: &str) -> i64 {
        let (body, status) = self
            .post_auth(
                "/api/v1/persons",
                admin_token,
                &json!({ "name": name, "email": email, "password": "password123" }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create person failed: {body}");
        body["id"].as_i64().unwrap()
    }

    /// Create a time record for the token's person, return (body, status).
    pub async fn create_record(
        &self,
        token: &str,
        start: &str,
        end: Option<&str>,
    ) -> (Value, StatusCode) {
        self.post_auth(
            "/api/v1/time-records",
            token,
            &json!({ "start_date_time": start, "end_date_time": end }),
        )
        .await
    }

    /// Make an authenticated GET request.
    pub async fn get_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("get request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated POST request with JSON body.
    pub async fn post_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("post request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated PUT request with JSON body.
    pub async fn put_auth(&self, path: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        let resp = self
            .client
            .put(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await
            .expect("put request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    /// Make an authenticated DELETE request.
    pub async fn delete_auth(&self, path: &str, token: &str) -> (Value, StatusCode) {
        let resp = self
            .client
            .delete(self.url(path))
            .bearer_auth(token)
            .send()
            .await
            .expect("delete request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: None,
        jwt_secret: "test-jwt-secret-that-is-long-enough".to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        token_ttl_minutes: 60,
        retry: fast_retry(),
        bootstrap: BootstrapConfig {
            company_name: "Test Company".to_string(),
            admin_name: ADMIN_NAME.to_string(),
            admin_email: ADMIN_EMAIL.to_string(),
            admin_password: ADMIN_PASSWORD.to_string(),
        },
        log_level: "warn".to_string(),
    }
}

/// Retries without sleeping so conflict paths stay fast.
pub fn fast_retry() -> RetrySettings {
    RetrySettings {
        max_retries: 2,
        delay: Duration::ZERO,
    }
}

/// A fresh in-memory store seeded with the company and the default admin.
pub async fn seeded_store() -> (Arc<dyn Store>, Arc<dyn IdentityProvider>) {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let identity: Arc<dyn IdentityProvider> = Arc::new(PasswordIdentityProvider::new());
    timetrack::seed::ensure_defaults(&store, &identity, &test_config().bootstrap)
        .await
        .expect("seeding failed");
    (store, identity)
}

/// Spawn a test app on a random port.
pub async fn spawn_app() -> TestApp {
    let (store, identity) = seeded_store().await;
    let state: SharedState = Arc::new(AppState::new(store, identity, test_config()));
    let app = timetrack::build_app(state.clone());

    // Bind to random port
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    // Spawn server in background
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        client,
        state,
    }
}

/// Fixed caller for driving services directly.
#[derive(Debug, Clone, Copy)]
pub struct TestCaller {
    pub person_id: i64,
    pub company_id: i64,
    pub is_admin: bool,
}

impl TestCaller {
    pub fn person(person_id: i64) -> Arc<dyn UserContext> {
        Arc::new(Self {
            person_id,
            company_id: 1,
            is_admin: false,
        })
    }

    pub fn admin(person_id: i64) -> Arc<dyn UserContext> {
        Arc::new(Self {
            person_id,
            company_id: 1,
            is_admin: true,
        })
    }
}

impl UserContext for TestCaller {
    fn person_id(&self) -> Option<i64> {
        Some(self.person_id)
    }

    fn company_id(&self) -> Option<i64> {
        Some(self.company_id)
    }

    fn is_admin(&self) -> bool {
        self.is_admin
    }
}
