// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::Request;
use paisen::config::Config;
use paisen::db::{FirestoreDb, MemoryDb, Store};
use paisen::models::UserTokenUpdate;
use paisen::routes::create_router;
use paisen::time_utils::now_millis;
use paisen::AppState;
use std::sync::Arc;
use wiremock::MockServer;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Test config with every provider endpoint on `server`.
#[allow(dead_code)]
pub fn test_config(server: &MockServer) -> Config {
    Config::test_default().with_provider_base(&server.uri())
}

/// Create a test app over the in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app(server: &MockServer) -> (axum::Router, Arc<AppState>) {
    create_test_app_with_config(test_config(server))
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> (axum::Router, Arc<AppState>) {
    let store: Arc<dyn Store> = Arc::new(MemoryDb::new());
    let state = Arc::new(AppState::new(config, store).expect("Failed to build app state"));
    (create_router(state.clone()), state)
}

/// Register `username` with the given token material.
#[allow(dead_code)]
pub async fn seed_user(
    state: &AppState,
    username: &str,
    access_token: Option<&str>,
    refresh_token: Option<&str>,
    expiry_time: Option<i64>,
) {
    state
        .store
        .create_user(username)
        .await
        .expect("Failed to create user");
    state
        .store
        .update_user(
            username,
            &UserTokenUpdate {
                access_token: access_token.map(str::to_string),
                refresh_token: refresh_token.map(str::to_string),
                token_type: access_token.map(|_| "Bearer".to_string()),
                expiry_time,
                ..Default::default()
            },
        )
        .await
        .expect("Failed to seed tokens");
}

/// A user whose access token is good for another hour.
#[allow(dead_code)]
pub async fn seed_authorized_user(state: &AppState, username: &str) {
    seed_user(
        state,
        username,
        Some("valid_access"),
        Some("valid_refresh"),
        Some(now_millis() + 3_600_000),
    )
    .await;
}

/// Token endpoint success body.
#[allow(dead_code)]
pub fn token_body(access: &str, refresh: &str, expires_in: u64) -> serde_json::Value {
    serde_json::json!({
        "token_type": "Bearer",
        "access_token": access,
        "refresh_token": refresh,
        "expires_in": expires_in,
    })
}

#[allow(dead_code)]
pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[allow(dead_code)]
pub async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
