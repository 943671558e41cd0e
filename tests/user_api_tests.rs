// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! User registration, token update, and stats endpoint tests.

use axum::http::StatusCode;
use paisen::models::LibraryEntry;
use serde_json::json;
use tower::ServiceExt;
use wiremock::MockServer;

mod common;
use common::{body_json, get, json_request};

fn library_entry(username: &str, id: u64, title: &str, status: &str, score: u8) -> LibraryEntry {
    LibraryEntry {
        username: username.to_string(),
        anime_id: id,
        title: title.to_string(),
        status: status.to_string(),
        score,
        num_episodes_watched: 12,
        num_episodes: 12,
        picture: None,
        mal_updated_at: "2025-01-01T00:00:00+00:00".to_string(),
        synced_at: "2025-01-02T00:00:00Z".to_string(),
    }
}

#[tokio::test]
async fn test_health() {
    let server = MockServer::start().await;
    let (app, _state) = common::create_test_app(&server);

    let response = app.oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "no-store"
    );
    assert_eq!(
        response.headers().get("x-content-type-options").unwrap(),
        "nosniff"
    );
    assert_eq!(body_json(response).await["status"], "ok");
}

#[tokio::test]
async fn test_register_user() {
    let server = MockServer::start().await;
    let (app, state) = common::create_test_app(&server);

    let response = app
        .clone()
        .oneshot(json_request("POST", "/api/user/register", json!({"username": "alice"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["username"], "alice");
    assert_eq!(body["authorized"], false);

    assert!(state.store.get_user("alice").await.unwrap().is_some());

    let response = app
        .oneshot(json_request("POST", "/api/user/register", json!({"username": "alice"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_register_invalid_username() {
    let server = MockServer::start().await;
    let (app, _state) = common::create_test_app(&server);

    for username in ["a", "has space", "pipe|name", "seventeen_chars_x"] {
        let response = app
            .clone()
            .oneshot(json_request("POST", "/api/user/register", json!({"username": username})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", username);
    }
}

#[tokio::test]
async fn test_update_user_never_echoes_tokens() {
    let server = MockServer::start().await;
    let (app, state) = common::create_test_app(&server);
    common::seed_user(&state, "alice", None, None, None).await;

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/user/update",
            json!({
                "username": "alice",
                "accessToken": "secret_access",
                "refreshToken": "secret_refresh",
                "tokenType": "Bearer",
                "expiryTime": 1_900_000_000_000_i64
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["authorized"], true);
    assert_eq!(body["tokenType"], "Bearer");
    assert_eq!(body["expiryTime"], 1_900_000_000_000_i64);

    let text = body.to_string();
    assert!(!text.contains("secret_access"));
    assert!(!text.contains("secret_refresh"));

    let record = state.store.get_user("alice").await.unwrap().unwrap();
    assert_eq!(record.access_token.as_deref(), Some("secret_access"));
}

#[tokio::test]
async fn test_update_user_partial_keeps_other_fields() {
    let server = MockServer::start().await;
    let (app, state) = common::create_test_app(&server);
    common::seed_user(&state, "alice", Some("acc"), Some("ref"), Some(1_000)).await;

    let response = app
        .oneshot(json_request(
            "PUT",
            "/api/user/update",
            json!({"username": "alice", "codeChallenge": "challenge"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let record = state.store.get_user("alice").await.unwrap().unwrap();
    assert_eq!(record.code_challenge.as_deref(), Some("challenge"));
    assert_eq!(record.access_token.as_deref(), Some("acc"));
    assert_eq!(record.expiry_time, Some(1_000));
}

#[tokio::test]
async fn test_update_user_failures_are_bad_request() {
    let server = MockServer::start().await;
    let (app, state) = common::create_test_app(&server);
    common::seed_user(&state, "alice", None, None, None).await;

    let unknown = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/user/update",
            json!({"username": "nobody", "accessToken": "x"}),
        ))
        .await
        .unwrap();
    assert_eq!(unknown.status(), StatusCode::BAD_REQUEST);

    let empty_token = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/api/user/update",
            json!({"username": "alice", "accessToken": ""}),
        ))
        .await
        .unwrap();
    assert_eq!(empty_token.status(), StatusCode::BAD_REQUEST);

    let negative_expiry = app
        .oneshot(json_request(
            "PUT",
            "/api/user/update",
            json!({"username": "alice", "expiryTime": -5}),
        ))
        .await
        .unwrap();
    assert_eq!(negative_expiry.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_stats_from_library() {
    let server = MockServer::start().await;
    let (app, state) = common::create_test_app(&server);
    common::seed_user(&state, "alice", None, None, None).await;
    common::seed_user(&state, "bob", None, None, None).await;

    for entry in [
        library_entry("alice", 1, "Cowboy Bebop", "completed", 10),
        library_entry("alice", 2, "Akira", "completed", 8),
        library_entry("alice", 3, "Monster", "watching", 0),
        library_entry("bob", 4, "Naruto", "dropped", 3),
    ] {
        state.store.upsert_library_entry(&entry).await.unwrap();
    }

    let response = app
        .oneshot(get("/api/anime/stats?username=alice"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let titles: Vec<&str> = body["entries"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Akira", "Cowboy Bebop", "Monster"]);

    assert_eq!(body["summary"]["totalEntries"], 3);
    assert_eq!(body["summary"]["byStatus"]["completed"], 2);
    assert_eq!(body["summary"]["meanScore"], 9.0);
    assert_eq!(body["summary"]["episodesWatched"], 36);
}

#[tokio::test]
async fn test_stats_unknown_user() {
    let server = MockServer::start().await;
    let (app, _state) = common::create_test_app(&server);

    let response = app
        .oneshot(get("/api/anime/stats?username=nobody"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "not_found");
}
