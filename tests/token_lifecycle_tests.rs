// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token validity check and refresh tests.

use axum::http::StatusCode;
use paisen::services::TokenStatus;
use paisen::time_utils::now_millis;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{body_json, get, seed_user, token_body};

#[tokio::test]
async fn test_valid_token_makes_no_network_call() {
    let server = MockServer::start().await;
    let (_app, state) = common::create_test_app(&server);
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let expiry = now_millis() + 60_000;
    seed_user(&state, "alice", Some("acc"), Some("ref"), Some(expiry)).await;

    let check = state.mal_service.ensure_valid_token("alice").await.unwrap();
    assert_eq!(check.status, TokenStatus::Valid);
    assert_eq!(check.record.expiry_time, Some(expiry));
}

#[tokio::test]
async fn test_expired_without_refresh_token_needs_authorization() {
    let server = MockServer::start().await;
    let (_app, state) = common::create_test_app(&server);
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    seed_user(&state, "alice", Some("acc"), None, Some(now_millis() - 1)).await;

    let check = state.mal_service.ensure_valid_token("alice").await.unwrap();
    assert_eq!(check.status, TokenStatus::NeedsAuthorization);
}

#[tokio::test]
async fn test_never_authorized_needs_authorization() {
    let server = MockServer::start().await;
    let (_app, state) = common::create_test_app(&server);
    seed_user(&state, "alice", None, None, None).await;

    let check = state.mal_service.ensure_valid_token("alice").await.unwrap();
    assert_eq!(check.status, TokenStatus::NeedsAuthorization);
}

#[tokio::test]
async fn test_expired_token_is_refreshed() {
    let server = MockServer::start().await;
    let (_app, state) = common::create_test_app(&server);

    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old_refresh"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(token_body("new_acc", "new_refresh", 3600)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let old_expiry = now_millis() - 1_000;
    seed_user(&state, "alice", Some("old_acc"), Some("old_refresh"), Some(old_expiry)).await;

    let check = state.mal_service.ensure_valid_token("alice").await.unwrap();
    assert_eq!(check.status, TokenStatus::Refreshed);

    let record = state.store.get_user("alice").await.unwrap().unwrap();
    assert_eq!(record.access_token.as_deref(), Some("new_acc"));
    assert_eq!(record.refresh_token.as_deref(), Some("new_refresh"));
    assert!(record.expiry_time.unwrap() > old_expiry);
    assert!(record.expiry_time.unwrap() > now_millis());
}

#[tokio::test]
async fn test_failed_refresh_keeps_stored_tokens() {
    let server = MockServer::start().await;
    let (_app, state) = common::create_test_app(&server);

    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_grant"
        })))
        .mount(&server)
        .await;

    let old_expiry = now_millis() - 1_000;
    seed_user(&state, "alice", Some("old_acc"), Some("old_refresh"), Some(old_expiry)).await;
    let before = state.store.get_user("alice").await.unwrap().unwrap();

    let check = state.mal_service.ensure_valid_token("alice").await.unwrap();
    assert_eq!(check.status, TokenStatus::RefreshFailed);

    let after = state.store.get_user("alice").await.unwrap().unwrap();
    assert_eq!(after, before);
}

#[tokio::test]
async fn test_concurrent_checks_refresh_once() {
    let server = MockServer::start().await;
    let (_app, state) = common::create_test_app(&server);

    Mock::given(method("POST"))
        .and(path("/v1/oauth2/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("new_acc", "new_refresh", 3600))
                .set_delay(std::time::Duration::from_millis(50)),
        )
        .expect(1)
        .mount(&server)
        .await;

    seed_user(&state, "alice", Some("old"), Some("old_refresh"), Some(now_millis() - 1)).await;

    let mut handles = vec![];
    for _ in 0..5 {
        let state = state.clone();
        handles.push(tokio::spawn(async move {
            state.mal_service.ensure_valid_token("alice").await.unwrap()
        }));
    }
    for handle in handles {
        let check = handle.await.expect("Task join failed");
        assert!(check.status.is_usable());
        assert_eq!(check.record.access_token.as_deref(), Some("new_acc"));
    }
}

#[tokio::test]
async fn test_token_status_endpoint() {
    let server = MockServer::start().await;
    let (app, state) = common::create_test_app(&server);
    seed_user(&state, "alice", None, None, None).await;

    let response = app
        .clone()
        .oneshot(get("/api/user/alice/token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "needs_authorization");
    assert!(body["expiryTime"].is_null());
    assert!(body["message"].is_string());

    let response = app.oneshot(get("/api/user/nobody/token")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_anime_list_requires_authorization() {
    let server = MockServer::start().await;
    let (app, state) = common::create_test_app(&server);
    seed_user(&state, "alice", Some("acc"), None, Some(now_millis() - 1)).await;

    let response = app
        .oneshot(get("/api/anime/list?username=alice"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_anime_list_rejected_token_requires_authorization() {
    let server = MockServer::start().await;
    let (app, state) = common::create_test_app(&server);
    common::seed_authorized_user(&state, "alice").await;

    Mock::given(method("GET"))
        .and(path("/v2/users/@me/animelist"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let response = app
        .oneshot(get("/api/anime/list?username=alice"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
