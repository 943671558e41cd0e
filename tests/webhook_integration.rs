// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Jellyfin webhook tests.

use axum::http::StatusCode;
use serde_json::json;
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

mod common;
use common::{body_json, json_request};

const WEBHOOK: &str = "/webhook/jellyfin/test_jellyfin_secret";

fn playback_stop(username: &str, episode: &str, completed: &str) -> serde_json::Value {
    json!({
        "NotificationType": "PlaybackStop",
        "ItemType": "Episode",
        "NotificationUsername": username,
        "SeriesName": "Fullmetal Alchemist: Brotherhood",
        "EpisodeNumber": episode,
        "Provider_myanimelist": "5114",
        "PlayedToCompletion": completed
    })
}

async fn mount_anime(server: &MockServer, watched: u32) {
    Mock::given(method("GET"))
        .and(path("/v2/anime/5114"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 5114,
            "title": "Fullmetal Alchemist: Brotherhood",
            "num_episodes": 64,
            "my_list_status": {
                "status": "watching",
                "num_episodes_watched": watched
            }
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_wrong_secret_is_not_found() {
    let server = MockServer::start().await;
    let (app, _state) = common::create_test_app(&server);

    let response = app
        .oneshot(json_request(
            "POST",
            "/webhook/jellyfin/wrong",
            playback_stop("alice", "3", "True"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_disabled_without_secret() {
    let server = MockServer::start().await;
    let mut config = common::test_config(&server);
    config.jellyfin_webhook_secret = None;
    let (app, _state) = common::create_test_app_with_config(config);

    let response = app
        .oneshot(json_request("POST", WEBHOOK, playback_stop("alice", "3", "True")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_finished_episode_updates_mal() {
    let server = MockServer::start().await;
    let (app, state) = common::create_test_app(&server);
    common::seed_authorized_user(&state, "alice").await;
    mount_anime(&server, 2).await;

    Mock::given(method("PATCH"))
        .and(path("/v2/anime/5114/my_list_status"))
        .and(body_string_contains("status=watching"))
        .and(body_string_contains("num_watched_episodes=3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let response = app
        .oneshot(json_request("POST", WEBHOOK, playback_stop("alice", "3", "True")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        body_json(response).await,
        json!({"action": "updated", "status": "watching", "watched": 3})
    );
}

#[tokio::test]
async fn test_last_episode_completes_entry() {
    let server = MockServer::start().await;
    let (app, state) = common::create_test_app(&server);
    common::seed_authorized_user(&state, "alice").await;
    mount_anime(&server, 63).await;

    Mock::given(method("PATCH"))
        .and(path("/v2/anime/5114/my_list_status"))
        .and(body_string_contains("status=completed"))
        .and(body_string_contains("num_watched_episodes=64"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let response = app
        .oneshot(json_request("POST", WEBHOOK, playback_stop("alice", "64", "True")))
        .await
        .unwrap();

    assert_eq!(body_json(response).await["action"], "updated");
}

#[tokio::test]
async fn test_rewatch_does_not_move_count_backwards() {
    let server = MockServer::start().await;
    let (app, state) = common::create_test_app(&server);
    common::seed_authorized_user(&state, "alice").await;
    mount_anime(&server, 10).await;

    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let response = app
        .oneshot(json_request("POST", WEBHOOK, playback_stop("alice", "4", "True")))
        .await
        .unwrap();

    assert_eq!(
        body_json(response).await,
        json!({"action": "already_watched", "watched": 10})
    );
}

#[tokio::test]
async fn test_unfinished_playback_is_ignored() {
    let server = MockServer::start().await;
    let (app, state) = common::create_test_app(&server);
    common::seed_authorized_user(&state, "alice").await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let response = app
        .oneshot(json_request("POST", WEBHOOK, playback_stop("alice", "3", "False")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({"action": "ignored"}));
}

#[tokio::test]
async fn test_jellyfin_user_is_mapped() {
    let server = MockServer::start().await;
    let mut config = common::test_config(&server);
    config
        .jellyfin_user_map
        .insert("Living Room".to_string(), "alice".to_string());
    let (app, state) = common::create_test_app_with_config(config);
    common::seed_authorized_user(&state, "alice").await;
    mount_anime(&server, 0).await;

    Mock::given(method("PATCH"))
        .and(path("/v2/anime/5114/my_list_status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let response = app
        .oneshot(json_request(
            "POST",
            WEBHOOK,
            playback_stop("Living Room", "1", "True"),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unauthorized_user_gets_401() {
    let server = MockServer::start().await;
    let (app, state) = common::create_test_app(&server);
    common::seed_user(&state, "alice", None, None, None).await;

    let response = app
        .oneshot(json_request("POST", WEBHOOK, playback_stop("alice", "3", "True")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
