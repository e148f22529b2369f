//! Integration tests for the bot endpoints.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use dg_test_support::MockRng;
use serde_json::{Value, json};

async fn start_session(app: &axum::Router, table: &common::Table) -> String {
    let (status, json) = common::post_json(
        app,
        "/api/bot/events",
        &json!({
            "game_id": table.game_id,
            "player_id": table.dm,
            "payload": { "event_type": "session_start", "location_id": table.location_id },
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["data"]["session_id"].as_str().unwrap().to_owned()
}

async fn skill_check(app: &axum::Router, table: &common::Table, session_id: &str) -> Value {
    let (status, json) = common::post_json(
        app,
        "/api/bot/events",
        &json!({
            "game_id": table.game_id,
            "session_id": session_id,
            "player_id": table.player,
            "payload": {
                "event_type": "skill_check",
                "difficulty": 2,
                "color": "C",
                "ghost_id": table.ghost_id,
            },
            "narrative": "Ada squints at the letter.",
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json
}

#[tokio::test]
async fn test_session_start_enrols_patients_at_the_location() {
    // Arrange
    let app = common::build_test_app();
    let table = common::setup_table(&app).await;

    // Act
    let session_id = start_session(&app, &table).await;
    let (status, json) =
        common::get_json(&app, &format!("/api/bot/sessions/{session_id}")).await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "active");
    assert_eq!(json["location_id"], table.location_id);
    assert_eq!(json["region_id"], table.region_id);
    assert_eq!(json["players"][0]["patient_id"], table.patient_id);
    assert_eq!(json["players"][0]["name"], "Ada");
}

#[tokio::test]
async fn test_skill_check_adds_the_ghost_channel() {
    // Arrange
    let app = common::build_test_app();
    let table = common::setup_table(&app).await;
    let session_id = start_session(&app, &table).await;

    // Act
    let json = skill_check(&app, &table, &session_id).await;

    // Assert
    assert_eq!(json["success"], true);
    assert_eq!(json["event_type"], "skill_check");
    assert_eq!(json["rolls"], json!([1]));
    assert_eq!(json["data"]["roll_total"], 2);
    assert_eq!(json["data"]["check_success"], true);
    assert_eq!(json["narrative"], "Ada squints at the letter.");
}

#[tokio::test]
async fn test_session_timeline_pages_by_seq() {
    // Arrange
    let app = common::build_test_app();
    let table = common::setup_table(&app).await;
    let session_id = start_session(&app, &table).await;
    skill_check(&app, &table, &session_id).await;
    skill_check(&app, &table, &session_id).await;

    // Act
    let (status, json) = common::get_json(
        &app,
        &format!("/api/bot/sessions/{session_id}/timeline?limit=2&offset=1"),
    )
    .await;

    // Assert
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["session_id"], session_id);
    let seqs: Vec<i64> = json["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["seq"].as_i64().unwrap())
        .collect();
    assert_eq!(seqs, vec![2, 3]);
    assert_eq!(json["events"][0]["event_type"], "skill_check");
}

#[tokio::test]
async fn test_game_timeline_holds_game_scoped_events() {
    let app = common::build_test_app();
    let table = common::setup_table(&app).await;

    let (status, json) =
        common::get_json(&app, &format!("/api/bot/games/{}/timeline", table.game_id)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["events"][0]["event_type"], "game_start");
    assert_eq!(json["events"][0]["seq"], 1);
}

#[tokio::test]
async fn test_game_summary_lists_players_and_sessions() {
    let app = common::build_test_app();
    let table = common::setup_table(&app).await;
    let session_id = start_session(&app, &table).await;

    let (status, json) =
        common::get_json(&app, &format!("/api/bot/games/{}", table.game_id)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "active");
    assert_eq!(json["players"].as_array().unwrap().len(), 2);
    assert_eq!(json["active_sessions"][0]["session_id"], session_id);
}

#[tokio::test]
async fn test_unknown_event_type_returns_400() {
    let app = common::build_test_app();
    let table = common::setup_table(&app).await;

    let (status, json) = common::post_json(
        &app,
        "/api/bot/events",
        &json!({
            "game_id": table.game_id,
            "player_id": table.dm,
            "payload": { "event_type": "teleport" },
        }),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "unsupported_event");
}

#[tokio::test]
async fn test_event_without_actor_returns_401() {
    let app = common::build_test_app();
    let table = common::setup_table(&app).await;

    let (status, json) = common::post_json(
        &app,
        "/api/bot/events",
        &json!({ "game_id": table.game_id, "payload": { "event_type": "game_pause" } }),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["error"], "unauthorized");
}

#[tokio::test]
async fn test_player_cannot_submit_dm_events() {
    let app = common::build_test_app();
    let table = common::setup_table(&app).await;

    let (status, json) = common::post_json(
        &app,
        "/api/bot/events",
        &json!({
            "game_id": table.game_id,
            "player_id": table.player,
            "payload": { "event_type": "session_start" },
        }),
    )
    .await;

    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "forbidden");
}

#[tokio::test]
async fn test_second_session_on_a_held_scope_returns_409() {
    let app = common::build_test_app();
    let table = common::setup_table(&app).await;
    start_session(&app, &table).await;

    let (status, json) = common::post_json(
        &app,
        "/api/bot/events",
        &json!({
            "game_id": table.game_id,
            "player_id": table.dm,
            "payload": { "event_type": "session_start", "region_id": table.region_id },
        }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");
}

#[tokio::test]
async fn test_ending_a_game_twice_returns_409() {
    let app = common::build_test_app();
    let table = common::setup_table(&app).await;
    let end = json!({
        "game_id": table.game_id,
        "player_id": table.dm,
        "payload": { "event_type": "game_end" },
    });
    let (status, _) = common::post_json(&app, "/api/bot/events", &end).await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = common::post_json(&app, "/api/bot/events", &end).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "invalid_transition");
}

#[tokio::test]
async fn test_negative_timeline_limit_returns_400() {
    let app = common::build_test_app();
    let table = common::setup_table(&app).await;

    let (status, json) = common::get_json(
        &app,
        &format!("/api/bot/games/{}/timeline?limit=-1", table.game_id),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_unknown_game_returns_404() {
    let app = common::build_test_app();

    let (status, json) = common::get_json(
        &app,
        &format!("/api/bot/games/{}", uuid::Uuid::new_v4()),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "not_found");
}

#[tokio::test]
async fn test_unknown_session_timeline_returns_404() {
    let app = common::build_test_app();

    let (status, _) = common::get_json(
        &app,
        &format!("/api/bot/sessions/{}/timeline", uuid::Uuid::new_v4()),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_store_failure_returns_500() {
    let app = common::build_test_app_with(Arc::new(common::FailingStore), MockRng);

    let (status, json) = common::post_json(
        &app,
        "/api/bot/events",
        &json!({
            "game_id": uuid::Uuid::new_v4(),
            "player_id": uuid::Uuid::new_v4(),
            "payload": { "event_type": "game_start" },
        }),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["error"], "infrastructure_error");
}
