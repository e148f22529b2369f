//! Shared test helpers for API integration tests.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use dg_core::error::DomainError;
use dg_core::rng::DeterministicRng;
use dg_dispatch::memory::InMemoryStore;
use dg_dispatch::store::{Store, UnitOfWork};
use dg_test_support::{FixedClock, MockRng};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use dg_api::state::AppState;

/// A store whose every unit of work fails to open.
#[derive(Debug)]
pub struct FailingStore;

#[async_trait]
impl Store for FailingStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError> {
        Err(DomainError::Infrastructure("connection refused".into()))
    }
}

/// Build the full app over a fresh in-memory store with a fixed clock and
/// an RNG that always rolls 1.
pub fn build_test_app() -> Router {
    build_test_app_with(Arc::new(InMemoryStore::new()), MockRng)
}

/// Build the full app over the given store and RNG.
pub fn build_test_app_with(
    store: Arc<dyn Store>,
    rng: impl DeterministicRng + Send + 'static,
) -> Router {
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(rng));
    let app_state = AppState::new(store, Arc::new(FixedClock::default()), rng);
    dg_api::app(app_state)
}

/// Send a POST request with a JSON body and return the response.
pub async fn post_json(app: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(body).unwrap()))
        .unwrap();

    send(app, request).await
}

/// Send a GET request and return the response.
pub async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap();

    send(app, request).await
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}

/// Ids of a small table set up through the admin API: one DM, one player
/// with a patient standing in a location, and that patient's ghost.
pub struct Table {
    pub game_id: String,
    pub dm: String,
    pub player: String,
    pub region_id: String,
    pub location_id: String,
    pub patient_id: String,
    pub ghost_id: String,
}

fn id(json: &Value, key: &str) -> String {
    json[key].as_str().unwrap().to_owned()
}

/// Creates and starts a game through the admin and bot endpoints.
pub async fn setup_table(app: &Router) -> Table {
    let dm = uuid::Uuid::new_v4().to_string();
    let player = uuid::Uuid::new_v4().to_string();

    let (_, game) = post_json(
        app,
        "/api/admin/games",
        &json!({ "name": "Ward Seven", "created_by": dm }),
    )
    .await;
    let game_id = id(&game, "game_id");
    post_json(
        app,
        &format!("/api/admin/games/{game_id}/players"),
        &json!({ "player_id": player }),
    )
    .await;
    let (_, region) = post_json(
        app,
        &format!("/api/admin/games/{game_id}/regions"),
        &json!({ "code": "A", "name": "East Wing" }),
    )
    .await;
    let region_id = id(&region, "region_id");
    let (_, location) = post_json(
        app,
        &format!("/api/admin/regions/{region_id}/locations"),
        &json!({ "name": "Ward Lobby" }),
    )
    .await;
    let location_id = id(&location, "location_id");
    let (_, patient) = post_json(
        app,
        "/api/admin/characters/patient",
        &json!({
            "player_id": player,
            "game_id": game_id,
            "name": "Ada",
            "soul_color": "C",
            "personality_archives": { "C": "keeps every letter", "K": "fears the dark" },
            "current_location_id": location_id,
        }),
    )
    .await;
    let patient_id = id(&patient, "patient_id");
    let (_, ghost) = post_json(
        app,
        "/api/admin/characters/ghost",
        &json!({
            "game_id": game_id,
            "patient_id": patient_id,
            "creator_player_id": player,
            "name": "Echo",
            "print_abilities": [{ "name": "Glint", "color": "C", "ability_count": 2 }],
        }),
    )
    .await;
    let ghost_id = id(&ghost, "ghost_id");

    post_json(
        app,
        "/api/bot/events",
        &json!({ "game_id": game_id, "player_id": dm, "payload": { "event_type": "game_start" } }),
    )
    .await;

    Table {
        game_id,
        dm,
        player,
        region_id,
        location_id,
        patient_id,
        ghost_id,
    }
}
