//! Routes used by the chat bot: event submission and read-only views.

use axum::extract::{Path, Query, State};
use axum::{
    Json, Router,
    routing::{get, post},
};
use dg_core::timeline::{Page, TimelineEvent};
use dg_dispatch::application::query_handlers::{self, GameSummary, SessionInfo};
use dg_dispatch::domain::events::{DispatchResult, GameEvent};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

const GAME_TIMELINE_DEFAULT_LIMIT: i64 = 100;
const SESSION_TIMELINE_DEFAULT_LIMIT: i64 = 50;

/// Query string for timeline endpoints.
#[derive(Debug, Deserialize)]
pub struct TimelineQuery {
    /// Page size.
    pub limit: Option<i64>,
    /// Entries to skip.
    pub offset: Option<i64>,
}

impl TimelineQuery {
    fn page(&self, default_limit: i64) -> Result<Page, ApiError> {
        Ok(Page::new(
            self.limit.unwrap_or(default_limit),
            self.offset.unwrap_or(0),
        )?)
    }
}

/// Response body for GET /games/{game_id}/timeline.
#[derive(Debug, Serialize)]
pub struct GameTimelineResponse {
    /// The game.
    pub game_id: Uuid,
    /// Entries in commit order.
    pub events: Vec<TimelineEvent>,
}

/// Response body for GET /sessions/{session_id}/timeline.
#[derive(Debug, Serialize)]
pub struct SessionTimelineResponse {
    /// The session.
    pub session_id: Uuid,
    /// Entries ordered by seq.
    pub events: Vec<TimelineEvent>,
}

/// POST /events
#[instrument(skip(state, event), fields(game_id = %event.game_id))]
async fn submit_event(
    State(state): State<AppState>,
    Json(event): Json<GameEvent>,
) -> Result<Json<DispatchResult>, ApiError> {
    Ok(Json(state.dispatcher.dispatch(event).await?))
}

/// GET /games/{game_id}
#[instrument(skip(state))]
async fn get_game(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
) -> Result<Json<GameSummary>, ApiError> {
    Ok(Json(
        query_handlers::get_game_summary(&*state.store, game_id).await?,
    ))
}

/// GET /games/{game_id}/timeline
#[instrument(skip(state, query))]
async fn get_game_timeline(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<GameTimelineResponse>, ApiError> {
    let page = query.page(GAME_TIMELINE_DEFAULT_LIMIT)?;
    let events = query_handlers::get_game_timeline(&*state.store, game_id, page).await?;
    Ok(Json(GameTimelineResponse { game_id, events }))
}

/// GET /sessions/{session_id}
#[instrument(skip(state))]
async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionInfo>, ApiError> {
    Ok(Json(
        query_handlers::get_session_info(&*state.store, session_id).await?,
    ))
}

/// GET /sessions/{session_id}/timeline
#[instrument(skip(state, query))]
async fn get_session_timeline(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<SessionTimelineResponse>, ApiError> {
    let page = query.page(SESSION_TIMELINE_DEFAULT_LIMIT)?;
    let events = query_handlers::get_session_timeline(&*state.store, session_id, page).await?;
    Ok(Json(SessionTimelineResponse { session_id, events }))
}

/// Returns the bot router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", post(submit_event))
        .route("/games/{game_id}", get(get_game))
        .route("/games/{game_id}/timeline", get(get_game_timeline))
        .route("/sessions/{session_id}", get(get_session))
        .route("/sessions/{session_id}/timeline", get(get_session_timeline))
}
