//! Read-side queries.

use chrono::{DateTime, Utc};
use dg_character::domain::aggregates::{Archives, GhostView};
use dg_core::color::SoulColor;
use dg_core::error::DomainError;
use dg_core::timeline::{Page, TimelineEvent};
use dg_game::domain::aggregates::{GameStatus, Location, PlayerRole, Region};
use dg_session::domain::aggregates::SessionStatus;
use serde::Serialize;
use uuid::Uuid;

use crate::store::Store;

/// A participant as shown in the game summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlayerSummary {
    /// The user.
    pub user_id: Uuid,
    /// DM or PL.
    pub role: PlayerRole,
    /// The patient the user currently plays.
    pub active_patient_id: Option<Uuid>,
}

/// A session as listed in the game summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSummary {
    /// Session identifier.
    pub session_id: Uuid,
    /// Active or paused.
    pub status: SessionStatus,
    /// Region scope.
    pub region_id: Option<Uuid>,
    /// Location scope.
    pub location_id: Option<Uuid>,
}

/// Game overview.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GameSummary {
    /// Game identifier.
    pub game_id: Uuid,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Rules configuration blob.
    pub config: Option<serde_json::Value>,
    /// Participants in join order.
    pub players: Vec<PlayerSummary>,
    /// Sessions that currently hold a scope.
    pub active_sessions: Vec<SessionSummary>,
}

/// Returns the game overview.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown game.
pub async fn get_game_summary(store: &dyn Store, game_id: Uuid) -> Result<GameSummary, DomainError> {
    let mut uow = store.begin().await?;
    let game = uow
        .find_game(game_id)
        .await?
        .ok_or_else(|| DomainError::not_found("game", game_id))?;
    let players = uow
        .game_players(game_id)
        .await?
        .into_iter()
        .map(|p| PlayerSummary {
            user_id: p.user_id,
            role: p.role,
            active_patient_id: p.active_patient_id,
        })
        .collect();
    let active_sessions = uow
        .holding_sessions(game_id)
        .await?
        .into_iter()
        .map(|s| SessionSummary {
            session_id: s.id,
            status: s.status,
            region_id: s.scope.region_id(),
            location_id: s.scope.location_id(),
        })
        .collect();
    uow.rollback().await?;

    Ok(GameSummary {
        game_id: game.id,
        name: game.name,
        status: game.status,
        config: game.config,
        players,
        active_sessions,
    })
}

/// An enrolled patient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RosterEntry {
    /// The patient.
    pub patient_id: Uuid,
    /// Patient name.
    pub name: String,
    /// When they joined the session.
    pub joined_at: DateTime<Utc>,
}

/// An open event definition. The target total is not shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OpenEvent {
    /// Definition identifier.
    pub event_def_id: Uuid,
    /// Display name.
    pub name: String,
    /// Dice expression.
    pub expression: String,
    /// Color restriction.
    pub color_restriction: Option<SoulColor>,
}

/// Session status with its roster and open events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionInfo {
    /// Session identifier.
    pub session_id: Uuid,
    /// Owning game.
    pub game_id: Uuid,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Region scope.
    pub region_id: Option<Uuid>,
    /// Location scope.
    pub location_id: Option<Uuid>,
    /// Start timestamp.
    pub started_at: DateTime<Utc>,
    /// End timestamp.
    pub ended_at: Option<DateTime<Utc>>,
    /// Enrolled patients.
    pub players: Vec<RosterEntry>,
    /// Event definitions still accepting checks.
    pub active_events: Vec<OpenEvent>,
}

/// Returns a session's status, roster and open events.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown session.
pub async fn get_session_info(
    store: &dyn Store,
    session_id: Uuid,
) -> Result<SessionInfo, DomainError> {
    let mut uow = store.begin().await?;
    let session = uow
        .find_session(session_id)
        .await?
        .ok_or_else(|| DomainError::not_found("session", session_id))?;

    let mut players = Vec::new();
    for entry in uow.session_players(session_id).await? {
        let name = uow
            .find_patient(entry.patient_id)
            .await?
            .map(|p| p.name)
            .unwrap_or_default();
        players.push(RosterEntry {
            patient_id: entry.patient_id,
            name,
            joined_at: entry.joined_at,
        });
    }
    let active_events = uow
        .event_definitions(session_id)
        .await?
        .into_iter()
        .filter(|d| d.is_active)
        .map(|d| OpenEvent {
            event_def_id: d.id,
            name: d.name,
            expression: d.expression,
            color_restriction: d.color_restriction,
        })
        .collect();
    uow.rollback().await?;

    Ok(SessionInfo {
        session_id: session.id,
        game_id: session.game_id,
        status: session.status,
        region_id: session.scope.region_id(),
        location_id: session.scope.location_id(),
        started_at: session.started_at,
        ended_at: session.ended_at,
        players,
        active_events,
    })
}

/// Returns one page of a session's timeline, ordered by seq.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown session.
pub async fn get_session_timeline(
    store: &dyn Store,
    session_id: Uuid,
    page: Page,
) -> Result<Vec<TimelineEvent>, DomainError> {
    let mut uow = store.begin().await?;
    uow.find_session(session_id)
        .await?
        .ok_or_else(|| DomainError::not_found("session", session_id))?;
    let events = uow.session_timeline(session_id, page).await?;
    uow.rollback().await?;
    Ok(events)
}

/// Returns one page of a game's timeline in commit order.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown game.
pub async fn get_game_timeline(
    store: &dyn Store,
    game_id: Uuid,
    page: Page,
) -> Result<Vec<TimelineEvent>, DomainError> {
    let mut uow = store.begin().await?;
    uow.find_game(game_id)
        .await?
        .ok_or_else(|| DomainError::not_found("game", game_id))?;
    let events = uow.game_timeline(game_id, page).await?;
    uow.rollback().await?;
    Ok(events)
}

/// Lists a game's regions.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown game.
pub async fn list_regions(store: &dyn Store, game_id: Uuid) -> Result<Vec<Region>, DomainError> {
    let mut uow = store.begin().await?;
    uow.find_game(game_id)
        .await?
        .ok_or_else(|| DomainError::not_found("game", game_id))?;
    let regions = uow.regions(game_id).await?;
    uow.rollback().await?;
    Ok(regions)
}

/// Lists a region's locations.
///
/// # Errors
///
/// Returns `DomainError::NotFound` for an unknown region.
pub async fn list_locations(
    store: &dyn Store,
    region_id: Uuid,
) -> Result<Vec<Location>, DomainError> {
    let mut uow = store.begin().await?;
    uow.find_region(region_id)
        .await?
        .ok_or_else(|| DomainError::not_found("region", region_id))?;
    let locations = uow.locations(region_id).await?;
    uow.rollback().await?;
    Ok(locations)
}

/// A patient as shown by character lookup: the SWAP disclosure plus
/// position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientView {
    /// Patient identifier.
    pub id: Uuid,
    /// Owning game.
    pub game_id: Uuid,
    /// The user who plays the patient.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
    /// Gender.
    pub gender: Option<String>,
    /// Age.
    pub age: Option<i32>,
    /// Social identity.
    pub identity: Option<String>,
    /// Soul color.
    pub soul_color: SoulColor,
    /// The own-color archive only.
    pub revealed_archive: Archives,
    /// Current region.
    pub current_region_id: Option<Uuid>,
    /// Current location.
    pub current_location_id: Option<Uuid>,
}

/// Result of a polymorphic character lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CharacterView {
    /// The id named a patient.
    Patient(PatientView),
    /// The id named a ghost.
    Ghost(GhostView),
}

/// Looks up a patient or a ghost by id.
///
/// # Errors
///
/// Returns `DomainError::NotFound` if neither exists.
pub async fn get_character(
    store: &dyn Store,
    character_id: Uuid,
) -> Result<CharacterView, DomainError> {
    let mut uow = store.begin().await?;
    let view = if let Some(patient) = uow.find_patient(character_id).await? {
        let swap = patient.swap_file();
        CharacterView::Patient(PatientView {
            id: patient.id,
            game_id: patient.game_id,
            user_id: patient.user_id,
            name: patient.name,
            gender: patient.gender,
            age: patient.age,
            identity: patient.identity,
            soul_color: patient.soul_color,
            revealed_archive: swap.revealed_archive,
            current_region_id: patient.current_region_id,
            current_location_id: patient.current_location_id,
        })
    } else if let Some(ghost) = uow.find_ghost(character_id).await? {
        CharacterView::Ghost(ghost.view())
    } else {
        return Err(DomainError::not_found("character", character_id));
    };
    uow.rollback().await?;
    Ok(view)
}
