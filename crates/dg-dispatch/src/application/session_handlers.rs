//! Handlers for session lifecycle and roster events.

use dg_character::domain::aggregates::Patient;
use dg_core::error::DomainError;
use dg_session::domain::aggregates::{Session, SessionPlayer};
use dg_session::domain::scope::Scope;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use super::context::{EventContext, Outcome};
use crate::domain::events::{RosterChange, SessionStart};

/// Resolves a requested region/location pair against the game's places.
/// A location implies its region; naming a different region is rejected.
pub(crate) async fn resolve_scope(
    ctx: &mut EventContext<'_>,
    region_id: Option<Uuid>,
    location_id: Option<Uuid>,
) -> Result<Scope, DomainError> {
    if let Some(location_id) = location_id {
        let location = ctx
            .uow
            .find_location(location_id)
            .await?
            .filter(|l| l.game_id == ctx.game.id)
            .ok_or_else(|| DomainError::not_found("location", location_id))?;
        if let Some(region_id) = region_id.filter(|r| *r != location.region_id) {
            return Err(DomainError::Validation(format!(
                "location {location_id} is not in region {region_id}"
            )));
        }
        return Ok(Scope::Location {
            region_id: location.region_id,
            location_id,
        });
    }
    if let Some(region_id) = region_id {
        ctx.uow
            .find_region(region_id)
            .await?
            .filter(|r| r.game_id == ctx.game.id)
            .ok_or_else(|| DomainError::not_found("region", region_id))?;
        return Ok(Scope::Region { region_id });
    }
    Ok(Scope::Game)
}

fn positioned_in(patient: &Patient, scope: &Scope) -> bool {
    match scope {
        Scope::Game => false,
        Scope::Region { region_id } => patient.current_region_id == Some(*region_id),
        Scope::Location { location_id, .. } => patient.current_location_id == Some(*location_id),
    }
}

/// `session_start`: opens a session on a free scope and enrols every patient
/// standing in it. The event is the first entry of the new session's stream.
pub(crate) async fn session_start(
    ctx: &mut EventContext<'_>,
    payload: SessionStart,
) -> Result<Outcome, DomainError> {
    ctx.game.ensure_active("start a session in")?;
    let scope = resolve_scope(ctx, payload.region_id, payload.location_id).await?;
    let holders = ctx.uow.holding_sessions(ctx.game.id).await?;
    let session = Session::start(
        Uuid::new_v4(),
        ctx.game.id,
        scope,
        Some(ctx.actor_id),
        &holders,
        ctx.config.scope_policy,
        ctx.now,
    )?;
    ctx.uow.insert_session(&session).await?;

    let mut enrolled = Vec::new();
    for patient in ctx.uow.patients(ctx.game.id).await? {
        if positioned_in(&patient, &scope) {
            ctx.uow
                .insert_session_player(&SessionPlayer {
                    session_id: session.id,
                    patient_id: patient.id,
                    joined_at: ctx.now,
                })
                .await?;
            enrolled.push(patient.id);
        }
    }
    info!(session_id = %session.id, enrolled = enrolled.len(), "session started");

    Ok(Outcome::new(json!({
        "session_id": session.id,
        "status": session.status,
        "region_id": scope.region_id(),
        "location_id": scope.location_id(),
        "players": enrolled,
    }))
    .in_session(session.id))
}

/// `session_pause`.
pub(crate) async fn session_pause(ctx: &mut EventContext<'_>) -> Result<Outcome, DomainError> {
    let session = ctx.session_mut()?;
    session.pause()?;
    let session = session.clone();
    ctx.uow.update_session(&session).await?;
    Ok(session_status(&session))
}

/// `session_resume`: fails with a conflict if another session took the
/// scope while this one was paused.
pub(crate) async fn session_resume(ctx: &mut EventContext<'_>) -> Result<Outcome, DomainError> {
    ctx.game.ensure_active("resume a session in")?;
    let holders = ctx.uow.holding_sessions(ctx.game.id).await?;
    let policy = ctx.config.scope_policy;
    let session = ctx.session_mut()?;
    session.resume(&holders, policy)?;
    let session = session.clone();
    ctx.uow.update_session(&session).await?;
    Ok(session_status(&session))
}

/// `session_end`.
pub(crate) async fn session_end(ctx: &mut EventContext<'_>) -> Result<Outcome, DomainError> {
    let now = ctx.now;
    let session = ctx.session_mut()?;
    session.end(now)?;
    let session = session.clone();
    ctx.uow.update_session(&session).await?;
    let mut outcome = session_status(&session);
    outcome.data["ended_at"] = json!(session.ended_at);
    Ok(outcome)
}

/// `session_add_player`.
pub(crate) async fn session_add_player(
    ctx: &mut EventContext<'_>,
    payload: RosterChange,
) -> Result<Outcome, DomainError> {
    let session_id = open_session_id(ctx, "add a player to")?;
    let patient = ctx.load_patient(payload.patient_id).await?;
    ctx.uow
        .insert_session_player(&SessionPlayer {
            session_id,
            patient_id: patient.id,
            joined_at: ctx.now,
        })
        .await?;
    Ok(Outcome::new(json!({
        "session_id": session_id,
        "patient_id": patient.id,
        "action": "added",
    })))
}

/// `session_remove_player`.
pub(crate) async fn session_remove_player(
    ctx: &mut EventContext<'_>,
    payload: RosterChange,
) -> Result<Outcome, DomainError> {
    let session_id = open_session_id(ctx, "remove a player from")?;
    ctx.uow
        .delete_session_player(session_id, payload.patient_id)
        .await?;
    Ok(Outcome::new(json!({
        "session_id": session_id,
        "patient_id": payload.patient_id,
        "action": "removed",
    })))
}

fn open_session_id(ctx: &EventContext<'_>, attempted: &'static str) -> Result<Uuid, DomainError> {
    let session = ctx.session()?;
    if session.holds_scope() {
        Ok(session.id)
    } else {
        Err(DomainError::InvalidTransition {
            entity: "session",
            id: session.id,
            from: session.status.to_string(),
            attempted,
        })
    }
}

fn session_status(session: &Session) -> Outcome {
    Outcome::new(json!({
        "session_id": session.id,
        "status": session.status,
    }))
}
