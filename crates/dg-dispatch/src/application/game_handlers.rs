//! Handlers for game-level lifecycle events.

use dg_core::error::DomainError;
use dg_game::domain::aggregates::{GamePlayer, PlayerRole};
use serde_json::json;

use super::context::{EventContext, Outcome};
use crate::domain::events::PlayerJoin;

/// `player_join`: enrols the acting user. Only the first DM may join as DM.
pub(crate) async fn player_join(
    ctx: &mut EventContext<'_>,
    payload: PlayerJoin,
) -> Result<Outcome, DomainError> {
    ctx.game.ensure_not_ended("join")?;
    if ctx.player.is_some() {
        return Err(DomainError::Conflict(format!(
            "user {} already plays in game {}",
            ctx.actor_id, ctx.game.id
        )));
    }
    let role = payload.role.unwrap_or(PlayerRole::Pl);
    if role == PlayerRole::Dm {
        let players = ctx.uow.game_players(ctx.game.id).await?;
        if players.iter().any(GamePlayer::is_dm) {
            return Err(DomainError::Forbidden(
                "the game already has a DM; join as PL".to_owned(),
            ));
        }
    }
    let player = GamePlayer {
        game_id: ctx.game.id,
        user_id: ctx.actor_id,
        role,
        active_patient_id: None,
        joined_at: ctx.now,
    };
    ctx.uow.insert_game_player(&player).await?;
    Ok(Outcome::new(json!({
        "game_id": ctx.game.id,
        "user_id": ctx.actor_id,
        "role": role,
    })))
}

/// `game_start`.
pub(crate) async fn game_start(ctx: &mut EventContext<'_>) -> Result<Outcome, DomainError> {
    ctx.game.start()?;
    ctx.uow.update_game(&ctx.game).await?;
    Ok(game_status(ctx))
}

/// `game_pause`.
pub(crate) async fn game_pause(ctx: &mut EventContext<'_>) -> Result<Outcome, DomainError> {
    ctx.game.pause()?;
    ctx.uow.update_game(&ctx.game).await?;
    Ok(game_status(ctx))
}

/// `game_resume`.
pub(crate) async fn game_resume(ctx: &mut EventContext<'_>) -> Result<Outcome, DomainError> {
    ctx.game.resume()?;
    ctx.uow.update_game(&ctx.game).await?;
    Ok(game_status(ctx))
}

/// `game_end`: ends the game and every session still holding a scope.
pub(crate) async fn game_end(ctx: &mut EventContext<'_>) -> Result<Outcome, DomainError> {
    ctx.game.end()?;
    ctx.uow.update_game(&ctx.game).await?;

    let mut ended_sessions = Vec::new();
    for mut session in ctx.uow.holding_sessions(ctx.game.id).await? {
        session.end(ctx.now)?;
        ctx.uow.update_session(&session).await?;
        ended_sessions.push(session.id);
    }

    let mut outcome = game_status(ctx);
    outcome.data["ended_sessions"] = json!(ended_sessions);
    Ok(outcome)
}

fn game_status(ctx: &EventContext<'_>) -> Outcome {
    Outcome::new(json!({
        "game_id": ctx.game.id,
        "status": ctx.game.status,
    }))
}
