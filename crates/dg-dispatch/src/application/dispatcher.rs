//! The event dispatcher.
//!
//! `dispatch` runs one event end to end: decode against the registry,
//! open a unit of work, lock the game, check the actor, run the handler,
//! append the timeline entry, commit. Any error before the commit drops the
//! unit of work and leaves no trace.

use std::sync::{Arc, Mutex};

use dg_core::clock::Clock;
use dg_core::command::Command;
use dg_core::error::DomainError;
use dg_core::rng::DeterministicRng;
use dg_core::timeline::{TimelineEvent, next_seq, stream_id};
use dg_game::domain::config::GameConfig;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use super::context::{EventContext, Outcome};
use super::{character_handlers, game_handlers, resolution_handlers, session_handlers};
use crate::domain::events::{DispatchResult, EventPayload, EventScope, EventType, GameEvent};
use crate::store::{Store, UnitOfWork};

/// Routes game events to their handlers.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    rng: Arc<Mutex<dyn DeterministicRng + Send>>,
}

impl Dispatcher {
    /// Creates a dispatcher over the given store, clock and random source.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        rng: Arc<Mutex<dyn DeterministicRng + Send>>,
    ) -> Self {
        Self { store, clock, rng }
    }

    /// Applies one event atomically and returns its result.
    ///
    /// # Errors
    ///
    /// - `UnsupportedEvent` / `Validation` for an unknown or malformed
    ///   payload, before anything is touched.
    /// - `Unauthorized` when no acting user is given, `Forbidden` when the
    ///   user does not take part in the game or lacks the role.
    /// - `NotFound`, `Conflict`, `InvalidTransition`, `InvalidState` from
    ///   the handler.
    /// - `Infrastructure` when the store fails.
    #[instrument(
        skip(self, event),
        fields(
            game_id = %event.game_id,
            session_id = ?event.session_id,
            correlation_id = %event.correlation_id(),
            event_type = tracing::field::Empty,
        )
    )]
    pub async fn dispatch(&self, event: GameEvent) -> Result<DispatchResult, DomainError> {
        let event_type = event.event_type()?;
        tracing::Span::current().record("event_type", event_type.as_str());
        let payload = event.decode()?;
        let actor_id = event.player_id.ok_or_else(|| {
            DomainError::Unauthorized("player_id or user_id is required".to_owned())
        })?;

        let mut uow = self.store.begin().await?;
        match self
            .apply(&mut *uow, &event, event_type, payload, actor_id)
            .await
        {
            Ok(result) => {
                uow.commit().await?;
                info!(actor_id = %actor_id, "event applied");
                Ok(result)
            }
            Err(err) => {
                if let Err(rollback_err) = uow.rollback().await {
                    error!(error = %rollback_err, "rollback failed");
                }
                if err.is_infrastructure() {
                    error!(error = %err, "event failed");
                } else {
                    warn!(error = %err, "event rejected");
                }
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        uow: &mut dyn UnitOfWork,
        event: &GameEvent,
        event_type: EventType,
        payload: EventPayload,
        actor_id: Uuid,
    ) -> Result<DispatchResult, DomainError> {
        let game = uow.lock_game(event.game_id).await?;
        let config = GameConfig::from_value(game.config.as_ref())?;

        let player = uow.find_game_player(game.id, actor_id).await?;
        if event_type != EventType::PlayerJoin {
            let participant = player.as_ref().ok_or_else(|| {
                DomainError::Forbidden(format!(
                    "user {actor_id} does not take part in game {}",
                    game.id
                ))
            })?;
            if event_type.dm_only() && !participant.is_dm() {
                return Err(DomainError::Forbidden(format!(
                    "{event_type} requires the DM role"
                )));
            }
        }

        let session = match event.session_id {
            Some(session_id) => Some(
                uow.find_session(session_id)
                    .await?
                    .filter(|s| s.game_id == game.id)
                    .ok_or_else(|| DomainError::not_found("session", session_id))?,
            ),
            None if event_type.scope() == EventScope::Session => {
                return Err(DomainError::Validation(format!(
                    "{event_type} requires session_id"
                )));
            }
            None => None,
        };

        let game_id = game.id;
        let now = self.clock.now();
        let mut ctx = EventContext {
            uow: &mut *uow,
            game,
            config,
            actor_id,
            player,
            session,
            rng: &*self.rng,
            now,
        };
        let outcome = route(&mut ctx, payload).await?;
        let session_id = outcome
            .session_id
            .or_else(|| ctx.session.as_ref().map(|s| s.id));

        let seq = next_seq(uow.last_seq(stream_id(game_id, session_id)).await?);
        let entry = TimelineEvent {
            id: Uuid::new_v4(),
            game_id,
            session_id,
            seq,
            event_type: event_type.as_str().to_owned(),
            actor_id: Some(actor_id),
            data: event.payload.clone(),
            result: outcome.data.clone(),
            narrative: event.narrative.clone(),
            created_at: now,
        };
        uow.append_timeline(&entry).await?;

        Ok(DispatchResult {
            success: true,
            event_type: entry.event_type,
            data: outcome.data,
            rolls: outcome.rolls,
            narrative: entry.narrative,
        })
    }
}

async fn route(ctx: &mut EventContext<'_>, payload: EventPayload) -> Result<Outcome, DomainError> {
    match payload {
        EventPayload::PlayerJoin(p) => game_handlers::player_join(ctx, p).await,
        EventPayload::GameStart(_) => game_handlers::game_start(ctx).await,
        EventPayload::GamePause(_) => game_handlers::game_pause(ctx).await,
        EventPayload::GameResume(_) => game_handlers::game_resume(ctx).await,
        EventPayload::GameEnd(_) => game_handlers::game_end(ctx).await,
        EventPayload::SessionStart(p) => session_handlers::session_start(ctx, p).await,
        EventPayload::SessionPause(_) => session_handlers::session_pause(ctx).await,
        EventPayload::SessionResume(_) => session_handlers::session_resume(ctx).await,
        EventPayload::SessionEnd(_) => session_handlers::session_end(ctx).await,
        EventPayload::SessionAddPlayer(p) => session_handlers::session_add_player(ctx, p).await,
        EventPayload::SessionRemovePlayer(p) => {
            session_handlers::session_remove_player(ctx, p).await
        }
        EventPayload::SkillCheck(p) => resolution_handlers::skill_check(ctx, p).await,
        EventPayload::Attack(p) => resolution_handlers::attack(ctx, p).await,
        EventPayload::EventDefine(p) => resolution_handlers::event_define(ctx, p).await,
        EventPayload::EventCheck(p) => resolution_handlers::event_check(ctx, p).await,
        EventPayload::EventClose(p) => resolution_handlers::event_close(ctx, p).await,
        EventPayload::Move(p) => character_handlers::move_patient(ctx, p).await,
        EventPayload::FragmentGrant(p) => character_handlers::fragment_grant(ctx, p).await,
        EventPayload::FragmentRedeem(p) => character_handlers::fragment_redeem(ctx, p).await,
        EventPayload::ArchiveUnlock(p) => character_handlers::archive_unlock(ctx, p).await,
        EventPayload::OriginUnlock(p) => character_handlers::origin_unlock(ctx, p).await,
        EventPayload::BuffApply(p) => character_handlers::buff_apply(ctx, p).await,
        EventPayload::CommRequest(p) => character_handlers::comm_request(ctx, p).await,
        EventPayload::CommAccept(p) => character_handlers::comm_accept(ctx, p).await,
        EventPayload::CommReject(p) => character_handlers::comm_reject(ctx, p).await,
        EventPayload::CommCancel(p) => character_handlers::comm_cancel(ctx, p).await,
    }
}
