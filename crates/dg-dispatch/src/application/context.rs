//! State shared by every event handler during one dispatch.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dg_character::domain::aggregates::{Ghost, Patient};
use dg_core::error::DomainError;
use dg_core::rng::DeterministicRng;
use dg_game::domain::aggregates::{Game, GamePlayer};
use dg_game::domain::config::GameConfig;
use dg_rules::{CheckResult, DiceExpression, DiceRoll, resolve_check, roll};
use dg_session::domain::aggregates::Session;
use serde_json::Value;
use uuid::Uuid;

use crate::store::UnitOfWork;

/// What a handler produced.
#[derive(Debug)]
pub(crate) struct Outcome {
    pub data: Value,
    pub rolls: Option<Vec<u32>>,
    /// Overrides the stream the event is logged in (used by `session_start`).
    pub session_id: Option<Uuid>,
}

impl Outcome {
    pub(crate) fn new(data: Value) -> Self {
        Self {
            data,
            rolls: None,
            session_id: None,
        }
    }

    pub(crate) fn with_rolls(mut self, rolls: Vec<u32>) -> Self {
        self.rolls = Some(rolls);
        self
    }

    pub(crate) fn in_session(mut self, session_id: Uuid) -> Self {
        self.session_id = Some(session_id);
        self
    }
}

pub(crate) struct EventContext<'a> {
    pub uow: &'a mut dyn UnitOfWork,
    pub game: Game,
    pub config: GameConfig,
    pub actor_id: Uuid,
    pub player: Option<GamePlayer>,
    pub session: Option<Session>,
    pub rng: &'a Mutex<dyn DeterministicRng + Send>,
    pub now: DateTime<Utc>,
}

impl EventContext<'_> {
    pub(crate) fn is_dm(&self) -> bool {
        self.player.as_ref().is_some_and(GamePlayer::is_dm)
    }

    /// The session the event targets. Session-scoped events are only routed
    /// here once the dispatcher has loaded it.
    pub(crate) fn session(&self) -> Result<&Session, DomainError> {
        self.session
            .as_ref()
            .ok_or_else(|| DomainError::Validation("session_id is required".to_owned()))
    }

    pub(crate) fn session_mut(&mut self) -> Result<&mut Session, DomainError> {
        self.session
            .as_mut()
            .ok_or_else(|| DomainError::Validation("session_id is required".to_owned()))
    }

    /// Patient owners act on their own patients; the DM acts on any.
    pub(crate) fn require_owner_or_dm(&self, patient: &Patient) -> Result<(), DomainError> {
        if self.is_dm() || patient.user_id == self.actor_id {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!(
                "user {} does not control patient {}",
                self.actor_id, patient.id
            )))
        }
    }

    pub(crate) async fn load_patient(&mut self, patient_id: Uuid) -> Result<Patient, DomainError> {
        self.uow
            .find_patient(patient_id)
            .await?
            .filter(|p| p.game_id == self.game.id)
            .ok_or_else(|| DomainError::not_found("patient", patient_id))
    }

    pub(crate) async fn load_ghost(&mut self, ghost_id: Uuid) -> Result<Ghost, DomainError> {
        self.uow
            .find_ghost(ghost_id)
            .await?
            .filter(|g| g.game_id == self.game.id)
            .ok_or_else(|| DomainError::not_found("ghost", ghost_id))
    }

    /// Only the owner of the patient a ghost inhabits, or the DM, may act
    /// through that ghost.
    pub(crate) async fn require_ghost_controller(&mut self, ghost: &Ghost) -> Result<(), DomainError> {
        if self.is_dm() {
            return Ok(());
        }
        let controls = match ghost.current_patient_id {
            Some(patient_id) => self
                .uow
                .find_patient(patient_id)
                .await?
                .is_some_and(|p| p.user_id == self.actor_id),
            None => false,
        };
        if controls {
            Ok(())
        } else {
            Err(DomainError::Forbidden(format!(
                "user {} does not control ghost {}",
                self.actor_id, ghost.id
            )))
        }
    }

    /// The game's check dice, e.g. `1d6`.
    pub(crate) fn game_dice(&self) -> Result<DiceExpression, DomainError> {
        Ok(DiceExpression::new(
            self.config.dice_count,
            self.config.dice_type,
            0,
        )?)
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut dyn DeterministicRng) -> T) -> Result<T, DomainError> {
        // Never held across an await.
        let mut guard = self
            .rng
            .lock()
            .map_err(|e| DomainError::Infrastructure(format!("RNG mutex poisoned: {e}")))?;
        Ok(f(&mut *guard))
    }

    pub(crate) fn roll(&self, expression: &DiceExpression) -> Result<DiceRoll, DomainError> {
        self.with_rng(|rng| roll(expression, rng))
    }

    pub(crate) fn check(
        &self,
        expression: &DiceExpression,
        bonus: i32,
        difficulty: i32,
    ) -> Result<CheckResult, DomainError> {
        self.with_rng(|rng| resolve_check(expression, bonus, difficulty, rng))
    }
}
