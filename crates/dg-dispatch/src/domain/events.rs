//! The event envelope, the closed registry of event types, and their payloads.

use std::fmt;
use std::str::FromStr;

use dg_character::domain::economy::BuffType;
use dg_core::color::SoulColor;
use dg_core::command::Command;
use dg_core::error::DomainError;
use dg_game::domain::aggregates::PlayerRole;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An event as submitted by the bot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    /// The game the event targets.
    pub game_id: Uuid,
    /// The session, for session-scoped events.
    #[serde(default)]
    pub session_id: Option<Uuid>,
    /// The acting user.
    #[serde(default, alias = "user_id")]
    pub player_id: Option<Uuid>,
    /// `{ "event_type": ..., ...fields }`.
    pub payload: serde_json::Value,
    /// Narration produced for the event, stored alongside it.
    #[serde(default)]
    pub narrative: Option<String>,
    /// The correlation ID for tracing.
    #[serde(skip, default = "Uuid::new_v4")]
    pub correlation_id: Uuid,
}

impl Command for GameEvent {
    fn command_type(&self) -> &'static str {
        "dispatch.game_event"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn game_id(&self) -> Option<Uuid> {
        Some(self.game_id)
    }
}

impl GameEvent {
    /// Reads the payload's `event_type` tag.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if the tag is missing, or
    /// `DomainError::UnsupportedEvent` if it is not in the registry.
    pub fn event_type(&self) -> Result<EventType, DomainError> {
        self.payload
            .get("event_type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| DomainError::Validation("payload.event_type is required".to_owned()))?
            .parse()
    }

    /// Decodes the payload into its typed form.
    ///
    /// # Errors
    ///
    /// As `event_type`, plus `DomainError::Validation` when the fields do
    /// not match the event type.
    pub fn decode(&self) -> Result<EventPayload, DomainError> {
        let event_type = self.event_type()?;
        serde_json::from_value(self.payload.clone())
            .map_err(|e| DomainError::Validation(format!("invalid {event_type} payload: {e}")))
    }
}

/// Whether an event runs against the game or against one of its sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventScope {
    /// Needs only the game.
    Game,
    /// Needs a `session_id` belonging to the game.
    Session,
}

macro_rules! event_types {
    ($($variant:ident => $name:literal, $scope:ident, $dm_only:literal;)+) => {
        /// Every event type the dispatcher accepts.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum EventType {
            $(
                #[doc = concat!("`", $name, "`")]
                $variant,
            )+
        }

        impl EventType {
            /// Every registered event type.
            pub const ALL: &'static [EventType] = &[$(EventType::$variant),+];

            /// Returns the wire name.
            #[must_use]
            pub fn as_str(self) -> &'static str {
                match self {
                    $(EventType::$variant => $name,)+
                }
            }

            /// Returns whether the event needs a session.
            #[must_use]
            pub fn scope(self) -> EventScope {
                match self {
                    $(EventType::$variant => EventScope::$scope,)+
                }
            }

            /// Returns `true` for events only a DM may submit.
            #[must_use]
            pub fn dm_only(self) -> bool {
                match self {
                    $(EventType::$variant => $dm_only,)+
                }
            }
        }

        impl FromStr for EventType {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok(EventType::$variant),)+
                    other => Err(DomainError::UnsupportedEvent(other.to_owned())),
                }
            }
        }
    };
}

event_types! {
    PlayerJoin => "player_join", Game, false;
    GameStart => "game_start", Game, true;
    GamePause => "game_pause", Game, true;
    GameResume => "game_resume", Game, true;
    GameEnd => "game_end", Game, true;
    SessionStart => "session_start", Game, true;
    SessionPause => "session_pause", Session, true;
    SessionResume => "session_resume", Session, true;
    SessionEnd => "session_end", Session, true;
    SessionAddPlayer => "session_add_player", Session, true;
    SessionRemovePlayer => "session_remove_player", Session, true;
    SkillCheck => "skill_check", Session, false;
    Attack => "attack", Session, false;
    EventDefine => "event_define", Session, true;
    EventCheck => "event_check", Session, false;
    EventClose => "event_close", Session, true;
    Move => "move", Game, false;
    FragmentGrant => "fragment_grant", Game, true;
    FragmentRedeem => "fragment_redeem", Game, false;
    ArchiveUnlock => "archive_unlock", Game, true;
    OriginUnlock => "origin_unlock", Game, true;
    BuffApply => "buff_apply", Game, true;
    CommRequest => "comm_request", Game, false;
    CommAccept => "comm_accept", Game, false;
    CommReject => "comm_reject", Game, false;
    CommCancel => "comm_cancel", Game, false;
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded event payload. The serde tag matches `EventType::as_str`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum EventPayload {
    PlayerJoin(PlayerJoin),
    GameStart(NoFields),
    GamePause(NoFields),
    GameResume(NoFields),
    GameEnd(NoFields),
    SessionStart(SessionStart),
    SessionPause(NoFields),
    SessionResume(NoFields),
    SessionEnd(NoFields),
    SessionAddPlayer(RosterChange),
    SessionRemovePlayer(RosterChange),
    SkillCheck(SkillCheck),
    Attack(Attack),
    EventDefine(EventDefine),
    EventCheck(EventCheck),
    EventClose(EventClose),
    Move(Move),
    FragmentGrant(FragmentGrant),
    FragmentRedeem(FragmentRedeem),
    ArchiveUnlock(ArchiveUnlock),
    OriginUnlock(OriginUnlock),
    BuffApply(BuffApply),
    CommRequest(CommRequest),
    CommAccept(CommAccept),
    CommReject(CommResolve),
    CommCancel(CommResolve),
}

/// Payload for events that carry nothing beyond their tag.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NoFields {}

/// `player_join`.
#[derive(Debug, Clone, Deserialize)]
pub struct PlayerJoin {
    /// Requested role; PL when absent.
    #[serde(default)]
    pub role: Option<PlayerRole>,
}

/// `session_start`. With neither field the session is game-wide.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionStart {
    /// Region scope.
    #[serde(default)]
    pub region_id: Option<Uuid>,
    /// Location scope. Implies its region.
    #[serde(default)]
    pub location_id: Option<Uuid>,
}

/// `session_add_player` / `session_remove_player`.
#[derive(Debug, Clone, Deserialize)]
pub struct RosterChange {
    /// The patient to add or remove.
    pub patient_id: Uuid,
}

/// `skill_check`.
#[derive(Debug, Clone, Deserialize)]
pub struct SkillCheck {
    /// Threshold the total must reach.
    pub difficulty: i32,
    /// Adds the acting ghost's channel for this color.
    #[serde(default)]
    pub color: Option<SoulColor>,
    /// The acting ghost; defaults to the ghost in the actor's active patient.
    #[serde(default)]
    pub ghost_id: Option<Uuid>,
    /// Free-form description of the attempt.
    #[serde(default)]
    pub context: Option<String>,
}

/// `attack`.
#[derive(Debug, Clone, Deserialize)]
pub struct Attack {
    /// The attacking ghost.
    pub attacker_ghost_id: Uuid,
    /// The target ghost.
    pub target_ghost_id: Uuid,
    /// Adds the attacker's channel for this color.
    #[serde(default)]
    pub color_used: Option<SoulColor>,
    /// Hit threshold; game default when absent.
    #[serde(default)]
    pub difficulty: Option<i32>,
    /// Damage dice; flat game default when absent.
    #[serde(default)]
    pub damage: Option<String>,
}

/// `event_define`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventDefine {
    /// Display name.
    pub name: String,
    /// Dice expression for the target.
    pub expression: String,
    /// Only abilities of this color may be spent.
    #[serde(default)]
    pub color_restriction: Option<SoulColor>,
    /// Explicit target; rolled from `expression` when absent.
    #[serde(default)]
    pub target_roll_total: Option<i32>,
}

/// `event_check`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventCheck {
    /// The event definition.
    pub event_def_id: Uuid,
    /// The acting ghost.
    pub ghost_id: Uuid,
    /// The ability to spend.
    pub ability_id: Uuid,
}

/// `event_close`.
#[derive(Debug, Clone, Deserialize)]
pub struct EventClose {
    /// The event definition.
    pub event_def_id: Uuid,
}

/// `move`.
#[derive(Debug, Clone, Deserialize)]
pub struct Move {
    /// The patient to move.
    pub patient_id: Uuid,
    /// Destination region.
    #[serde(default)]
    pub region_id: Option<Uuid>,
    /// Destination location. Implies its region.
    #[serde(default)]
    pub location_id: Option<Uuid>,
}

/// `fragment_grant`.
#[derive(Debug, Clone, Deserialize)]
pub struct FragmentGrant {
    /// The receiving ghost.
    pub ghost_id: Uuid,
    /// Fragment color.
    pub color: SoulColor,
    /// Fragment value.
    #[serde(default = "default_fragment_value")]
    pub value: f64,
}

fn default_fragment_value() -> f64 {
    1.0
}

/// `fragment_redeem`.
#[derive(Debug, Clone, Deserialize)]
pub struct FragmentRedeem {
    /// The fragment to spend.
    pub fragment_id: Uuid,
}

/// `archive_unlock`.
#[derive(Debug, Clone, Deserialize)]
pub struct ArchiveUnlock {
    /// The ghost.
    pub ghost_id: Uuid,
    /// The archive color to reveal.
    pub color: SoulColor,
}

/// Which origin field `origin_unlock` reveals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginField {
    /// The origin patient's name.
    Name,
    /// The origin patient's identity.
    Identity,
}

/// `origin_unlock`.
#[derive(Debug, Clone, Deserialize)]
pub struct OriginUnlock {
    /// The ghost.
    pub ghost_id: Uuid,
    /// The field to reveal.
    pub field: OriginField,
}

/// `buff_apply`.
#[derive(Debug, Clone, Deserialize)]
pub struct BuffApply {
    /// The ghost.
    pub ghost_id: Uuid,
    /// Display name.
    pub name: String,
    /// Effect expression.
    pub expression: String,
    /// How to read `expression`.
    pub buff_type: BuffType,
    /// Duration in rounds.
    #[serde(default = "default_rounds")]
    pub remaining_rounds: i32,
}

fn default_rounds() -> i32 {
    1
}

/// `comm_request`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommRequest {
    /// The requesting patient.
    pub initiator_patient_id: Uuid,
    /// The requested patient.
    pub target_patient_id: Uuid,
}

/// `comm_accept`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommAccept {
    /// The request.
    pub request_id: Uuid,
    /// An ability of the target's ghost to hand to the initiator's ghost.
    #[serde(default)]
    pub ability_id: Option<Uuid>,
}

/// `comm_reject` / `comm_cancel`.
#[derive(Debug, Clone, Deserialize)]
pub struct CommResolve {
    /// The request.
    pub request_id: Uuid,
}

/// What the dispatcher returns for an accepted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResult {
    /// Always `true`; failures are reported as errors.
    pub success: bool,
    /// The event type that was handled.
    pub event_type: String,
    /// Handler-specific result.
    pub data: serde_json::Value,
    /// Individual dice, for events that rolled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rolls: Option<Vec<u32>>,
    /// Narration echoed from the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}
