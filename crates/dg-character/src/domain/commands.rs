//! Commands for the character context.

use dg_core::color::{Cmyk, SoulColor};
use dg_core::command::Command;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::aggregates::Archives;

/// Command to create a patient.
#[derive(Debug, Clone)]
pub struct CreatePatient {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Owning game.
    pub game_id: Uuid,
    /// The user who will play the patient.
    pub user_id: Uuid,
    /// Display name.
    pub name: String,
    /// Optional gender.
    pub gender: Option<String>,
    /// Optional age.
    pub age: Option<i32>,
    /// Optional social identity.
    pub identity: Option<String>,
    /// Optional portrait.
    pub portrait_url: Option<String>,
    /// Soul color.
    pub soul_color: SoulColor,
    /// Personality archives by color.
    pub archives: Archives,
    /// Optional ideal projection.
    pub ideal_projection: Option<String>,
    /// Starting region.
    pub current_region_id: Option<Uuid>,
    /// Starting location.
    pub current_location_id: Option<Uuid>,
}

impl Command for CreatePatient {
    fn command_type(&self) -> &'static str {
        "character.create_patient"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn game_id(&self) -> Option<Uuid> {
        Some(self.game_id)
    }
}

/// An ability to attach to a new ghost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAbility {
    /// Display name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Ability color.
    pub color: SoulColor,
    /// Number of uses.
    #[serde(default = "default_ability_count")]
    pub ability_count: i32,
}

fn default_ability_count() -> i32 {
    1
}

/// Command to create a ghost.
#[derive(Debug, Clone)]
pub struct CreateGhost {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Owning game.
    pub game_id: Uuid,
    /// The creating user.
    pub creator_user_id: Option<Uuid>,
    /// Display name.
    pub name: String,
    /// Optional appearance.
    pub appearance: Option<String>,
    /// Optional personality.
    pub personality: Option<String>,
    /// The patient the ghost will inhabit.
    pub current_patient_id: Option<Uuid>,
    /// The patient the ghost comes from.
    pub origin_patient_id: Option<Uuid>,
    /// Declared soul color; falls back to the origin patient's.
    pub soul_color: Option<SoulColor>,
    /// Explicit CMYK vector, overriding the one derived from the soul color.
    pub cmyk: Option<Cmyk>,
    /// Starting HP; defaults to `hp_max`.
    pub hp: Option<i32>,
    /// Maximum HP; defaults to the game's initial HP.
    pub hp_max: Option<i32>,
    /// Starting MP; defaults to `mp_max`.
    pub mp: Option<i32>,
    /// Maximum MP; defaults to the game's initial MP.
    pub mp_max: Option<i32>,
    /// Abilities to attach.
    pub abilities: Vec<NewAbility>,
}

impl Command for CreateGhost {
    fn command_type(&self) -> &'static str {
        "character.create_ghost"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn game_id(&self) -> Option<Uuid> {
        Some(self.game_id)
    }
}
