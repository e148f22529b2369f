//! Commands for the game context.

use dg_core::command::Command;
use uuid::Uuid;

use super::aggregates::PlayerRole;

/// Command to create a new game. The creator is enrolled as DM.
#[derive(Debug, Clone)]
pub struct CreateGame {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Display name.
    pub name: String,
    /// The creating user.
    pub created_by: Uuid,
    /// Rules configuration blob.
    pub config: Option<serde_json::Value>,
}

impl Command for CreateGame {
    fn command_type(&self) -> &'static str {
        "game.create_game"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}

/// Command to enrol a user in a game.
#[derive(Debug, Clone)]
pub struct AddPlayer {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The game.
    pub game_id: Uuid,
    /// The user to enrol.
    pub user_id: Uuid,
    /// DM or PL.
    pub role: PlayerRole,
}

impl Command for AddPlayer {
    fn command_type(&self) -> &'static str {
        "game.add_player"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn game_id(&self) -> Option<Uuid> {
        Some(self.game_id)
    }
}

/// Command to create a region in a game.
#[derive(Debug, Clone)]
pub struct CreateRegion {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning game.
    pub game_id: Uuid,
    /// Short code, unique within the game.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Ordering key.
    pub sort_order: i32,
}

impl Command for CreateRegion {
    fn command_type(&self) -> &'static str {
        "game.create_region"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    fn game_id(&self) -> Option<Uuid> {
        Some(self.game_id)
    }
}

/// Command to create a location in a region.
#[derive(Debug, Clone)]
pub struct CreateLocation {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The owning region.
    pub region_id: Uuid,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Optional long-form content.
    pub content: Option<String>,
    /// Ordering key.
    pub sort_order: i32,
}

impl Command for CreateLocation {
    fn command_type(&self) -> &'static str {
        "game.create_location"
    }

    fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }
}
