//! Aggregate roots for the game context.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dg_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Game lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameStatus {
    /// Being set up; no play yet.
    Preparing,
    /// In play.
    Active,
    /// Temporarily suspended.
    Paused,
    /// Finished. Terminal.
    Ended,
}

impl GameStatus {
    /// Returns the storage/wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GameStatus::Preparing => "preparing",
            GameStatus::Active => "active",
            GameStatus::Paused => "paused",
            GameStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "preparing" => Ok(GameStatus::Preparing),
            "active" => Ok(GameStatus::Active),
            "paused" => Ok(GameStatus::Paused),
            "ended" => Ok(GameStatus::Ended),
            other => Err(DomainError::Infrastructure(format!(
                "unknown game status {other:?}"
            ))),
        }
    }
}

/// The aggregate root for a game.
#[derive(Debug, Clone, PartialEq)]
pub struct Game {
    /// Aggregate identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Lifecycle status.
    pub status: GameStatus,
    /// Free-form rules configuration.
    pub config: Option<serde_json::Value>,
    /// Free-form story flags.
    pub flags: Option<serde_json::Value>,
    /// The user who created the game.
    pub created_by: Option<Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl Game {
    /// Creates a new game in `preparing` status.
    #[must_use]
    pub fn new(
        id: Uuid,
        name: String,
        created_by: Option<Uuid>,
        config: Option<serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            status: GameStatus::Preparing,
            config,
            flags: None,
            created_by,
            created_at: now,
        }
    }

    fn invalid_transition(&self, attempted: &'static str) -> DomainError {
        DomainError::InvalidTransition {
            entity: "game",
            id: self.id,
            from: self.status.to_string(),
            attempted,
        }
    }

    /// `preparing` → `active`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` from any other status.
    pub fn start(&mut self) -> Result<(), DomainError> {
        if self.status != GameStatus::Preparing {
            return Err(self.invalid_transition("start"));
        }
        self.status = GameStatus::Active;
        Ok(())
    }

    /// `active` → `paused`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` from any other status.
    pub fn pause(&mut self) -> Result<(), DomainError> {
        if self.status != GameStatus::Active {
            return Err(self.invalid_transition("pause"));
        }
        self.status = GameStatus::Paused;
        Ok(())
    }

    /// `paused` → `active`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` from any other status.
    pub fn resume(&mut self) -> Result<(), DomainError> {
        if self.status != GameStatus::Paused {
            return Err(self.invalid_transition("resume"));
        }
        self.status = GameStatus::Active;
        Ok(())
    }

    /// Any non-ended status → `ended`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if the game already ended.
    pub fn end(&mut self) -> Result<(), DomainError> {
        if self.status == GameStatus::Ended {
            return Err(self.invalid_transition("end"));
        }
        self.status = GameStatus::Ended;
        Ok(())
    }

    /// Guards operations that need the game to be in play.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless the game is `active`.
    pub fn ensure_active(&self, attempted: &'static str) -> Result<(), DomainError> {
        if self.status == GameStatus::Active {
            Ok(())
        } else {
            Err(self.invalid_transition(attempted))
        }
    }

    /// Guards operations that are allowed until the game ends.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if the game has ended.
    pub fn ensure_not_ended(&self, attempted: &'static str) -> Result<(), DomainError> {
        if self.status == GameStatus::Ended {
            Err(self.invalid_transition(attempted))
        } else {
            Ok(())
        }
    }
}

/// Role a user plays in a game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayerRole {
    /// Game master.
    #[serde(rename = "DM")]
    Dm,
    /// Player.
    #[serde(rename = "PL")]
    Pl,
}

impl PlayerRole {
    /// Returns the storage/wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PlayerRole::Dm => "DM",
            PlayerRole::Pl => "PL",
        }
    }
}

impl FromStr for PlayerRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DM" => Ok(PlayerRole::Dm),
            "PL" => Ok(PlayerRole::Pl),
            other => Err(DomainError::Validation(format!(
                "role must be DM or PL (got {other:?})"
            ))),
        }
    }
}

/// A user's participation in a game. Unique per (game, user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePlayer {
    /// The game.
    pub game_id: Uuid,
    /// The participating user.
    pub user_id: Uuid,
    /// DM or PL.
    pub role: PlayerRole,
    /// The patient this user is currently playing, if any.
    pub active_patient_id: Option<Uuid>,
    /// When the user joined.
    pub joined_at: DateTime<Utc>,
}

impl GamePlayer {
    /// Returns `true` for game masters.
    #[must_use]
    pub fn is_dm(&self) -> bool {
        self.role == PlayerRole::Dm
    }
}

/// A geographical area within a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Region {
    /// Region identifier.
    pub id: Uuid,
    /// Owning game.
    pub game_id: Uuid,
    /// Short code, unique within the game (`A`, `B`, ...).
    pub code: String,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Explicit ordering key.
    pub sort_order: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// A specific place within a region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Location identifier.
    pub id: Uuid,
    /// Owning region.
    pub region_id: Uuid,
    /// Owning game (denormalized from the region).
    pub game_id: Uuid,
    /// Display name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Optional long-form content.
    pub content: Option<String>,
    /// Explicit ordering key.
    pub sort_order: i32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Orders regions or locations by sort key, then name.
pub fn sort_regions(regions: &mut [Region]) {
    regions.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.code.cmp(&b.code)));
}

/// Orders locations by sort key, then name.
pub fn sort_locations(locations: &mut [Location]) {
    locations.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_test_support::fixed_now;

    fn new_game() -> Game {
        Game::new(
            Uuid::new_v4(),
            "Signal Rift".to_owned(),
            Some(Uuid::new_v4()),
            None,
            fixed_now(),
        )
    }

    #[test]
    fn test_new_game_is_preparing() {
        assert_eq!(new_game().status, GameStatus::Preparing);
    }

    #[test]
    fn test_start_only_from_preparing() {
        let mut game = new_game();
        game.start().unwrap();
        assert_eq!(game.status, GameStatus::Active);

        match game.start() {
            Err(DomainError::InvalidTransition {
                entity,
                from,
                attempted,
                ..
            }) => {
                assert_eq!(entity, "game");
                assert_eq!(from, "active");
                assert_eq!(attempted, "start");
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[test]
    fn test_pause_and_resume_toggle() {
        let mut game = new_game();
        assert!(game.pause().is_err());
        game.start().unwrap();
        game.pause().unwrap();
        assert_eq!(game.status, GameStatus::Paused);
        assert!(game.pause().is_err());
        game.resume().unwrap();
        assert_eq!(game.status, GameStatus::Active);
        assert!(game.resume().is_err());
    }

    #[test]
    fn test_end_from_any_status_but_once() {
        let mut preparing = new_game();
        preparing.end().unwrap();
        assert_eq!(preparing.status, GameStatus::Ended);
        assert!(preparing.end().is_err());

        let mut paused = new_game();
        paused.start().unwrap();
        paused.pause().unwrap();
        paused.end().unwrap();
        assert!(paused.start().is_err());
        assert!(paused.resume().is_err());
    }

    #[test]
    fn test_guards() {
        let mut game = new_game();
        assert!(game.ensure_active("start session").is_err());
        assert!(game.ensure_not_ended("move").is_ok());
        game.start().unwrap();
        assert!(game.ensure_active("start session").is_ok());
        game.end().unwrap();
        assert!(game.ensure_not_ended("move").is_err());
    }

    #[test]
    fn test_status_round_trips_through_storage_name() {
        for status in [
            GameStatus::Preparing,
            GameStatus::Active,
            GameStatus::Paused,
            GameStatus::Ended,
        ] {
            assert_eq!(status.as_str().parse::<GameStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_role_parsing() {
        assert_eq!("DM".parse::<PlayerRole>().unwrap(), PlayerRole::Dm);
        assert!(matches!(
            "GM".parse::<PlayerRole>(),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn test_regions_sort_by_key_then_code() {
        let region = |code: &str, sort_order| Region {
            id: Uuid::new_v4(),
            game_id: Uuid::nil(),
            code: code.to_owned(),
            name: code.to_owned(),
            description: None,
            sort_order,
            created_at: fixed_now(),
        };
        let mut regions = vec![region("C", 1), region("B", 0), region("A", 1)];
        sort_regions(&mut regions);
        let codes: Vec<&str> = regions.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["B", "A", "C"]);
    }
}
