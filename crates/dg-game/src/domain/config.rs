//! Per-game rules configuration.
//!
//! Stored as a free-form JSON blob on the game; missing keys fall back to
//! defaults so a game created without a config plays with a single d6.

use dg_core::error::DomainError;
use serde::{Deserialize, Serialize};

/// How scoped sessions interact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopePolicy {
    /// A region-scoped session also holds every location in the region.
    #[default]
    Strict,
    /// Region and location sessions are checked only against their own kind.
    IndependentLocations,
}

/// Rules knobs read from a game's config blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Sides per die for checks.
    pub dice_type: u32,
    /// Dice rolled per check.
    pub dice_count: u32,
    /// Starting HP for new ghosts.
    pub initial_hp: i32,
    /// Starting MP for new ghosts.
    pub initial_mp: i32,
    /// Difficulty used by `attack` when none is given.
    pub attack_difficulty: i32,
    /// Damage dealt by `attack` when no damage expression is given.
    pub attack_damage: i32,
    /// Session conflict policy.
    pub scope_policy: ScopePolicy,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            dice_type: 6,
            dice_count: 1,
            initial_hp: 10,
            initial_mp: 5,
            attack_difficulty: 4,
            attack_damage: 1,
            scope_policy: ScopePolicy::Strict,
        }
    }
}

impl GameConfig {
    /// Parses a game's config blob. `None` and `null` yield the defaults.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if a known key has the wrong type.
    pub fn from_value(value: Option<&serde_json::Value>) -> Result<Self, DomainError> {
        match value {
            None | Some(serde_json::Value::Null) => Ok(Self::default()),
            Some(value) => serde_json::from_value(value.clone())
                .map_err(|e| DomainError::Validation(format!("invalid game config: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_config_uses_defaults() {
        let config = GameConfig::from_value(None).unwrap();
        assert_eq!(config, GameConfig::default());
        assert_eq!(config.dice_type, 6);
        assert_eq!(config.dice_count, 1);
        assert_eq!(config.scope_policy, ScopePolicy::Strict);
    }

    #[test]
    fn test_partial_config_keeps_other_defaults() {
        let blob = json!({"dice_type": 20, "scope_policy": "independent_locations", "theme": "noir"});

        let config = GameConfig::from_value(Some(&blob)).unwrap();

        assert_eq!(config.dice_type, 20);
        assert_eq!(config.dice_count, 1);
        assert_eq!(config.initial_hp, 10);
        assert_eq!(config.scope_policy, ScopePolicy::IndependentLocations);
    }

    #[test]
    fn test_wrongly_typed_key_is_rejected() {
        let blob = json!({"dice_type": "twenty"});
        assert!(matches!(
            GameConfig::from_value(Some(&blob)),
            Err(DomainError::Validation(_))
        ));
    }
}
