//! DM-defined event checks and the abilities spent against them.

use chrono::{DateTime, Utc};
use dg_core::color::SoulColor;
use dg_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A target the DM sets up for players to beat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDefinition {
    /// Definition identifier.
    pub id: Uuid,
    /// The session it belongs to.
    pub session_id: Uuid,
    /// Owning game.
    pub game_id: Uuid,
    /// Display name.
    pub name: String,
    /// Dice expression used to set the target.
    pub expression: String,
    /// If set, only abilities of this color may be spent.
    pub color_restriction: Option<SoulColor>,
    /// The total a check must reach.
    pub target_roll_total: i32,
    /// Individual dice behind `target_roll_total`, when it was rolled.
    pub target_roll_detail: Option<Vec<u32>>,
    /// Whether checks are still accepted.
    pub is_active: bool,
    /// The DM who defined it.
    pub created_by: Option<Uuid>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl EventDefinition {
    /// Stops accepting checks.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if already closed.
    pub fn close(&mut self) -> Result<(), DomainError> {
        if !self.is_active {
            return Err(DomainError::InvalidTransition {
                entity: "event_definition",
                id: self.id,
                from: "closed".to_owned(),
                attempted: "close",
            });
        }
        self.is_active = false;
        Ok(())
    }

    /// Checks whether an ability of `color` may be spent on this event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if the event is closed, or
    /// `DomainError::Validation` if the color is excluded.
    pub fn admit(&self, color: SoulColor) -> Result<(), DomainError> {
        if !self.is_active {
            return Err(DomainError::InvalidState(format!(
                "event {} is closed",
                self.name
            )));
        }
        match self.color_restriction {
            Some(required) if required != color => Err(DomainError::Validation(format!(
                "event {} only accepts {required} abilities (got {color})",
                self.name
            ))),
            _ => Ok(()),
        }
    }
}

/// Record of one ability spent on one event. Unique per (event, ghost, ability).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventAbilityUsage {
    /// Usage identifier.
    pub id: Uuid,
    /// The event definition.
    pub event_def_id: Uuid,
    /// The ghost that acted.
    pub ghost_id: Uuid,
    /// The ability spent.
    pub ability_id: Uuid,
    /// When it was spent.
    pub used_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_test_support::fixed_now;

    fn definition(color_restriction: Option<SoulColor>) -> EventDefinition {
        EventDefinition {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            game_id: Uuid::new_v4(),
            name: "Locked ward".to_owned(),
            expression: "2d6".to_owned(),
            color_restriction,
            target_roll_total: 7,
            target_roll_detail: Some(vec![3, 4]),
            is_active: true,
            created_by: None,
            created_at: fixed_now(),
        }
    }

    #[test]
    fn test_color_restriction() {
        let restricted = definition(Some(SoulColor::M));
        assert!(restricted.admit(SoulColor::M).is_ok());
        assert!(matches!(
            restricted.admit(SoulColor::C),
            Err(DomainError::Validation(_))
        ));
        assert!(definition(None).admit(SoulColor::K).is_ok());
    }

    #[test]
    fn test_closed_event_rejects_checks_and_second_close() {
        let mut event = definition(None);
        event.close().unwrap();
        assert!(matches!(event.admit(SoulColor::C), Err(DomainError::InvalidState(_))));
        assert!(matches!(event.close(), Err(DomainError::InvalidTransition { .. })));
    }
}
