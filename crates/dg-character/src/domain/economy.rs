//! Color fragments and buffs.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dg_core::color::SoulColor;
use dg_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A unit of color currency held by a ghost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColorFragment {
    /// Fragment identifier.
    pub id: Uuid,
    /// Owning game.
    pub game_id: Uuid,
    /// The ghost holding the fragment.
    pub holder_ghost_id: Uuid,
    /// Fragment color.
    pub color: SoulColor,
    /// Fragment value.
    pub value: f64,
    /// Whether the fragment has been spent.
    pub redeemed: bool,
    /// When it was spent.
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl ColorFragment {
    /// Mints a fragment on a ghost.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `value` is not a positive number.
    pub fn mint(
        id: Uuid,
        game_id: Uuid,
        holder_ghost_id: Uuid,
        color: SoulColor,
        value: f64,
    ) -> Result<Self, DomainError> {
        if !value.is_finite() || value <= 0.0 {
            return Err(DomainError::Validation(format!(
                "fragment value must be positive (got {value})"
            )));
        }
        Ok(Self {
            id,
            game_id,
            holder_ghost_id,
            color,
            value,
            redeemed: false,
            redeemed_at: None,
        })
    }

    /// Spends the fragment. Write-once.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidState` if it was already redeemed.
    pub fn redeem(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.redeemed {
            return Err(DomainError::InvalidState(format!(
                "color fragment {} is already redeemed",
                self.id
            )));
        }
        self.redeemed = true;
        self.redeemed_at = Some(now);
        Ok(())
    }
}

/// How a buff's expression is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuffType {
    /// A flat number.
    Numeric,
    /// A dice expression.
    Dice,
    /// An attribute change.
    Attribute,
    /// Free text.
    Text,
}

impl BuffType {
    /// Returns the storage/wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            BuffType::Numeric => "numeric",
            BuffType::Dice => "dice",
            BuffType::Attribute => "attribute",
            BuffType::Text => "text",
        }
    }
}

impl fmt::Display for BuffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuffType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "numeric" => Ok(BuffType::Numeric),
            "dice" => Ok(BuffType::Dice),
            "attribute" => Ok(BuffType::Attribute),
            "text" => Ok(BuffType::Text),
            other => Err(DomainError::Validation(format!("unknown buff type {other:?}"))),
        }
    }
}

/// A buff or debuff on a ghost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Buff {
    /// Buff identifier.
    pub id: Uuid,
    /// The ghost carrying the buff.
    pub ghost_id: Uuid,
    /// Owning game.
    pub game_id: Uuid,
    /// Display name.
    pub name: String,
    /// Effect expression, interpreted per `buff_type`.
    pub expression: String,
    /// Interpretation of `expression`.
    pub buff_type: BuffType,
    /// Rounds left.
    pub remaining_rounds: i32,
    /// The user who applied it.
    pub created_by: Option<Uuid>,
    /// When it was applied.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_test_support::fixed_now;

    #[test]
    fn test_redeem_is_write_once() {
        // Arrange
        let mut fragment =
            ColorFragment::mint(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), SoulColor::Y, 1.0)
                .unwrap();

        // Act
        fragment.redeem(fixed_now()).unwrap();
        let second = fragment.redeem(fixed_now());

        // Assert
        assert!(fragment.redeemed);
        assert_eq!(fragment.redeemed_at, Some(fixed_now()));
        assert!(matches!(second, Err(DomainError::InvalidState(_))));
    }

    #[test]
    fn test_mint_rejects_non_positive_value() {
        let result =
            ColorFragment::mint(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), SoulColor::C, 0.0);
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_buff_type_parsing() {
        assert_eq!("dice".parse::<BuffType>().unwrap(), BuffType::Dice);
        assert!("aura".parse::<BuffType>().is_err());
    }
}
