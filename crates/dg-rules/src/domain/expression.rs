//! Dice expression parsing.

use std::fmt;
use std::str::FromStr;

use dg_core::error::DomainError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Most dice a single expression may roll.
pub const MAX_DICE: u32 = 100;

/// Largest die a single expression may roll.
pub const MAX_SIDES: u32 = 1000;

/// Error type for dice parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiceError {
    /// The text is not of the form `NdM[+K]`.
    #[error("invalid dice notation: {0:?}")]
    InvalidNotation(String),
    /// The die count is zero or too large.
    #[error("dice count must be between 1 and {MAX_DICE} (got {0})")]
    InvalidCount(u32),
    /// The die size is zero or too large.
    #[error("die size must be between 1 and {MAX_SIDES} (got {0})")]
    InvalidSides(u32),
}

impl From<DiceError> for DomainError {
    fn from(err: DiceError) -> Self {
        DomainError::Validation(err.to_string())
    }
}

/// A parsed `NdM[+K]` expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceExpression {
    /// Number of dice (`N`).
    pub count: u32,
    /// Sides per die (`M`).
    pub sides: u32,
    /// Flat modifier (`K`), may be negative.
    pub modifier: i32,
}

impl DiceExpression {
    /// Builds an expression from parts, validating bounds.
    ///
    /// # Errors
    ///
    /// Returns `DiceError` if `count` or `sides` is out of range.
    pub fn new(count: u32, sides: u32, modifier: i32) -> Result<Self, DiceError> {
        if count == 0 || count > MAX_DICE {
            return Err(DiceError::InvalidCount(count));
        }
        if sides == 0 || sides > MAX_SIDES {
            return Err(DiceError::InvalidSides(sides));
        }
        Ok(Self {
            count,
            sides,
            modifier,
        })
    }

    /// Parses dice notation such as `1d6`, `2d10+3`, `d20-1`.
    ///
    /// # Errors
    ///
    /// Returns `DiceError` if the notation is malformed or out of range.
    pub fn parse(notation: &str) -> Result<Self, DiceError> {
        let compact: String = notation
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        let invalid = || DiceError::InvalidNotation(notation.to_owned());

        let (count_part, rest) = compact.split_once('d').ok_or_else(invalid)?;
        let count = if count_part.is_empty() {
            1
        } else {
            count_part.parse::<u32>().map_err(|_| invalid())?
        };

        let (sides_part, modifier) = match rest.find(['+', '-']) {
            Some(idx) => {
                let (sides, signed) = rest.split_at(idx);
                let magnitude = signed[1..].parse::<i32>().map_err(|_| invalid())?;
                let modifier = if signed.starts_with('-') {
                    -magnitude
                } else {
                    magnitude
                };
                (sides, modifier)
            }
            None => (rest, 0),
        };
        let sides = sides_part.parse::<u32>().map_err(|_| invalid())?;

        Self::new(count, sides, modifier)
    }
}

impl FromStr for DiceExpression {
    type Err = DiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for DiceExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)?;
        match self.modifier {
            0 => Ok(()),
            m if m > 0 => write!(f, "+{m}"),
            m => write!(f, "{m}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_expression() {
        assert_eq!(
            DiceExpression::parse("2d6").unwrap(),
            DiceExpression {
                count: 2,
                sides: 6,
                modifier: 0
            }
        );
    }

    #[test]
    fn test_parse_signed_modifiers_and_implicit_count() {
        assert_eq!(DiceExpression::parse("1d20+3").unwrap().modifier, 3);
        assert_eq!(DiceExpression::parse("3d4 - 2").unwrap().modifier, -2);
        let implicit = DiceExpression::parse("D8").unwrap();
        assert_eq!((implicit.count, implicit.sides), (1, 8));
    }

    #[test]
    fn test_parse_rejects_malformed_notation() {
        for bad in ["", "6", "d", "2x6", "1d6+", "1d6+x", "ad6"] {
            assert!(
                matches!(
                    DiceExpression::parse(bad),
                    Err(DiceError::InvalidNotation(_))
                ),
                "expected {bad:?} to be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_out_of_range_parts() {
        assert_eq!(DiceExpression::parse("0d6"), Err(DiceError::InvalidCount(0)));
        assert_eq!(
            DiceExpression::parse("1d0"),
            Err(DiceError::InvalidSides(0))
        );
        assert_eq!(
            DiceExpression::parse("101d6"),
            Err(DiceError::InvalidCount(101))
        );
    }

    #[test]
    fn test_display_is_canonical() {
        assert_eq!(DiceExpression::parse("d6+2").unwrap().to_string(), "1d6+2");
        assert_eq!(DiceExpression::parse("2d10-1").unwrap().to_string(), "2d10-1");
    }

    #[test]
    fn test_dice_error_converts_to_validation() {
        let err: DomainError = DiceError::InvalidSides(0).into();
        assert!(matches!(err, DomainError::Validation(_)));
    }
}
