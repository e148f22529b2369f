//! Roll and check resolution.

use dg_core::rng::DeterministicRng;
use serde::{Deserialize, Serialize};

use super::expression::DiceExpression;

/// The outcome of rolling a dice expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    /// Canonical form of the rolled expression.
    pub expression: String,
    /// Individual die results, in roll order.
    pub rolls: Vec<u32>,
    /// Flat modifier applied to the sum (expression modifier plus any bonus).
    pub modifier: i32,
    /// Sum of the dice plus the modifier.
    pub total: i32,
}

/// The outcome of a check against a difficulty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResult {
    /// The underlying roll.
    pub roll: DiceRoll,
    /// The threshold the total was compared against.
    pub difficulty: i32,
    /// `true` when `total >= difficulty`.
    pub success: bool,
}

/// Rolls every die in `expression` and sums the result.
#[must_use]
pub fn roll(expression: &DiceExpression, rng: &mut dyn DeterministicRng) -> DiceRoll {
    roll_with_bonus(expression, 0, rng)
}

/// Rolls `expression`, adds `bonus`, and compares the total with
/// `difficulty`. Ties succeed.
#[must_use]
pub fn resolve_check(
    expression: &DiceExpression,
    bonus: i32,
    difficulty: i32,
    rng: &mut dyn DeterministicRng,
) -> CheckResult {
    let roll = roll_with_bonus(expression, bonus, rng);
    let success = roll.total >= difficulty;
    CheckResult {
        roll,
        difficulty,
        success,
    }
}

#[allow(clippy::cast_possible_wrap)]
fn roll_with_bonus(
    expression: &DiceExpression,
    bonus: i32,
    rng: &mut dyn DeterministicRng,
) -> DiceRoll {
    let rolls: Vec<u32> = (0..expression.count)
        .map(|_| rng.next_u32_range(1, expression.sides))
        .collect();
    let modifier = expression.modifier.saturating_add(bonus);
    // Bounded by MAX_DICE * MAX_SIDES, well inside i32.
    let sum: u32 = rolls.iter().sum();
    DiceRoll {
        expression: expression.to_string(),
        rolls,
        modifier,
        total: (sum as i32).saturating_add(modifier),
    }
}
