//! dg Rules: dice resolution.
//!
//! Parses `NdM[+K]` expressions and resolves rolls and checks against an
//! injected random source. Holds no state.

pub mod domain;

pub use domain::expression::{DiceError, DiceExpression};
pub use domain::resolution::{CheckResult, DiceRoll, resolve_check, roll};
