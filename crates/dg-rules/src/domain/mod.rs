//! Dice domain.

pub mod expression;
pub mod resolution;
