//! Domain layer for the game context.

pub mod aggregates;
pub mod commands;
pub mod config;
