//! Domain layer for the character context.

pub mod aggregates;
pub mod commands;
pub mod communication;
pub mod economy;
