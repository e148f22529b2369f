//! Domain layer for the session context.

pub mod aggregates;
pub mod event_definition;
pub mod scope;
