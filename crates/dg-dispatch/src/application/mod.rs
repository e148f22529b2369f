//! Application layer: the dispatcher, its event handlers, admin commands
//! and read-side queries.

pub mod command_handlers;
pub mod dispatcher;
pub mod query_handlers;

mod character_handlers;
mod context;
mod game_handlers;
mod resolution_handlers;
mod session_handlers;
