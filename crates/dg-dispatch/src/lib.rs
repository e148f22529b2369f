//! dg Dispatch: the event dispatcher and its persistence ports.
//!
//! Every inbound game event is parsed against a closed registry, checked
//! against the acting user and the current game/session state, applied to
//! the domain inside one unit of work, and recorded on the timeline in the
//! same commit.

pub mod application;
pub mod domain;
pub mod memory;
pub mod store;
