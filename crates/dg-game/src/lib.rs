//! dg Game: the top-level lifecycle state machine.
//!
//! Owns the game status machine, the player roster, and the static
//! region/location hierarchy that sessions are scoped to.

pub mod domain;
