//! dg Session: play sessions and where they may run.
//!
//! A session occupies a scope (a location, a region, or the whole game).
//! At most one active-or-paused session may hold any scope at a time.

pub mod domain;
