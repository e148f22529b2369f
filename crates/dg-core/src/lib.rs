//! dg Core: shared domain primitives.
//!
//! This crate defines the fundamental traits and types that every
//! subsystem depends on: determinism seams (clock, RNG), the domain error
//! taxonomy, soul colors, and the timeline record. It contains no
//! infrastructure code.

pub mod clock;
pub mod color;
pub mod command;
pub mod error;
pub mod rng;
pub mod timeline;
