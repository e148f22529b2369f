//! Inbound events and the closed event registry.

pub mod events;
