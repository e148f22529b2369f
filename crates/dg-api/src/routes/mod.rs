//! Route modules: the bot surface and the admin surface.

pub mod admin;
pub mod bot;
pub mod health;
