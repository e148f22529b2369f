//! Commands: admin requests and bot events share this surface for tracing.

use uuid::Uuid;

/// Anything that mutates game state through a unit of work.
pub trait Command: Send + Sync + std::fmt::Debug {
    /// Dotted name, `context.action`, recorded on log lines.
    fn command_type(&self) -> &'static str;

    /// Correlation ID to trace this command through the system.
    fn correlation_id(&self) -> Uuid;

    /// The game the command targets, when it names one directly.
    fn game_id(&self) -> Option<Uuid> {
        None
    }
}
