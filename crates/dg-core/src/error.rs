//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
///
/// Every variant except `Infrastructure` is a local, recoverable failure that
/// is reported back to the caller with enough context to correct the request.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A referenced entity does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (`game`, `session`, `patient`, ...).
        entity: &'static str,
        /// The identifier that was looked up.
        id: Uuid,
    },

    /// A uniqueness or mutual-exclusion invariant would be violated.
    #[error("conflict: {0}")]
    Conflict(String),

    /// An illegal lifecycle move was attempted.
    #[error("cannot {attempted} {entity} {id}: current status is {from}")]
    InvalidTransition {
        /// The kind of entity.
        entity: &'static str,
        /// The entity identifier.
        id: Uuid,
        /// The status the entity is currently in.
        from: String,
        /// The transition that was attempted.
        attempted: &'static str,
    },

    /// The event type is not part of the registry.
    #[error("unsupported event type: {0}")]
    UnsupportedEvent(String),

    /// The caller could not be identified.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller is known but lacks standing for the operation.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// A validation error in domain logic.
    #[error("validation error: {0}")]
    Validation(String),

    /// A write-once or otherwise stateful field is already in its final state.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Shorthand for a `NotFound` error.
    #[must_use]
    pub fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Returns `true` for errors caused by the backing store rather than
    /// by the request.
    #[must_use]
    pub fn is_infrastructure(&self) -> bool {
        matches!(self, Self::Infrastructure(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_transition_names_attempted_and_current_state() {
        let id = Uuid::nil();
        let err = DomainError::InvalidTransition {
            entity: "session",
            id,
            from: "ended".to_owned(),
            attempted: "pause",
        };

        assert_eq!(
            err.to_string(),
            format!("cannot pause session {id}: current status is ended")
        );
    }

    #[test]
    fn test_only_infrastructure_is_flagged_as_infrastructure() {
        assert!(DomainError::Infrastructure("db down".into()).is_infrastructure());
        assert!(!DomainError::Conflict("taken".into()).is_infrastructure());
    }
}
