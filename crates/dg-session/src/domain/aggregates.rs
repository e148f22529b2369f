//! The Session aggregate and its roster.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dg_core::error::DomainError;
use dg_game::domain::config::ScopePolicy;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::scope::Scope;

/// Session status. `ended` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// In play.
    Active,
    /// Suspended; still holds its scope.
    Paused,
    /// Finished; releases its scope.
    Ended,
}

impl SessionStatus {
    /// Returns the storage/wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Ended => "ended",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "paused" => Ok(SessionStatus::Paused),
            "ended" => Ok(SessionStatus::Ended),
            other => Err(DomainError::Infrastructure(format!(
                "unknown session status {other:?}"
            ))),
        }
    }
}

/// A play session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier.
    pub id: Uuid,
    /// Owning game.
    pub game_id: Uuid,
    /// Where the session runs.
    pub scope: Scope,
    /// The user who started it.
    pub started_by: Option<Uuid>,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Start timestamp.
    pub started_at: DateTime<Utc>,
    /// End timestamp, once ended.
    pub ended_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Starts a session after checking it against the holding sessions of
    /// the same game.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Conflict` if a holding session occupies the scope.
    pub fn start(
        id: Uuid,
        game_id: Uuid,
        scope: Scope,
        started_by: Option<Uuid>,
        others: &[Session],
        policy: ScopePolicy,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let session = Self {
            id,
            game_id,
            scope,
            started_by,
            status: SessionStatus::Active,
            started_at: now,
            ended_at: None,
        };
        session.ensure_scope_free(others, policy)?;
        Ok(session)
    }

    /// Returns `true` while the session occupies its scope.
    #[must_use]
    pub fn holds_scope(&self) -> bool {
        matches!(self.status, SessionStatus::Active | SessionStatus::Paused)
    }

    /// Returns the first holding session, other than this one, whose scope
    /// conflicts with this session's.
    #[must_use]
    pub fn find_conflict<'a>(
        &self,
        others: &'a [Session],
        policy: ScopePolicy,
    ) -> Option<&'a Session> {
        others.iter().find(|other| {
            other.id != self.id
                && other.game_id == self.game_id
                && other.holds_scope()
                && self.scope.conflicts_with(&other.scope, policy)
        })
    }

    fn ensure_scope_free(&self, others: &[Session], policy: ScopePolicy) -> Result<(), DomainError> {
        match self.find_conflict(others, policy) {
            Some(holder) => Err(DomainError::Conflict(format!(
                "session {} ({}) already holds this scope",
                holder.id, holder.status
            ))),
            None => Ok(()),
        }
    }

    fn invalid_transition(&self, attempted: &'static str) -> DomainError {
        DomainError::InvalidTransition {
            entity: "session",
            id: self.id,
            from: self.status.to_string(),
            attempted,
        }
    }

    /// `active` → `paused`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` from any other status.
    pub fn pause(&mut self) -> Result<(), DomainError> {
        if self.status != SessionStatus::Active {
            return Err(self.invalid_transition("pause"));
        }
        self.status = SessionStatus::Paused;
        Ok(())
    }

    /// `paused` → `active`, re-checking the scope against `others`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless paused, or
    /// `DomainError::Conflict` if another session took the scope meanwhile.
    pub fn resume(&mut self, others: &[Session], policy: ScopePolicy) -> Result<(), DomainError> {
        if self.status != SessionStatus::Paused {
            return Err(self.invalid_transition("resume"));
        }
        self.ensure_scope_free(others, policy)?;
        self.status = SessionStatus::Active;
        Ok(())
    }

    /// `active` or `paused` → `ended`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` if already ended.
    pub fn end(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.status == SessionStatus::Ended {
            return Err(self.invalid_transition("end"));
        }
        self.status = SessionStatus::Ended;
        self.ended_at = Some(now);
        Ok(())
    }

    /// Guards session-scoped play.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless active.
    pub fn ensure_active(&self, attempted: &'static str) -> Result<(), DomainError> {
        if self.status == SessionStatus::Active {
            Ok(())
        } else {
            Err(self.invalid_transition(attempted))
        }
    }
}

/// A patient enrolled in a session. Unique per (session, patient).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionPlayer {
    /// The session.
    pub session_id: Uuid,
    /// The enrolled patient.
    pub patient_id: Uuid,
    /// When the patient joined.
    pub joined_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_test_support::fixed_now;

    fn start(game_id: Uuid, scope: Scope, others: &[Session]) -> Result<Session, DomainError> {
        Session::start(
            Uuid::new_v4(),
            game_id,
            scope,
            None,
            others,
            ScopePolicy::Strict,
            fixed_now(),
        )
    }

    #[test]
    fn test_location_conflict_lasts_until_end() {
        // Arrange
        let game_id = Uuid::new_v4();
        let scope = Scope::Location {
            region_id: Uuid::new_v4(),
            location_id: Uuid::new_v4(),
        };
        let mut first = start(game_id, scope, &[]).unwrap();

        // Act / Assert
        assert!(matches!(
            start(game_id, scope, std::slice::from_ref(&first)),
            Err(DomainError::Conflict(_))
        ));
        first.pause().unwrap();
        assert!(matches!(
            start(game_id, scope, std::slice::from_ref(&first)),
            Err(DomainError::Conflict(_))
        ));
        first.end(fixed_now()).unwrap();
        assert!(start(game_id, scope, std::slice::from_ref(&first)).is_ok());
    }

    #[test]
    fn test_sessions_in_other_games_never_conflict() {
        let scope = Scope::Game;
        let first = start(Uuid::new_v4(), scope, &[]).unwrap();
        assert!(start(Uuid::new_v4(), scope, &[first]).is_ok());
    }

    #[test]
    fn test_resume_fails_when_scope_was_taken() {
        // Arrange
        let game_id = Uuid::new_v4();
        let region_id = Uuid::new_v4();
        let scope = Scope::Region { region_id };
        let mut paused = start(game_id, scope, &[]).unwrap();
        paused.pause().unwrap();
        let mut taker = start(game_id, scope, &[]).unwrap();
        let others = vec![taker.clone(), paused.clone()];

        // Act
        let result = paused.resume(&others, ScopePolicy::Strict);

        // Assert
        assert!(matches!(result, Err(DomainError::Conflict(_))));
        assert_eq!(paused.status, SessionStatus::Paused);

        taker.end(fixed_now()).unwrap();
        paused.resume(&[taker], ScopePolicy::Strict).unwrap();
        assert_eq!(paused.status, SessionStatus::Active);
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut session = start(Uuid::new_v4(), Scope::Game, &[]).unwrap();
        assert!(session.resume(&[], ScopePolicy::Strict).is_err());
        session.pause().unwrap();
        assert!(session.pause().is_err());
        assert!(session.ensure_active("skill_check").is_err());
        session.resume(&[], ScopePolicy::Strict).unwrap();
        session.end(fixed_now()).unwrap();
        assert_eq!(session.ended_at, Some(fixed_now()));
        assert!(!session.holds_scope());
        match session.end(fixed_now()) {
            Err(DomainError::InvalidTransition { from, attempted, .. }) => {
                assert_eq!(from, "ended");
                assert_eq!(attempted, "end");
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
        assert!(session.pause().is_err());
    }

    #[test]
    fn test_find_conflict_ignores_self() {
        let session = start(Uuid::new_v4(), Scope::Game, &[]).unwrap();
        let others = vec![session.clone()];
        assert!(session.find_conflict(&others, ScopePolicy::Strict).is_none());
    }
}
