//! Communication requests between patients.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use dg_core::error::DomainError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request status. Only `pending` is non-terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommStatus {
    /// Awaiting the target's answer.
    Pending,
    /// Accepted by the target.
    Accepted,
    /// Rejected by the target.
    Rejected,
    /// Withdrawn by the initiator.
    Cancelled,
}

impl CommStatus {
    /// Returns the storage/wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CommStatus::Pending => "pending",
            CommStatus::Accepted => "accepted",
            CommStatus::Rejected => "rejected",
            CommStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for CommStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommStatus::Pending),
            "accepted" => Ok(CommStatus::Accepted),
            "rejected" => Ok(CommStatus::Rejected),
            "cancelled" => Ok(CommStatus::Cancelled),
            other => Err(DomainError::Infrastructure(format!(
                "unknown communication status {other:?}"
            ))),
        }
    }
}

/// A request from one patient to communicate with another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommunicationRequest {
    /// Request identifier.
    pub id: Uuid,
    /// Owning game.
    pub game_id: Uuid,
    /// The requesting patient.
    pub initiator_patient_id: Uuid,
    /// The requested patient.
    pub target_patient_id: Uuid,
    /// Current status.
    pub status: CommStatus,
    /// The ability handed over on acceptance, if any.
    pub transferred_ability_id: Option<Uuid>,
    /// When the request was opened.
    pub created_at: DateTime<Utc>,
    /// When the request left `pending`.
    pub resolved_at: Option<DateTime<Utc>>,
}

impl CommunicationRequest {
    /// Opens a pending request.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if a patient addresses itself.
    pub fn open(
        id: Uuid,
        game_id: Uuid,
        initiator_patient_id: Uuid,
        target_patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        if initiator_patient_id == target_patient_id {
            return Err(DomainError::Validation(
                "a patient cannot open a communication request with itself".to_owned(),
            ));
        }
        Ok(Self {
            id,
            game_id,
            initiator_patient_id,
            target_patient_id,
            status: CommStatus::Pending,
            transferred_ability_id: None,
            created_at: now,
            resolved_at: None,
        })
    }

    fn resolve(
        &mut self,
        status: CommStatus,
        attempted: &'static str,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status != CommStatus::Pending {
            return Err(DomainError::InvalidTransition {
                entity: "communication_request",
                id: self.id,
                from: self.status.to_string(),
                attempted,
            });
        }
        self.status = status;
        self.resolved_at = Some(now);
        Ok(())
    }

    /// `pending` → `accepted`, recording any transferred ability.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless pending.
    pub fn accept(
        &mut self,
        transferred_ability_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        self.resolve(CommStatus::Accepted, "accept", now)?;
        self.transferred_ability_id = transferred_ability_id;
        Ok(())
    }

    /// `pending` → `rejected`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless pending.
    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.resolve(CommStatus::Rejected, "reject", now)
    }

    /// `pending` → `cancelled`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidTransition` unless pending.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), DomainError> {
        self.resolve(CommStatus::Cancelled, "cancel", now)
    }

    /// Returns `true` if the request links the two patients, in either order.
    #[must_use]
    pub fn involves_pair(&self, a: Uuid, b: Uuid) -> bool {
        (self.initiator_patient_id == a && self.target_patient_id == b)
            || (self.initiator_patient_id == b && self.target_patient_id == a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_test_support::fixed_now;

    fn pending() -> CommunicationRequest {
        CommunicationRequest::open(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn test_accept_records_transfer_and_is_terminal() {
        let mut request = pending();
        let ability_id = Uuid::new_v4();

        request.accept(Some(ability_id), fixed_now()).unwrap();

        assert_eq!(request.status, CommStatus::Accepted);
        assert_eq!(request.transferred_ability_id, Some(ability_id));
        assert_eq!(request.resolved_at, Some(fixed_now()));
        match request.cancel(fixed_now()) {
            Err(DomainError::InvalidTransition { from, attempted, .. }) => {
                assert_eq!(from, "accepted");
                assert_eq!(attempted, "cancel");
            }
            other => panic!("expected InvalidTransition, got {other:?}"),
        }
    }

    #[test]
    fn test_reject_and_cancel_from_pending() {
        let mut rejected = pending();
        rejected.reject(fixed_now()).unwrap();
        assert_eq!(rejected.status, CommStatus::Rejected);
        assert!(rejected.accept(None, fixed_now()).is_err());

        let mut cancelled = pending();
        cancelled.cancel(fixed_now()).unwrap();
        assert_eq!(cancelled.status, CommStatus::Cancelled);
    }

    #[test]
    fn test_self_request_is_rejected() {
        let patient = Uuid::new_v4();
        let result =
            CommunicationRequest::open(Uuid::new_v4(), Uuid::new_v4(), patient, patient, fixed_now());
        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[test]
    fn test_pair_matching_ignores_direction() {
        let request = pending();
        assert!(request.involves_pair(request.target_patient_id, request.initiator_patient_id));
        assert!(!request.involves_pair(request.target_patient_id, Uuid::new_v4()));
    }
}
