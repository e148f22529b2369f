//! Timeline records: the append-only history of resolved events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Largest page a timeline query may request.
pub const MAX_PAGE_LIMIT: i64 = 500;

/// Immutable record of one resolved event.
///
/// Events that belong to a session are sequenced within that session.
/// Game-level events (no session) are sequenced within the game's own
/// stream. Either way `seq` is strictly increasing within its stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Unique event identifier.
    pub id: Uuid,
    /// The game the event belongs to.
    pub game_id: Uuid,
    /// The session the event belongs to, if any.
    pub session_id: Option<Uuid>,
    /// Sequence number within the stream.
    pub seq: i64,
    /// Registry name of the event (`skill_check`, `attack`, ...).
    pub event_type: String,
    /// The user who submitted the event.
    pub actor_id: Option<Uuid>,
    /// Snapshot of the inbound payload.
    pub data: serde_json::Value,
    /// Snapshot of the handler result.
    pub result: serde_json::Value,
    /// Narrative text supplied by the narrator, if any.
    pub narrative: Option<String>,
    /// When the event was committed.
    pub created_at: DateTime<Utc>,
}

impl TimelineEvent {
    /// The stream this event is sequenced in.
    #[must_use]
    pub fn stream_id(&self) -> Uuid {
        stream_id(self.game_id, self.session_id)
    }
}

/// Returns the sequencing stream for a game/session pair.
#[must_use]
pub fn stream_id(game_id: Uuid, session_id: Option<Uuid>) -> Uuid {
    session_id.unwrap_or(game_id)
}

/// Returns the sequence number that follows `last` in a stream.
#[must_use]
pub fn next_seq(last: Option<i64>) -> i64 {
    last.map_or(1, |seq| seq + 1)
}

/// Limit/offset pagination for timeline queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    /// Maximum number of records to return.
    pub limit: i64,
    /// Number of records to skip.
    pub offset: i64,
}

impl Page {
    /// Builds a page, validating bounds.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Validation` if `limit` is outside
    /// `1..=MAX_PAGE_LIMIT` or `offset` is negative.
    pub fn new(limit: i64, offset: i64) -> Result<Self, DomainError> {
        if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
            return Err(DomainError::Validation(format!(
                "limit must be between 1 and {MAX_PAGE_LIMIT}"
            )));
        }
        if offset < 0 {
            return Err(DomainError::Validation(
                "offset must not be negative".to_owned(),
            ));
        }
        Ok(Self { limit, offset })
    }

    /// Applies the page to an already ordered slice.
    #[must_use]
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = usize::try_from(self.offset).unwrap_or(usize::MAX).min(items.len());
        let len = usize::try_from(self.limit).unwrap_or(usize::MAX);
        let end = start.saturating_add(len).min(items.len());
        &items[start..end]
    }
}
