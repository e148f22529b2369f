//! In-memory `Store`.
//!
//! The whole state sits behind one async mutex. A unit of work holds the
//! lock for its lifetime and edits a private draft; `commit` swaps the draft
//! in, anything else throws it away. Units of work are therefore fully
//! serialized, which also closes every scope-check and sequencing race.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use dg_character::domain::aggregates::{Ghost, Patient};
use dg_character::domain::communication::{CommStatus, CommunicationRequest};
use dg_character::domain::economy::ColorFragment;
use dg_core::error::DomainError;
use dg_core::timeline::{Page, TimelineEvent};
use dg_game::domain::aggregates::{Game, GamePlayer, Location, Region, sort_locations, sort_regions};
use dg_session::domain::aggregates::{Session, SessionPlayer};
use dg_session::domain::event_definition::{EventAbilityUsage, EventDefinition};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::store::{Store, UnitOfWork};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    games: Vec<Game>,
    game_players: Vec<GamePlayer>,
    regions: Vec<Region>,
    locations: Vec<Location>,
    patients: Vec<Patient>,
    ghosts: Vec<Ghost>,
    fragments: Vec<ColorFragment>,
    sessions: Vec<Session>,
    session_players: Vec<SessionPlayer>,
    event_definitions: Vec<EventDefinition>,
    ability_usages: Vec<EventAbilityUsage>,
    comm_requests: Vec<CommunicationRequest>,
    timeline: Vec<TimelineEvent>,
}

/// A `Store` that keeps everything in process memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    fail_timeline_writes: Arc<AtomicBool>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent timeline append fail with an infrastructure
    /// error, until switched off. Used to exercise rollback paths.
    pub fn fail_timeline_writes(&self, fail: bool) {
        self.fail_timeline_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let draft = guard.clone();
        Ok(Box::new(MemoryUnitOfWork {
            guard,
            draft,
            fail_timeline_writes: self.fail_timeline_writes.load(Ordering::SeqCst),
        }))
    }
}

struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<MemoryState>,
    draft: MemoryState,
    fail_timeline_writes: bool,
}

fn replace<T>(
    items: &mut [T],
    item: &T,
    same: impl Fn(&T) -> bool,
    entity: &'static str,
    id: Uuid,
) -> Result<(), DomainError>
where
    T: Clone,
{
    let slot = items
        .iter_mut()
        .find(|existing| same(&**existing))
        .ok_or_else(|| DomainError::not_found(entity, id))?;
    *slot = item.clone();
    Ok(())
}

fn duplicate(entity: &str, id: Uuid) -> DomainError {
    DomainError::Conflict(format!("{entity} {id} already exists"))
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_game(&mut self, game_id: Uuid) -> Result<Game, DomainError> {
        // The store-wide guard already excludes every other unit of work.
        self.find_game(game_id)
            .await?
            .ok_or_else(|| DomainError::not_found("game", game_id))
    }

    async fn find_game(&mut self, game_id: Uuid) -> Result<Option<Game>, DomainError> {
        Ok(self.draft.games.iter().find(|g| g.id == game_id).cloned())
    }

    async fn insert_game(&mut self, game: &Game) -> Result<(), DomainError> {
        if self.draft.games.iter().any(|g| g.id == game.id) {
            return Err(duplicate("game", game.id));
        }
        self.draft.games.push(game.clone());
        Ok(())
    }

    async fn update_game(&mut self, game: &Game) -> Result<(), DomainError> {
        replace(&mut self.draft.games, game, |g| g.id == game.id, "game", game.id)
    }

    async fn game_players(&mut self, game_id: Uuid) -> Result<Vec<GamePlayer>, DomainError> {
        Ok(self
            .draft
            .game_players
            .iter()
            .filter(|p| p.game_id == game_id)
            .cloned()
            .collect())
    }

    async fn find_game_player(
        &mut self,
        game_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<GamePlayer>, DomainError> {
        Ok(self
            .draft
            .game_players
            .iter()
            .find(|p| p.game_id == game_id && p.user_id == user_id)
            .cloned())
    }

    async fn insert_game_player(&mut self, player: &GamePlayer) -> Result<(), DomainError> {
        if self
            .draft
            .game_players
            .iter()
            .any(|p| p.game_id == player.game_id && p.user_id == player.user_id)
        {
            return Err(DomainError::Conflict(format!(
                "user {} already plays in game {}",
                player.user_id, player.game_id
            )));
        }
        self.draft.game_players.push(player.clone());
        Ok(())
    }

    async fn update_game_player(&mut self, player: &GamePlayer) -> Result<(), DomainError> {
        replace(
            &mut self.draft.game_players,
            player,
            |p| p.game_id == player.game_id && p.user_id == player.user_id,
            "game_player",
            player.user_id,
        )
    }

    async fn insert_region(&mut self, region: &Region) -> Result<(), DomainError> {
        if self
            .draft
            .regions
            .iter()
            .any(|r| r.game_id == region.game_id && r.code == region.code)
        {
            return Err(DomainError::Conflict(format!(
                "region code {} is already used in game {}",
                region.code, region.game_id
            )));
        }
        self.draft.regions.push(region.clone());
        Ok(())
    }

    async fn regions(&mut self, game_id: Uuid) -> Result<Vec<Region>, DomainError> {
        let mut regions: Vec<Region> = self
            .draft
            .regions
            .iter()
            .filter(|r| r.game_id == game_id)
            .cloned()
            .collect();
        sort_regions(&mut regions);
        Ok(regions)
    }

    async fn find_region(&mut self, region_id: Uuid) -> Result<Option<Region>, DomainError> {
        Ok(self.draft.regions.iter().find(|r| r.id == region_id).cloned())
    }

    async fn insert_location(&mut self, location: &Location) -> Result<(), DomainError> {
        if self.draft.locations.iter().any(|l| l.id == location.id) {
            return Err(duplicate("location", location.id));
        }
        self.draft.locations.push(location.clone());
        Ok(())
    }

    async fn locations(&mut self, region_id: Uuid) -> Result<Vec<Location>, DomainError> {
        let mut locations: Vec<Location> = self
            .draft
            .locations
            .iter()
            .filter(|l| l.region_id == region_id)
            .cloned()
            .collect();
        sort_locations(&mut locations);
        Ok(locations)
    }

    async fn find_location(&mut self, location_id: Uuid) -> Result<Option<Location>, DomainError> {
        Ok(self
            .draft
            .locations
            .iter()
            .find(|l| l.id == location_id)
            .cloned())
    }

    async fn insert_patient(&mut self, patient: &Patient) -> Result<(), DomainError> {
        if self.draft.patients.iter().any(|p| p.id == patient.id) {
            return Err(duplicate("patient", patient.id));
        }
        self.draft.patients.push(patient.clone());
        Ok(())
    }

    async fn update_patient(&mut self, patient: &Patient) -> Result<(), DomainError> {
        replace(
            &mut self.draft.patients,
            patient,
            |p| p.id == patient.id,
            "patient",
            patient.id,
        )
    }

    async fn find_patient(&mut self, patient_id: Uuid) -> Result<Option<Patient>, DomainError> {
        Ok(self.draft.patients.iter().find(|p| p.id == patient_id).cloned())
    }

    async fn patients(&mut self, game_id: Uuid) -> Result<Vec<Patient>, DomainError> {
        Ok(self
            .draft
            .patients
            .iter()
            .filter(|p| p.game_id == game_id)
            .cloned()
            .collect())
    }

    async fn insert_ghost(&mut self, ghost: &Ghost) -> Result<(), DomainError> {
        for existing in &self.draft.ghosts {
            if existing.id == ghost.id {
                return Err(duplicate("ghost", ghost.id));
            }
            if ghost.current_patient_id.is_some()
                && existing.current_patient_id == ghost.current_patient_id
            {
                return Err(DomainError::Conflict(format!(
                    "patient is already inhabited by ghost {}",
                    existing.id
                )));
            }
            if ghost.origin_patient_id.is_some()
                && existing.origin_patient_id == ghost.origin_patient_id
            {
                return Err(DomainError::Conflict(format!(
                    "patient is already the origin of ghost {}",
                    existing.id
                )));
            }
        }
        self.draft.ghosts.push(ghost.clone());
        Ok(())
    }

    async fn save_ghost(&mut self, ghost: &Ghost) -> Result<(), DomainError> {
        replace(&mut self.draft.ghosts, ghost, |g| g.id == ghost.id, "ghost", ghost.id)
    }

    async fn find_ghost(&mut self, ghost_id: Uuid) -> Result<Option<Ghost>, DomainError> {
        Ok(self.draft.ghosts.iter().find(|g| g.id == ghost_id).cloned())
    }

    async fn find_ghost_by_patient(
        &mut self,
        patient_id: Uuid,
    ) -> Result<Option<Ghost>, DomainError> {
        Ok(self
            .draft
            .ghosts
            .iter()
            .find(|g| g.current_patient_id == Some(patient_id))
            .cloned())
    }

    async fn insert_fragment(&mut self, fragment: &ColorFragment) -> Result<(), DomainError> {
        if self.draft.fragments.iter().any(|f| f.id == fragment.id) {
            return Err(duplicate("color_fragment", fragment.id));
        }
        self.draft.fragments.push(fragment.clone());
        Ok(())
    }

    async fn update_fragment(&mut self, fragment: &ColorFragment) -> Result<(), DomainError> {
        replace(
            &mut self.draft.fragments,
            fragment,
            |f| f.id == fragment.id,
            "color_fragment",
            fragment.id,
        )
    }

    async fn find_fragment(
        &mut self,
        fragment_id: Uuid,
    ) -> Result<Option<ColorFragment>, DomainError> {
        Ok(self
            .draft
            .fragments
            .iter()
            .find(|f| f.id == fragment_id)
            .cloned())
    }

    async fn insert_session(&mut self, session: &Session) -> Result<(), DomainError> {
        if self.draft.sessions.iter().any(|s| s.id == session.id) {
            return Err(duplicate("session", session.id));
        }
        self.draft.sessions.push(session.clone());
        Ok(())
    }

    async fn update_session(&mut self, session: &Session) -> Result<(), DomainError> {
        replace(
            &mut self.draft.sessions,
            session,
            |s| s.id == session.id,
            "session",
            session.id,
        )
    }

    async fn find_session(&mut self, session_id: Uuid) -> Result<Option<Session>, DomainError> {
        Ok(self.draft.sessions.iter().find(|s| s.id == session_id).cloned())
    }

    async fn holding_sessions(&mut self, game_id: Uuid) -> Result<Vec<Session>, DomainError> {
        Ok(self
            .draft
            .sessions
            .iter()
            .filter(|s| s.game_id == game_id && s.holds_scope())
            .cloned()
            .collect())
    }

    async fn session_players(
        &mut self,
        session_id: Uuid,
    ) -> Result<Vec<SessionPlayer>, DomainError> {
        Ok(self
            .draft
            .session_players
            .iter()
            .filter(|p| p.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn insert_session_player(&mut self, player: &SessionPlayer) -> Result<(), DomainError> {
        if self
            .draft
            .session_players
            .iter()
            .any(|p| p.session_id == player.session_id && p.patient_id == player.patient_id)
        {
            return Err(DomainError::Conflict(format!(
                "patient {} is already in session {}",
                player.patient_id, player.session_id
            )));
        }
        self.draft.session_players.push(player.clone());
        Ok(())
    }

    async fn delete_session_player(
        &mut self,
        session_id: Uuid,
        patient_id: Uuid,
    ) -> Result<(), DomainError> {
        let before = self.draft.session_players.len();
        self.draft
            .session_players
            .retain(|p| !(p.session_id == session_id && p.patient_id == patient_id));
        if self.draft.session_players.len() == before {
            return Err(DomainError::not_found("session_player", patient_id));
        }
        Ok(())
    }

    async fn insert_event_definition(
        &mut self,
        definition: &EventDefinition,
    ) -> Result<(), DomainError> {
        if self.draft.event_definitions.iter().any(|d| d.id == definition.id) {
            return Err(duplicate("event_definition", definition.id));
        }
        self.draft.event_definitions.push(definition.clone());
        Ok(())
    }

    async fn update_event_definition(
        &mut self,
        definition: &EventDefinition,
    ) -> Result<(), DomainError> {
        replace(
            &mut self.draft.event_definitions,
            definition,
            |d| d.id == definition.id,
            "event_definition",
            definition.id,
        )
    }

    async fn find_event_definition(
        &mut self,
        definition_id: Uuid,
    ) -> Result<Option<EventDefinition>, DomainError> {
        Ok(self
            .draft
            .event_definitions
            .iter()
            .find(|d| d.id == definition_id)
            .cloned())
    }

    async fn event_definitions(
        &mut self,
        session_id: Uuid,
    ) -> Result<Vec<EventDefinition>, DomainError> {
        Ok(self
            .draft
            .event_definitions
            .iter()
            .filter(|d| d.session_id == session_id)
            .cloned()
            .collect())
    }

    async fn insert_ability_usage(&mut self, usage: &EventAbilityUsage) -> Result<(), DomainError> {
        if self.draft.ability_usages.iter().any(|u| {
            u.event_def_id == usage.event_def_id
                && u.ghost_id == usage.ghost_id
                && u.ability_id == usage.ability_id
        }) {
            return Err(DomainError::Conflict(format!(
                "ability {} was already used on event {}",
                usage.ability_id, usage.event_def_id
            )));
        }
        self.draft.ability_usages.push(usage.clone());
        Ok(())
    }

    async fn insert_comm_request(
        &mut self,
        request: &CommunicationRequest,
    ) -> Result<(), DomainError> {
        if self.draft.comm_requests.iter().any(|r| r.id == request.id) {
            return Err(duplicate("communication_request", request.id));
        }
        self.draft.comm_requests.push(request.clone());
        Ok(())
    }

    async fn update_comm_request(
        &mut self,
        request: &CommunicationRequest,
    ) -> Result<(), DomainError> {
        replace(
            &mut self.draft.comm_requests,
            request,
            |r| r.id == request.id,
            "communication_request",
            request.id,
        )
    }

    async fn find_comm_request(
        &mut self,
        request_id: Uuid,
    ) -> Result<Option<CommunicationRequest>, DomainError> {
        Ok(self
            .draft
            .comm_requests
            .iter()
            .find(|r| r.id == request_id)
            .cloned())
    }

    async fn pending_comm_between(
        &mut self,
        a: Uuid,
        b: Uuid,
    ) -> Result<Option<CommunicationRequest>, DomainError> {
        Ok(self
            .draft
            .comm_requests
            .iter()
            .find(|r| r.status == CommStatus::Pending && r.involves_pair(a, b))
            .cloned())
    }

    async fn last_seq(&mut self, stream_id: Uuid) -> Result<Option<i64>, DomainError> {
        Ok(self
            .draft
            .timeline
            .iter()
            .filter(|e| e.stream_id() == stream_id)
            .map(|e| e.seq)
            .max())
    }

    async fn append_timeline(&mut self, event: &TimelineEvent) -> Result<(), DomainError> {
        if self.fail_timeline_writes {
            return Err(DomainError::Infrastructure(
                "timeline storage unavailable".to_owned(),
            ));
        }
        let stream = event.stream_id();
        if self
            .draft
            .timeline
            .iter()
            .any(|e| e.stream_id() == stream && e.seq == event.seq)
        {
            return Err(DomainError::Conflict(format!(
                "sequence {} is already taken in stream {stream}",
                event.seq
            )));
        }
        self.draft.timeline.push(event.clone());
        Ok(())
    }

    async fn session_timeline(
        &mut self,
        session_id: Uuid,
        page: Page,
    ) -> Result<Vec<TimelineEvent>, DomainError> {
        let mut events: Vec<TimelineEvent> = self
            .draft
            .timeline
            .iter()
            .filter(|e| e.session_id == Some(session_id))
            .cloned()
            .collect();
        events.sort_by_key(|e| e.seq);
        Ok(page.slice(&events).to_vec())
    }

    async fn game_timeline(
        &mut self,
        game_id: Uuid,
        page: Page,
    ) -> Result<Vec<TimelineEvent>, DomainError> {
        let events: Vec<TimelineEvent> = self
            .draft
            .timeline
            .iter()
            .filter(|e| e.game_id == game_id)
            .cloned()
            .collect();
        Ok(page.slice(&events).to_vec())
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        let MemoryUnitOfWork {
            mut guard, draft, ..
        } = *self;
        *guard = draft;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dg_test_support::fixed_now;
    use serde_json::json;

    fn game() -> Game {
        Game::new(Uuid::new_v4(), "Grey Hill".to_owned(), None, None, fixed_now())
    }

    fn timeline_event(game_id: Uuid, session_id: Option<Uuid>, seq: i64) -> TimelineEvent {
        TimelineEvent {
            id: Uuid::new_v4(),
            game_id,
            session_id,
            seq,
            event_type: "skill_check".to_owned(),
            actor_id: None,
            data: json!({}),
            result: json!({}),
            narrative: None,
            created_at: fixed_now(),
        }
    }

    #[tokio::test]
    async fn test_commit_publishes_changes() {
        // Arrange
        let store = InMemoryStore::new();
        let game = game();

        // Act
        let mut uow = store.begin().await.unwrap();
        uow.insert_game(&game).await.unwrap();
        uow.commit().await.unwrap();

        // Assert
        let mut reader = store.begin().await.unwrap();
        assert_eq!(reader.find_game(game.id).await.unwrap(), Some(game));
    }

    #[tokio::test]
    async fn test_dropped_unit_of_work_discards_changes() {
        let store = InMemoryStore::new();
        let game = game();

        {
            let mut uow = store.begin().await.unwrap();
            uow.insert_game(&game).await.unwrap();
        }
        let mut uow = store.begin().await.unwrap();
        uow.insert_game(&game).await.unwrap();
        uow.rollback().await.unwrap();

        let mut reader = store.begin().await.unwrap();
        assert!(reader.find_game(game.id).await.unwrap().is_none());
        assert!(matches!(
            reader.lock_game(game.id).await,
            Err(DomainError::NotFound { entity: "game", .. })
        ));
    }

    #[tokio::test]
    async fn test_timeline_sequence_is_unique_per_stream() {
        let store = InMemoryStore::new();
        let game_id = Uuid::new_v4();
        let session_id = Uuid::new_v4();
        let mut uow = store.begin().await.unwrap();

        uow.append_timeline(&timeline_event(game_id, Some(session_id), 1))
            .await
            .unwrap();
        uow.append_timeline(&timeline_event(game_id, None, 1))
            .await
            .unwrap();
        let duplicate = uow
            .append_timeline(&timeline_event(game_id, Some(session_id), 1))
            .await;

        assert!(matches!(duplicate, Err(DomainError::Conflict(_))));
        assert_eq!(uow.last_seq(session_id).await.unwrap(), Some(1));
        assert_eq!(uow.last_seq(Uuid::new_v4()).await.unwrap(), None);
        let page = Page::new(10, 0).unwrap();
        assert_eq!(uow.game_timeline(game_id, page).await.unwrap().len(), 2);
        assert_eq!(uow.session_timeline(session_id, page).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_game_player_conflicts() {
        let store = InMemoryStore::new();
        let player = GamePlayer {
            game_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            role: dg_game::domain::aggregates::PlayerRole::Pl,
            active_patient_id: None,
            joined_at: fixed_now(),
        };
        let mut uow = store.begin().await.unwrap();

        uow.insert_game_player(&player).await.unwrap();

        assert!(matches!(
            uow.insert_game_player(&player).await,
            Err(DomainError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_session_player_is_not_found() {
        let store = InMemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        assert!(matches!(
            uow.delete_session_player(Uuid::new_v4(), Uuid::new_v4()).await,
            Err(DomainError::NotFound { .. })
        ));
    }
}
