//! Persistence ports.
//!
//! A `Store` hands out units of work. Everything read or written through a
//! unit of work is committed together or not at all; dropping one without
//! calling `commit` discards its changes.

use async_trait::async_trait;
use dg_character::domain::aggregates::{Ghost, Patient};
use dg_character::domain::communication::CommunicationRequest;
use dg_character::domain::economy::ColorFragment;
use dg_core::error::DomainError;
use dg_core::timeline::{Page, TimelineEvent};
use dg_game::domain::aggregates::{Game, GamePlayer, Location, Region};
use dg_session::domain::aggregates::{Session, SessionPlayer};
use dg_session::domain::event_definition::{EventAbilityUsage, EventDefinition};
use uuid::Uuid;

/// Source of units of work.
#[async_trait]
pub trait Store: Send + Sync {
    /// Opens a unit of work.
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError>;
}

/// One transaction over the game state.
///
/// Insert methods report duplicate keys and broken uniqueness as
/// `DomainError::Conflict`. Update methods report a missing row as
/// `DomainError::NotFound`.
#[async_trait]
pub trait UnitOfWork: Send {
    // --- games ---

    /// Loads a game and holds it exclusively until the unit of work ends.
    /// Scope checks and sequence assignment happen under this lock.
    async fn lock_game(&mut self, game_id: Uuid) -> Result<Game, DomainError>;

    /// Loads a game without locking it.
    async fn find_game(&mut self, game_id: Uuid) -> Result<Option<Game>, DomainError>;

    /// Inserts a game.
    async fn insert_game(&mut self, game: &Game) -> Result<(), DomainError>;

    /// Saves a game's mutable fields.
    async fn update_game(&mut self, game: &Game) -> Result<(), DomainError>;

    // --- players ---

    /// Lists a game's players in join order.
    async fn game_players(&mut self, game_id: Uuid) -> Result<Vec<GamePlayer>, DomainError>;

    /// Finds one game player.
    async fn find_game_player(
        &mut self,
        game_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<GamePlayer>, DomainError>;

    /// Enrols a user. Conflict if the user already plays in the game.
    async fn insert_game_player(&mut self, player: &GamePlayer) -> Result<(), DomainError>;

    /// Saves a player's role and active patient.
    async fn update_game_player(&mut self, player: &GamePlayer) -> Result<(), DomainError>;

    // --- regions and locations ---

    /// Inserts a region. Conflict if the code is taken in the game.
    async fn insert_region(&mut self, region: &Region) -> Result<(), DomainError>;

    /// Lists a game's regions ordered by sort key.
    async fn regions(&mut self, game_id: Uuid) -> Result<Vec<Region>, DomainError>;

    /// Finds a region.
    async fn find_region(&mut self, region_id: Uuid) -> Result<Option<Region>, DomainError>;

    /// Inserts a location.
    async fn insert_location(&mut self, location: &Location) -> Result<(), DomainError>;

    /// Lists a region's locations ordered by sort key.
    async fn locations(&mut self, region_id: Uuid) -> Result<Vec<Location>, DomainError>;

    /// Finds a location.
    async fn find_location(&mut self, location_id: Uuid) -> Result<Option<Location>, DomainError>;

    // --- characters ---

    /// Inserts a patient.
    async fn insert_patient(&mut self, patient: &Patient) -> Result<(), DomainError>;

    /// Saves a patient's position.
    async fn update_patient(&mut self, patient: &Patient) -> Result<(), DomainError>;

    /// Finds a patient.
    async fn find_patient(&mut self, patient_id: Uuid) -> Result<Option<Patient>, DomainError>;

    /// Lists a game's patients in creation order.
    async fn patients(&mut self, game_id: Uuid) -> Result<Vec<Patient>, DomainError>;

    /// Inserts a ghost with its abilities. Conflict if another ghost already
    /// inhabits or originates from the same patient.
    async fn insert_ghost(&mut self, ghost: &Ghost) -> Result<(), DomainError>;

    /// Saves a ghost's mutable state, upserting its abilities and buffs.
    /// Abilities are keyed by id, so saving a ghost that received an
    /// ability moves it.
    async fn save_ghost(&mut self, ghost: &Ghost) -> Result<(), DomainError>;

    /// Finds a ghost with its abilities and buffs.
    async fn find_ghost(&mut self, ghost_id: Uuid) -> Result<Option<Ghost>, DomainError>;

    /// Finds the ghost currently inhabiting a patient.
    async fn find_ghost_by_patient(
        &mut self,
        patient_id: Uuid,
    ) -> Result<Option<Ghost>, DomainError>;

    // --- fragments ---

    /// Inserts a color fragment.
    async fn insert_fragment(&mut self, fragment: &ColorFragment) -> Result<(), DomainError>;

    /// Saves a fragment's redemption state.
    async fn update_fragment(&mut self, fragment: &ColorFragment) -> Result<(), DomainError>;

    /// Finds a fragment.
    async fn find_fragment(&mut self, fragment_id: Uuid)
    -> Result<Option<ColorFragment>, DomainError>;

    // --- sessions ---

    /// Inserts a session.
    async fn insert_session(&mut self, session: &Session) -> Result<(), DomainError>;

    /// Saves a session's status and end timestamp.
    async fn update_session(&mut self, session: &Session) -> Result<(), DomainError>;

    /// Finds a session.
    async fn find_session(&mut self, session_id: Uuid) -> Result<Option<Session>, DomainError>;

    /// Lists a game's active and paused sessions.
    async fn holding_sessions(&mut self, game_id: Uuid) -> Result<Vec<Session>, DomainError>;

    /// Lists a session's roster in join order.
    async fn session_players(&mut self, session_id: Uuid)
    -> Result<Vec<SessionPlayer>, DomainError>;

    /// Enrols a patient. Conflict if already enrolled.
    async fn insert_session_player(&mut self, player: &SessionPlayer) -> Result<(), DomainError>;

    /// Removes a patient from the roster. `NotFound` if not enrolled.
    async fn delete_session_player(
        &mut self,
        session_id: Uuid,
        patient_id: Uuid,
    ) -> Result<(), DomainError>;

    // --- event definitions ---

    /// Inserts an event definition.
    async fn insert_event_definition(
        &mut self,
        definition: &EventDefinition,
    ) -> Result<(), DomainError>;

    /// Saves an event definition's active flag.
    async fn update_event_definition(
        &mut self,
        definition: &EventDefinition,
    ) -> Result<(), DomainError>;

    /// Finds an event definition.
    async fn find_event_definition(
        &mut self,
        definition_id: Uuid,
    ) -> Result<Option<EventDefinition>, DomainError>;

    /// Lists a session's event definitions in creation order.
    async fn event_definitions(
        &mut self,
        session_id: Uuid,
    ) -> Result<Vec<EventDefinition>, DomainError>;

    /// Records an ability spent on an event. Conflict if the same ghost
    /// already spent the same ability on the same event.
    async fn insert_ability_usage(&mut self, usage: &EventAbilityUsage) -> Result<(), DomainError>;

    // --- communication ---

    /// Inserts a communication request.
    async fn insert_comm_request(
        &mut self,
        request: &CommunicationRequest,
    ) -> Result<(), DomainError>;

    /// Saves a request's status.
    async fn update_comm_request(
        &mut self,
        request: &CommunicationRequest,
    ) -> Result<(), DomainError>;

    /// Finds a request.
    async fn find_comm_request(
        &mut self,
        request_id: Uuid,
    ) -> Result<Option<CommunicationRequest>, DomainError>;

    /// Finds a pending request between two patients, in either direction.
    async fn pending_comm_between(
        &mut self,
        a: Uuid,
        b: Uuid,
    ) -> Result<Option<CommunicationRequest>, DomainError>;

    // --- timeline ---

    /// Highest sequence number in a stream, if any.
    async fn last_seq(&mut self, stream_id: Uuid) -> Result<Option<i64>, DomainError>;

    /// Appends a timeline event. Conflict if its (stream, seq) is taken.
    async fn append_timeline(&mut self, event: &TimelineEvent) -> Result<(), DomainError>;

    /// A session's events ordered by seq.
    async fn session_timeline(
        &mut self,
        session_id: Uuid,
        page: Page,
    ) -> Result<Vec<TimelineEvent>, DomainError>;

    /// All of a game's events, session-level and game-level, in commit order.
    async fn game_timeline(
        &mut self,
        game_id: Uuid,
        page: Page,
    ) -> Result<Vec<TimelineEvent>, DomainError>;

    // --- completion ---

    /// Makes every change visible atomically.
    async fn commit(self: Box<Self>) -> Result<(), DomainError>;

    /// Discards every change.
    async fn rollback(self: Box<Self>) -> Result<(), DomainError>;
}
