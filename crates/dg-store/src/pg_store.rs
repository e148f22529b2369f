//! `PostgreSQL` implementation of the `Store` port.
//!
//! Each unit of work is one transaction. `lock_game` takes a row lock on the
//! game, which serializes every writer of that game; the unique constraints
//! in the schema back up the per-stream sequence and the one-ghost-per-
//! patient rules.

use async_trait::async_trait;
use dg_character::domain::aggregates::{Ghost, Patient};
use dg_character::domain::communication::CommunicationRequest;
use dg_character::domain::economy::ColorFragment;
use dg_core::error::DomainError;
use dg_core::timeline::{Page, TimelineEvent};
use dg_dispatch::store::{Store, UnitOfWork};
use dg_game::domain::aggregates::{Game, GamePlayer, Location, Region};
use dg_session::domain::aggregates::{Session, SessionPlayer};
use dg_session::domain::event_definition::{EventAbilityUsage, EventDefinition};
use sqlx::postgres::{PgPoolOptions, PgQueryResult};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::info;
use uuid::Uuid;

use crate::error::{StoreError, db};
use crate::rows;

/// PostgreSQL-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Creates a new `PgStore` over an existing pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Opens a connection pool.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Database` if the database cannot be reached.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        info!(max_connections, "database pool opened");
        Ok(Self::new(pool))
    }

    /// Applies pending schema migrations.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Migration` if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, DomainError> {
        let tx = self.pool.begin().await.map_err(db)?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

fn expect_row(result: PgQueryResult, entity: &'static str, id: Uuid) -> Result<(), DomainError> {
    if result.rows_affected() == 0 {
        Err(DomainError::not_found(entity, id))
    } else {
        Ok(())
    }
}

impl PgUnitOfWork {
    async fn load_ghost_children(&mut self, mut ghost: Ghost) -> Result<Ghost, DomainError> {
        let abilities = sqlx::query(
            "SELECT id, ghost_id, name, description, color, ability_count \
             FROM print_abilities WHERE ghost_id = $1 ORDER BY ordinal",
        )
        .bind(ghost.id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        ghost.abilities = abilities
            .iter()
            .map(rows::print_ability)
            .collect::<Result<_, _>>()?;

        let buffs = sqlx::query(
            "SELECT id, ghost_id, game_id, name, expression, buff_type, remaining_rounds, \
             created_by, created_at FROM buffs WHERE ghost_id = $1 ORDER BY ordinal",
        )
        .bind(ghost.id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?;
        ghost.buffs = buffs.iter().map(rows::buff).collect::<Result<_, _>>()?;
        Ok(ghost)
    }

    async fn upsert_ghost_children(&mut self, ghost: &Ghost) -> Result<(), DomainError> {
        for ability in &ghost.abilities {
            sqlx::query(
                "INSERT INTO print_abilities (id, ghost_id, name, description, color, ability_count) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (id) DO UPDATE SET ghost_id = EXCLUDED.ghost_id, \
                 name = EXCLUDED.name, description = EXCLUDED.description, \
                 color = EXCLUDED.color, ability_count = EXCLUDED.ability_count",
            )
            .bind(ability.id)
            .bind(ghost.id)
            .bind(&ability.name)
            .bind(&ability.description)
            .bind(ability.color.as_str())
            .bind(ability.ability_count)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        }
        for buff in &ghost.buffs {
            sqlx::query(
                "INSERT INTO buffs (id, ghost_id, game_id, name, expression, buff_type, \
                 remaining_rounds, created_by, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
                 ON CONFLICT (id) DO UPDATE SET ghost_id = EXCLUDED.ghost_id, \
                 remaining_rounds = EXCLUDED.remaining_rounds",
            )
            .bind(buff.id)
            .bind(ghost.id)
            .bind(buff.game_id)
            .bind(&buff.name)
            .bind(&buff.expression)
            .bind(buff.buff_type.as_str())
            .bind(buff.remaining_rounds)
            .bind(buff.created_by)
            .bind(buff.created_at)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        }
        Ok(())
    }

    async fn ghost_where(&mut self, column: &str, id: Uuid) -> Result<Option<Ghost>, DomainError> {
        let sql = format!(
            "SELECT id, game_id, current_patient_id, origin_patient_id, creator_user_id, name, \
             appearance, personality, cmyk, hp, hp_max, mp, mp_max, origin, archive_unlock, \
             origin_name_unlocked, origin_identity_unlocked, created_at \
             FROM ghosts WHERE {column} = $1"
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?;
        match row {
            Some(row) => {
                let ghost = rows::ghost(&row)?;
                Ok(Some(self.load_ghost_children(ghost).await?))
            }
            None => Ok(None),
        }
    }
}

const GAME_COLUMNS: &str = "id, name, status, config, flags, created_by, created_at";
const PATIENT_COLUMNS: &str = "id, game_id, user_id, name, gender, age, identity, portrait_url, \
     soul_color, archives, ideal_projection, current_region_id, current_location_id, created_at";
const SESSION_COLUMNS: &str =
    "id, game_id, region_id, location_id, started_by, status, started_at, ended_at";
const EVENT_DEFINITION_COLUMNS: &str = "id, session_id, game_id, name, expression, \
     color_restriction, target_roll_total, target_roll_detail, is_active, created_by, created_at";
const COMM_COLUMNS: &str = "id, game_id, initiator_patient_id, target_patient_id, status, \
     transferred_ability_id, created_at, resolved_at";
const TIMELINE_COLUMNS: &str =
    "id, game_id, session_id, seq, event_type, actor_id, data, result, narrative, created_at";

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_game(&mut self, game_id: Uuid) -> Result<Game, DomainError> {
        let row = sqlx::query(&format!(
            "SELECT {GAME_COLUMNS} FROM games WHERE id = $1 FOR UPDATE"
        ))
        .bind(game_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?
        .ok_or_else(|| DomainError::not_found("game", game_id))?;
        rows::game(&row)
    }

    async fn find_game(&mut self, game_id: Uuid) -> Result<Option<Game>, DomainError> {
        sqlx::query(&format!("SELECT {GAME_COLUMNS} FROM games WHERE id = $1"))
            .bind(game_id)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(db)?
            .as_ref()
            .map(rows::game)
            .transpose()
    }

    async fn insert_game(&mut self, game: &Game) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO games (id, name, status, config, flags, created_by, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(game.id)
        .bind(&game.name)
        .bind(game.status.as_str())
        .bind(&game.config)
        .bind(&game.flags)
        .bind(game.created_by)
        .bind(game.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn update_game(&mut self, game: &Game) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE games SET name = $2, status = $3, config = $4, flags = $5 WHERE id = $1",
        )
        .bind(game.id)
        .bind(&game.name)
        .bind(game.status.as_str())
        .bind(&game.config)
        .bind(&game.flags)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        expect_row(result, "game", game.id)
    }

    async fn game_players(&mut self, game_id: Uuid) -> Result<Vec<GamePlayer>, DomainError> {
        sqlx::query(
            "SELECT game_id, user_id, role, active_patient_id, joined_at \
             FROM game_players WHERE game_id = $1 ORDER BY ordinal",
        )
        .bind(game_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?
        .iter()
        .map(rows::game_player)
        .collect()
    }

    async fn find_game_player(
        &mut self,
        game_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<GamePlayer>, DomainError> {
        sqlx::query(
            "SELECT game_id, user_id, role, active_patient_id, joined_at \
             FROM game_players WHERE game_id = $1 AND user_id = $2",
        )
        .bind(game_id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?
        .as_ref()
        .map(rows::game_player)
        .transpose()
    }

    async fn insert_game_player(&mut self, player: &GamePlayer) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO game_players (game_id, user_id, role, active_patient_id, joined_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(player.game_id)
        .bind(player.user_id)
        .bind(player.role.as_str())
        .bind(player.active_patient_id)
        .bind(player.joined_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn update_game_player(&mut self, player: &GamePlayer) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE game_players SET role = $3, active_patient_id = $4 \
             WHERE game_id = $1 AND user_id = $2",
        )
        .bind(player.game_id)
        .bind(player.user_id)
        .bind(player.role.as_str())
        .bind(player.active_patient_id)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        expect_row(result, "game_player", player.user_id)
    }

    async fn insert_region(&mut self, region: &Region) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO regions (id, game_id, code, name, description, sort_order, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(region.id)
        .bind(region.game_id)
        .bind(&region.code)
        .bind(&region.name)
        .bind(&region.description)
        .bind(region.sort_order)
        .bind(region.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn regions(&mut self, game_id: Uuid) -> Result<Vec<Region>, DomainError> {
        sqlx::query(
            "SELECT id, game_id, code, name, description, sort_order, created_at \
             FROM regions WHERE game_id = $1 ORDER BY sort_order, code",
        )
        .bind(game_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?
        .iter()
        .map(rows::region)
        .collect()
    }

    async fn find_region(&mut self, region_id: Uuid) -> Result<Option<Region>, DomainError> {
        sqlx::query(
            "SELECT id, game_id, code, name, description, sort_order, created_at \
             FROM regions WHERE id = $1",
        )
        .bind(region_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?
        .as_ref()
        .map(rows::region)
        .transpose()
    }

    async fn insert_location(&mut self, location: &Location) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO locations \
             (id, region_id, game_id, name, description, content, sort_order, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(location.id)
        .bind(location.region_id)
        .bind(location.game_id)
        .bind(&location.name)
        .bind(&location.description)
        .bind(&location.content)
        .bind(location.sort_order)
        .bind(location.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn locations(&mut self, region_id: Uuid) -> Result<Vec<Location>, DomainError> {
        sqlx::query(
            "SELECT id, region_id, game_id, name, description, content, sort_order, created_at \
             FROM locations WHERE region_id = $1 ORDER BY sort_order, name",
        )
        .bind(region_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?
        .iter()
        .map(rows::location)
        .collect()
    }

    async fn find_location(&mut self, location_id: Uuid) -> Result<Option<Location>, DomainError> {
        sqlx::query(
            "SELECT id, region_id, game_id, name, description, content, sort_order, created_at \
             FROM locations WHERE id = $1",
        )
        .bind(location_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?
        .as_ref()
        .map(rows::location)
        .transpose()
    }

    async fn insert_patient(&mut self, patient: &Patient) -> Result<(), DomainError> {
        sqlx::query(&format!(
            "INSERT INTO patients ({PATIENT_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)"
        ))
        .bind(patient.id)
        .bind(patient.game_id)
        .bind(patient.user_id)
        .bind(&patient.name)
        .bind(&patient.gender)
        .bind(patient.age)
        .bind(&patient.identity)
        .bind(&patient.portrait_url)
        .bind(patient.soul_color.as_str())
        .bind(Json(&patient.archives))
        .bind(&patient.ideal_projection)
        .bind(patient.current_region_id)
        .bind(patient.current_location_id)
        .bind(patient.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn update_patient(&mut self, patient: &Patient) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE patients SET name = $2, gender = $3, age = $4, identity = $5, \
             portrait_url = $6, archives = $7, ideal_projection = $8, \
             current_region_id = $9, current_location_id = $10 WHERE id = $1",
        )
        .bind(patient.id)
        .bind(&patient.name)
        .bind(&patient.gender)
        .bind(patient.age)
        .bind(&patient.identity)
        .bind(&patient.portrait_url)
        .bind(Json(&patient.archives))
        .bind(&patient.ideal_projection)
        .bind(patient.current_region_id)
        .bind(patient.current_location_id)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        expect_row(result, "patient", patient.id)
    }

    async fn find_patient(&mut self, patient_id: Uuid) -> Result<Option<Patient>, DomainError> {
        sqlx::query(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE id = $1"
        ))
        .bind(patient_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?
        .as_ref()
        .map(rows::patient)
        .transpose()
    }

    async fn patients(&mut self, game_id: Uuid) -> Result<Vec<Patient>, DomainError> {
        sqlx::query(&format!(
            "SELECT {PATIENT_COLUMNS} FROM patients WHERE game_id = $1 ORDER BY ordinal"
        ))
        .bind(game_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?
        .iter()
        .map(rows::patient)
        .collect()
    }

    async fn insert_ghost(&mut self, ghost: &Ghost) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO ghosts (id, game_id, current_patient_id, origin_patient_id, \
             creator_user_id, name, appearance, personality, cmyk, hp, hp_max, mp, mp_max, \
             origin, archive_unlock, origin_name_unlocked, origin_identity_unlocked, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, \
             $17, $18)",
        )
        .bind(ghost.id)
        .bind(ghost.game_id)
        .bind(ghost.current_patient_id)
        .bind(ghost.origin_patient_id)
        .bind(ghost.creator_user_id)
        .bind(&ghost.name)
        .bind(&ghost.appearance)
        .bind(&ghost.personality)
        .bind(Json(&ghost.cmyk))
        .bind(ghost.hp)
        .bind(ghost.hp_max)
        .bind(ghost.mp)
        .bind(ghost.mp_max)
        .bind(Json(&ghost.origin))
        .bind(Json(&ghost.archive_unlock))
        .bind(ghost.origin_name_unlocked)
        .bind(ghost.origin_identity_unlocked)
        .bind(ghost.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        self.upsert_ghost_children(ghost).await
    }

    async fn save_ghost(&mut self, ghost: &Ghost) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE ghosts SET current_patient_id = $2, name = $3, appearance = $4, \
             personality = $5, cmyk = $6, hp = $7, hp_max = $8, mp = $9, mp_max = $10, \
             archive_unlock = $11, origin_name_unlocked = $12, origin_identity_unlocked = $13 \
             WHERE id = $1",
        )
        .bind(ghost.id)
        .bind(ghost.current_patient_id)
        .bind(&ghost.name)
        .bind(&ghost.appearance)
        .bind(&ghost.personality)
        .bind(Json(&ghost.cmyk))
        .bind(ghost.hp)
        .bind(ghost.hp_max)
        .bind(ghost.mp)
        .bind(ghost.mp_max)
        .bind(Json(&ghost.archive_unlock))
        .bind(ghost.origin_name_unlocked)
        .bind(ghost.origin_identity_unlocked)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        expect_row(result, "ghost", ghost.id)?;
        self.upsert_ghost_children(ghost).await
    }

    async fn find_ghost(&mut self, ghost_id: Uuid) -> Result<Option<Ghost>, DomainError> {
        self.ghost_where("id", ghost_id).await
    }

    async fn find_ghost_by_patient(
        &mut self,
        patient_id: Uuid,
    ) -> Result<Option<Ghost>, DomainError> {
        self.ghost_where("current_patient_id", patient_id).await
    }

    async fn insert_fragment(&mut self, fragment: &ColorFragment) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO color_fragments \
             (id, game_id, holder_ghost_id, color, value, redeemed, redeemed_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(fragment.id)
        .bind(fragment.game_id)
        .bind(fragment.holder_ghost_id)
        .bind(fragment.color.as_str())
        .bind(fragment.value)
        .bind(fragment.redeemed)
        .bind(fragment.redeemed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn update_fragment(&mut self, fragment: &ColorFragment) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE color_fragments SET holder_ghost_id = $2, redeemed = $3, redeemed_at = $4 \
             WHERE id = $1",
        )
        .bind(fragment.id)
        .bind(fragment.holder_ghost_id)
        .bind(fragment.redeemed)
        .bind(fragment.redeemed_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        expect_row(result, "color_fragment", fragment.id)
    }

    async fn find_fragment(
        &mut self,
        fragment_id: Uuid,
    ) -> Result<Option<ColorFragment>, DomainError> {
        sqlx::query(
            "SELECT id, game_id, holder_ghost_id, color, value, redeemed, redeemed_at \
             FROM color_fragments WHERE id = $1",
        )
        .bind(fragment_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?
        .as_ref()
        .map(rows::fragment)
        .transpose()
    }

    async fn insert_session(&mut self, session: &Session) -> Result<(), DomainError> {
        sqlx::query(&format!(
            "INSERT INTO sessions ({SESSION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(session.id)
        .bind(session.game_id)
        .bind(session.scope.region_id())
        .bind(session.scope.location_id())
        .bind(session.started_by)
        .bind(session.status.as_str())
        .bind(session.started_at)
        .bind(session.ended_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn update_session(&mut self, session: &Session) -> Result<(), DomainError> {
        let result =
            sqlx::query("UPDATE sessions SET status = $2, ended_at = $3 WHERE id = $1")
                .bind(session.id)
                .bind(session.status.as_str())
                .bind(session.ended_at)
                .execute(&mut *self.tx)
                .await
                .map_err(db)?;
        expect_row(result, "session", session.id)
    }

    async fn find_session(&mut self, session_id: Uuid) -> Result<Option<Session>, DomainError> {
        sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?
        .as_ref()
        .map(rows::session)
        .transpose()
    }

    async fn holding_sessions(&mut self, game_id: Uuid) -> Result<Vec<Session>, DomainError> {
        sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions \
             WHERE game_id = $1 AND status IN ('active', 'paused') ORDER BY started_at, id"
        ))
        .bind(game_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?
        .iter()
        .map(rows::session)
        .collect()
    }

    async fn session_players(
        &mut self,
        session_id: Uuid,
    ) -> Result<Vec<SessionPlayer>, DomainError> {
        sqlx::query(
            "SELECT session_id, patient_id, joined_at FROM session_players \
             WHERE session_id = $1 ORDER BY ordinal",
        )
        .bind(session_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?
        .iter()
        .map(rows::session_player)
        .collect()
    }

    async fn insert_session_player(&mut self, player: &SessionPlayer) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO session_players (session_id, patient_id, joined_at) VALUES ($1, $2, $3)",
        )
        .bind(player.session_id)
        .bind(player.patient_id)
        .bind(player.joined_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn delete_session_player(
        &mut self,
        session_id: Uuid,
        patient_id: Uuid,
    ) -> Result<(), DomainError> {
        let result =
            sqlx::query("DELETE FROM session_players WHERE session_id = $1 AND patient_id = $2")
                .bind(session_id)
                .bind(patient_id)
                .execute(&mut *self.tx)
                .await
                .map_err(db)?;
        expect_row(result, "session_player", patient_id)
    }

    async fn insert_event_definition(
        &mut self,
        definition: &EventDefinition,
    ) -> Result<(), DomainError> {
        sqlx::query(&format!(
            "INSERT INTO event_definitions ({EVENT_DEFINITION_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)"
        ))
        .bind(definition.id)
        .bind(definition.session_id)
        .bind(definition.game_id)
        .bind(&definition.name)
        .bind(&definition.expression)
        .bind(definition.color_restriction.map(|c| c.as_str()))
        .bind(definition.target_roll_total)
        .bind(definition.target_roll_detail.as_ref().map(Json))
        .bind(definition.is_active)
        .bind(definition.created_by)
        .bind(definition.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn update_event_definition(
        &mut self,
        definition: &EventDefinition,
    ) -> Result<(), DomainError> {
        let result = sqlx::query("UPDATE event_definitions SET is_active = $2 WHERE id = $1")
            .bind(definition.id)
            .bind(definition.is_active)
            .execute(&mut *self.tx)
            .await
            .map_err(db)?;
        expect_row(result, "event_definition", definition.id)
    }

    async fn find_event_definition(
        &mut self,
        definition_id: Uuid,
    ) -> Result<Option<EventDefinition>, DomainError> {
        sqlx::query(&format!(
            "SELECT {EVENT_DEFINITION_COLUMNS} FROM event_definitions WHERE id = $1"
        ))
        .bind(definition_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?
        .as_ref()
        .map(rows::event_definition)
        .transpose()
    }

    async fn event_definitions(
        &mut self,
        session_id: Uuid,
    ) -> Result<Vec<EventDefinition>, DomainError> {
        sqlx::query(&format!(
            "SELECT {EVENT_DEFINITION_COLUMNS} FROM event_definitions \
             WHERE session_id = $1 ORDER BY created_at, id"
        ))
        .bind(session_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?
        .iter()
        .map(rows::event_definition)
        .collect()
    }

    async fn insert_ability_usage(&mut self, usage: &EventAbilityUsage) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO event_ability_usages (id, event_def_id, ghost_id, ability_id, used_at) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(usage.id)
        .bind(usage.event_def_id)
        .bind(usage.ghost_id)
        .bind(usage.ability_id)
        .bind(usage.used_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn insert_comm_request(
        &mut self,
        request: &CommunicationRequest,
    ) -> Result<(), DomainError> {
        sqlx::query(&format!(
            "INSERT INTO communication_requests ({COMM_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(request.id)
        .bind(request.game_id)
        .bind(request.initiator_patient_id)
        .bind(request.target_patient_id)
        .bind(request.status.as_str())
        .bind(request.transferred_ability_id)
        .bind(request.created_at)
        .bind(request.resolved_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn update_comm_request(
        &mut self,
        request: &CommunicationRequest,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE communication_requests SET status = $2, transferred_ability_id = $3, \
             resolved_at = $4 WHERE id = $1",
        )
        .bind(request.id)
        .bind(request.status.as_str())
        .bind(request.transferred_ability_id)
        .bind(request.resolved_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        expect_row(result, "communication_request", request.id)
    }

    async fn find_comm_request(
        &mut self,
        request_id: Uuid,
    ) -> Result<Option<CommunicationRequest>, DomainError> {
        sqlx::query(&format!(
            "SELECT {COMM_COLUMNS} FROM communication_requests WHERE id = $1"
        ))
        .bind(request_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?
        .as_ref()
        .map(rows::comm_request)
        .transpose()
    }

    async fn pending_comm_between(
        &mut self,
        a: Uuid,
        b: Uuid,
    ) -> Result<Option<CommunicationRequest>, DomainError> {
        sqlx::query(&format!(
            "SELECT {COMM_COLUMNS} FROM communication_requests WHERE status = 'pending' \
             AND ((initiator_patient_id = $1 AND target_patient_id = $2) \
             OR (initiator_patient_id = $2 AND target_patient_id = $1)) LIMIT 1"
        ))
        .bind(a)
        .bind(b)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(db)?
        .as_ref()
        .map(rows::comm_request)
        .transpose()
    }

    async fn last_seq(&mut self, stream_id: Uuid) -> Result<Option<i64>, DomainError> {
        let row = sqlx::query("SELECT MAX(seq) AS last_seq FROM timeline_events WHERE stream_id = $1")
            .bind(stream_id)
            .fetch_one(&mut *self.tx)
            .await
            .map_err(db)?;
        row.try_get("last_seq").map_err(db)
    }

    async fn append_timeline(&mut self, event: &TimelineEvent) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO timeline_events (id, game_id, session_id, stream_id, seq, event_type, \
             actor_id, data, result, narrative, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(event.id)
        .bind(event.game_id)
        .bind(event.session_id)
        .bind(event.stream_id())
        .bind(event.seq)
        .bind(&event.event_type)
        .bind(event.actor_id)
        .bind(&event.data)
        .bind(&event.result)
        .bind(&event.narrative)
        .bind(event.created_at)
        .execute(&mut *self.tx)
        .await
        .map_err(db)?;
        Ok(())
    }

    async fn session_timeline(
        &mut self,
        session_id: Uuid,
        page: Page,
    ) -> Result<Vec<TimelineEvent>, DomainError> {
        sqlx::query(&format!(
            "SELECT {TIMELINE_COLUMNS} FROM timeline_events \
             WHERE session_id = $1 ORDER BY seq LIMIT $2 OFFSET $3"
        ))
        .bind(session_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?
        .iter()
        .map(rows::timeline_event)
        .collect()
    }

    async fn game_timeline(
        &mut self,
        game_id: Uuid,
        page: Page,
    ) -> Result<Vec<TimelineEvent>, DomainError> {
        sqlx::query(&format!(
            "SELECT {TIMELINE_COLUMNS} FROM timeline_events \
             WHERE game_id = $1 ORDER BY position LIMIT $2 OFFSET $3"
        ))
        .bind(game_id)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(db)?
        .iter()
        .map(rows::timeline_event)
        .collect()
    }

    async fn commit(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.commit().await.map_err(db)
    }

    async fn rollback(self: Box<Self>) -> Result<(), DomainError> {
        self.tx.rollback().await.map_err(db)
    }
}
