//! Row decoding.

use std::str::FromStr;

use dg_character::domain::aggregates::{Ghost, Patient, PrintAbility};
use dg_character::domain::communication::CommunicationRequest;
use dg_character::domain::economy::{Buff, ColorFragment};
use dg_core::error::DomainError;
use dg_core::timeline::TimelineEvent;
use dg_game::domain::aggregates::{Game, GamePlayer, Location, Region};
use dg_session::domain::aggregates::{Session, SessionPlayer};
use dg_session::domain::event_definition::EventDefinition;
use dg_session::domain::scope::Scope;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{Decode, Postgres, Row, Type};

use crate::error::{StoreError, db};

fn get<'r, T>(row: &'r PgRow, column: &str) -> Result<T, DomainError>
where
    T: Decode<'r, Postgres> + Type<Postgres>,
{
    row.try_get(column).map_err(db)
}

fn parse<T: FromStr>(row: &PgRow, column: &str, label: &'static str) -> Result<T, DomainError> {
    let value: String = get(row, column)?;
    value.parse().map_err(|_| {
        StoreError::Corrupt {
            column: label,
            value,
        }
        .into()
    })
}

fn parse_opt<T: FromStr>(
    row: &PgRow,
    column: &str,
    label: &'static str,
) -> Result<Option<T>, DomainError> {
    let value: Option<String> = get(row, column)?;
    value
        .map(|value| {
            value.parse().map_err(|_| {
                StoreError::Corrupt {
                    column: label,
                    value,
                }
                .into()
            })
        })
        .transpose()
}

fn json<T>(row: &PgRow, column: &str) -> Result<T, DomainError>
where
    T: serde::de::DeserializeOwned,
{
    Ok(get::<Json<T>>(row, column)?.0)
}

pub(crate) fn game(row: &PgRow) -> Result<Game, DomainError> {
    Ok(Game {
        id: get(row, "id")?,
        name: get(row, "name")?,
        status: parse(row, "status", "games.status")?,
        config: get(row, "config")?,
        flags: get(row, "flags")?,
        created_by: get(row, "created_by")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn game_player(row: &PgRow) -> Result<GamePlayer, DomainError> {
    Ok(GamePlayer {
        game_id: get(row, "game_id")?,
        user_id: get(row, "user_id")?,
        role: parse(row, "role", "game_players.role")?,
        active_patient_id: get(row, "active_patient_id")?,
        joined_at: get(row, "joined_at")?,
    })
}

pub(crate) fn region(row: &PgRow) -> Result<Region, DomainError> {
    Ok(Region {
        id: get(row, "id")?,
        game_id: get(row, "game_id")?,
        code: get(row, "code")?,
        name: get(row, "name")?,
        description: get(row, "description")?,
        sort_order: get(row, "sort_order")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn location(row: &PgRow) -> Result<Location, DomainError> {
    Ok(Location {
        id: get(row, "id")?,
        region_id: get(row, "region_id")?,
        game_id: get(row, "game_id")?,
        name: get(row, "name")?,
        description: get(row, "description")?,
        content: get(row, "content")?,
        sort_order: get(row, "sort_order")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn patient(row: &PgRow) -> Result<Patient, DomainError> {
    Ok(Patient {
        id: get(row, "id")?,
        game_id: get(row, "game_id")?,
        user_id: get(row, "user_id")?,
        name: get(row, "name")?,
        gender: get(row, "gender")?,
        age: get(row, "age")?,
        identity: get(row, "identity")?,
        portrait_url: get(row, "portrait_url")?,
        soul_color: parse(row, "soul_color", "patients.soul_color")?,
        archives: json(row, "archives")?,
        ideal_projection: get(row, "ideal_projection")?,
        current_region_id: get(row, "current_region_id")?,
        current_location_id: get(row, "current_location_id")?,
        created_at: get(row, "created_at")?,
    })
}

/// Decodes the ghost row itself; abilities and buffs are loaded separately.
pub(crate) fn ghost(row: &PgRow) -> Result<Ghost, DomainError> {
    Ok(Ghost {
        id: get(row, "id")?,
        game_id: get(row, "game_id")?,
        current_patient_id: get(row, "current_patient_id")?,
        origin_patient_id: get(row, "origin_patient_id")?,
        creator_user_id: get(row, "creator_user_id")?,
        name: get(row, "name")?,
        appearance: get(row, "appearance")?,
        personality: get(row, "personality")?,
        cmyk: json(row, "cmyk")?,
        hp: get(row, "hp")?,
        hp_max: get(row, "hp_max")?,
        mp: get(row, "mp")?,
        mp_max: get(row, "mp_max")?,
        origin: json(row, "origin")?,
        archive_unlock: json(row, "archive_unlock")?,
        origin_name_unlocked: get(row, "origin_name_unlocked")?,
        origin_identity_unlocked: get(row, "origin_identity_unlocked")?,
        abilities: Vec::new(),
        buffs: Vec::new(),
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn print_ability(row: &PgRow) -> Result<PrintAbility, DomainError> {
    Ok(PrintAbility {
        id: get(row, "id")?,
        ghost_id: get(row, "ghost_id")?,
        name: get(row, "name")?,
        description: get(row, "description")?,
        color: parse(row, "color", "print_abilities.color")?,
        ability_count: get(row, "ability_count")?,
    })
}

pub(crate) fn buff(row: &PgRow) -> Result<Buff, DomainError> {
    Ok(Buff {
        id: get(row, "id")?,
        ghost_id: get(row, "ghost_id")?,
        game_id: get(row, "game_id")?,
        name: get(row, "name")?,
        expression: get(row, "expression")?,
        buff_type: parse(row, "buff_type", "buffs.buff_type")?,
        remaining_rounds: get(row, "remaining_rounds")?,
        created_by: get(row, "created_by")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn fragment(row: &PgRow) -> Result<ColorFragment, DomainError> {
    Ok(ColorFragment {
        id: get(row, "id")?,
        game_id: get(row, "game_id")?,
        holder_ghost_id: get(row, "holder_ghost_id")?,
        color: parse(row, "color", "color_fragments.color")?,
        value: get(row, "value")?,
        redeemed: get(row, "redeemed")?,
        redeemed_at: get(row, "redeemed_at")?,
    })
}

pub(crate) fn session(row: &PgRow) -> Result<Session, DomainError> {
    Ok(Session {
        id: get(row, "id")?,
        game_id: get(row, "game_id")?,
        scope: Scope::from_parts(get(row, "region_id")?, get(row, "location_id")?)?,
        started_by: get(row, "started_by")?,
        status: parse(row, "status", "sessions.status")?,
        started_at: get(row, "started_at")?,
        ended_at: get(row, "ended_at")?,
    })
}

pub(crate) fn session_player(row: &PgRow) -> Result<SessionPlayer, DomainError> {
    Ok(SessionPlayer {
        session_id: get(row, "session_id")?,
        patient_id: get(row, "patient_id")?,
        joined_at: get(row, "joined_at")?,
    })
}

pub(crate) fn event_definition(row: &PgRow) -> Result<EventDefinition, DomainError> {
    Ok(EventDefinition {
        id: get(row, "id")?,
        session_id: get(row, "session_id")?,
        game_id: get(row, "game_id")?,
        name: get(row, "name")?,
        expression: get(row, "expression")?,
        color_restriction: parse_opt(
            row,
            "color_restriction",
            "event_definitions.color_restriction",
        )?,
        target_roll_total: get(row, "target_roll_total")?,
        target_roll_detail: get::<Option<Json<Vec<u32>>>>(row, "target_roll_detail")?
            .map(|detail| detail.0),
        is_active: get(row, "is_active")?,
        created_by: get(row, "created_by")?,
        created_at: get(row, "created_at")?,
    })
}

pub(crate) fn comm_request(row: &PgRow) -> Result<CommunicationRequest, DomainError> {
    Ok(CommunicationRequest {
        id: get(row, "id")?,
        game_id: get(row, "game_id")?,
        initiator_patient_id: get(row, "initiator_patient_id")?,
        target_patient_id: get(row, "target_patient_id")?,
        status: parse(row, "status", "communication_requests.status")?,
        transferred_ability_id: get(row, "transferred_ability_id")?,
        created_at: get(row, "created_at")?,
        resolved_at: get(row, "resolved_at")?,
    })
}

pub(crate) fn timeline_event(row: &PgRow) -> Result<TimelineEvent, DomainError> {
    Ok(TimelineEvent {
        id: get(row, "id")?,
        game_id: get(row, "game_id")?,
        session_id: get(row, "session_id")?,
        seq: get(row, "seq")?,
        event_type: get(row, "event_type")?,
        actor_id: get(row, "actor_id")?,
        data: get(row, "data")?,
        result: get(row, "result")?,
        narrative: get(row, "narrative")?,
        created_at: get(row, "created_at")?,
    })
}
