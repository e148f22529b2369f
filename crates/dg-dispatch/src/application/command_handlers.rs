//! Admin command handlers: setting up games, places and characters.
//!
//! These run outside the event registry and are not timeline-logged, but
//! each still executes inside a single unit of work.

use dg_character::domain::aggregates::{Ghost, Patient, SwapFile, VitalDefaults};
use dg_character::domain::commands::{CreateGhost, CreatePatient};
use dg_core::clock::Clock;
use dg_core::command::Command;
use dg_core::error::DomainError;
use dg_game::domain::aggregates::{Game, GamePlayer, Location, PlayerRole, Region};
use dg_game::domain::commands::{AddPlayer, CreateGame, CreateLocation, CreateRegion};
use dg_game::domain::config::GameConfig;
use tracing::info;
use uuid::Uuid;

use crate::store::{Store, UnitOfWork};

fn require_text(field: &str, value: &str) -> Result<String, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Validation(format!("{field} must not be empty")));
    }
    Ok(trimmed.to_owned())
}

fn applied(command: &dyn Command) {
    info!(
        command_type = command.command_type(),
        correlation_id = %command.correlation_id(),
        game_id = ?command.game_id(),
        "admin command applied"
    );
}

async fn open_game(uow: &mut dyn UnitOfWork, game_id: Uuid) -> Result<Game, DomainError> {
    let game = uow.lock_game(game_id).await?;
    game.ensure_not_ended("modify")?;
    Ok(game)
}

/// Handles `CreateGame`: persists the game and enrols its creator as DM.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a blank name or an unreadable
/// config, or an infrastructure error from the store.
pub async fn handle_create_game(
    command: &CreateGame,
    clock: &dyn Clock,
    store: &dyn Store,
) -> Result<(Game, GamePlayer), DomainError> {
    let name = require_text("name", &command.name)?;
    GameConfig::from_value(command.config.as_ref())?;
    let now = clock.now();
    let game = Game::new(
        Uuid::new_v4(),
        name,
        Some(command.created_by),
        command.config.clone(),
        now,
    );
    let dm = GamePlayer {
        game_id: game.id,
        user_id: command.created_by,
        role: PlayerRole::Dm,
        active_patient_id: None,
        joined_at: now,
    };

    let mut uow = store.begin().await?;
    uow.insert_game(&game).await?;
    uow.insert_game_player(&dm).await?;
    uow.commit().await?;

    applied(command);
    Ok((game, dm))
}

/// Handles `AddPlayer`.
///
/// # Errors
///
/// Returns `NotFound` for an unknown game, `InvalidTransition` once the game
/// has ended, or `Conflict` if the user already plays in it.
pub async fn handle_add_player(
    command: &AddPlayer,
    clock: &dyn Clock,
    store: &dyn Store,
) -> Result<GamePlayer, DomainError> {
    let mut uow = store.begin().await?;
    let game = open_game(&mut *uow, command.game_id).await?;
    let player = GamePlayer {
        game_id: game.id,
        user_id: command.user_id,
        role: command.role,
        active_patient_id: None,
        joined_at: clock.now(),
    };
    uow.insert_game_player(&player).await?;
    uow.commit().await?;
    applied(command);
    Ok(player)
}

/// Handles `CreateRegion`.
///
/// # Errors
///
/// Returns `NotFound` for an unknown game, `Validation` for blank fields, or
/// `Conflict` if the code is already used in the game.
pub async fn handle_create_region(
    command: &CreateRegion,
    clock: &dyn Clock,
    store: &dyn Store,
) -> Result<Region, DomainError> {
    let code = require_text("code", &command.code)?;
    let name = require_text("name", &command.name)?;
    let mut uow = store.begin().await?;
    let game = open_game(&mut *uow, command.game_id).await?;
    let region = Region {
        id: Uuid::new_v4(),
        game_id: game.id,
        code,
        name,
        description: command.description.clone(),
        sort_order: command.sort_order,
        created_at: clock.now(),
    };
    uow.insert_region(&region).await?;
    uow.commit().await?;
    applied(command);
    Ok(region)
}

/// Handles `CreateLocation`.
///
/// # Errors
///
/// Returns `NotFound` for an unknown region, or `Validation` for a blank name.
pub async fn handle_create_location(
    command: &CreateLocation,
    clock: &dyn Clock,
    store: &dyn Store,
) -> Result<Location, DomainError> {
    let name = require_text("name", &command.name)?;
    let mut uow = store.begin().await?;
    let region = uow
        .find_region(command.region_id)
        .await?
        .ok_or_else(|| DomainError::not_found("region", command.region_id))?;
    open_game(&mut *uow, region.game_id).await?;
    let location = Location {
        id: Uuid::new_v4(),
        region_id: region.id,
        game_id: region.game_id,
        name,
        description: command.description.clone(),
        content: command.content.clone(),
        sort_order: command.sort_order,
        created_at: clock.now(),
    };
    uow.insert_location(&location).await?;
    uow.commit().await?;
    applied(command);
    Ok(location)
}

/// Handles `CreatePatient` and returns the patient with its SWAP file. The
/// owner's active patient is set when they have none.
///
/// # Errors
///
/// Returns `NotFound` for an unknown game, region or location, `Validation`
/// if the owner does not play in the game or the position is inconsistent.
pub async fn handle_create_patient(
    command: &CreatePatient,
    clock: &dyn Clock,
    store: &dyn Store,
) -> Result<(Patient, SwapFile), DomainError> {
    let mut uow = store.begin().await?;
    let game = open_game(&mut *uow, command.game_id).await?;
    let mut owner = uow
        .find_game_player(game.id, command.user_id)
        .await?
        .ok_or_else(|| {
            DomainError::Validation(format!(
                "user {} does not take part in game {}",
                command.user_id, game.id
            ))
        })?;

    let mut command = command.clone();
    if let Some(location_id) = command.current_location_id {
        let location = uow
            .find_location(location_id)
            .await?
            .filter(|l| l.game_id == game.id)
            .ok_or_else(|| DomainError::not_found("location", location_id))?;
        if command
            .current_region_id
            .is_some_and(|r| r != location.region_id)
        {
            return Err(DomainError::Validation(format!(
                "location {location_id} is not in the given region"
            )));
        }
        command.current_region_id = Some(location.region_id);
    } else if let Some(region_id) = command.current_region_id {
        uow.find_region(region_id)
            .await?
            .filter(|r| r.game_id == game.id)
            .ok_or_else(|| DomainError::not_found("region", region_id))?;
    }

    let patient = Patient::create(Uuid::new_v4(), &command, clock.now())?;
    uow.insert_patient(&patient).await?;
    if owner.active_patient_id.is_none() {
        owner.active_patient_id = Some(patient.id);
        uow.update_game_player(&owner).await?;
    }
    uow.commit().await?;
    applied(&command);

    let swap = patient.swap_file();
    Ok((patient, swap))
}

/// Handles `CreateGhost`. HP and MP default to the game's configured
/// starting values.
///
/// # Errors
///
/// Returns `NotFound` for an unknown game or patient, `Validation` for
/// inconsistent input, or `Conflict` if a patient already has a ghost in the
/// same role.
pub async fn handle_create_ghost(
    command: &CreateGhost,
    clock: &dyn Clock,
    store: &dyn Store,
) -> Result<Ghost, DomainError> {
    let mut uow = store.begin().await?;
    let game = open_game(&mut *uow, command.game_id).await?;
    let config = GameConfig::from_value(game.config.as_ref())?;

    let origin = match command.origin_patient_id {
        Some(patient_id) => Some(
            uow.find_patient(patient_id)
                .await?
                .filter(|p| p.game_id == game.id)
                .ok_or_else(|| DomainError::not_found("patient", patient_id))?,
        ),
        None => None,
    };
    if let Some(patient_id) = command.current_patient_id {
        uow.find_patient(patient_id)
            .await?
            .filter(|p| p.game_id == game.id)
            .ok_or_else(|| DomainError::not_found("patient", patient_id))?;
    }

    let defaults = VitalDefaults {
        hp: config.initial_hp,
        mp: config.initial_mp,
    };
    let ghost = Ghost::create(Uuid::new_v4(), command, origin.as_ref(), defaults, clock.now())?;
    uow.insert_ghost(&ghost).await?;
    uow.commit().await?;
    applied(command);
    Ok(ghost)
}
