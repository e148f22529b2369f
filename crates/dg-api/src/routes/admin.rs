//! Admin routes: setting up games, places and characters.

use axum::extract::{Path, State};
use axum::{
    Json, Router,
    routing::{get, post},
};
use dg_character::domain::aggregates::{Archives, PrintAbility, SwapFile};
use dg_character::domain::commands::{CreateGhost, CreatePatient, NewAbility};
use dg_core::color::{Cmyk, SoulColor};
use dg_dispatch::application::command_handlers;
use dg_dispatch::application::query_handlers::{self, CharacterView};
use dg_game::domain::aggregates::{GameStatus, Location, PlayerRole, Region};
use dg_game::domain::commands::{AddPlayer, CreateGame, CreateLocation, CreateRegion};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request body for POST /games.
#[derive(Debug, Deserialize)]
pub struct CreateGameRequest {
    /// Display name.
    pub name: String,
    /// The creating user, enrolled as DM.
    #[serde(alias = "user_id")]
    pub created_by: Uuid,
    /// Rules configuration.
    #[serde(default)]
    pub config: Option<serde_json::Value>,
}

/// Response body for POST /games.
#[derive(Debug, Serialize)]
pub struct GameCreatedResponse {
    /// New game identifier.
    pub game_id: Uuid,
    /// Display name.
    pub name: String,
    /// Always `preparing`.
    pub status: GameStatus,
    /// The DM.
    pub created_by: Uuid,
    /// Rules configuration.
    pub config: Option<serde_json::Value>,
}

/// Request body for POST /games/{game_id}/players.
#[derive(Debug, Deserialize)]
pub struct AddPlayerRequest {
    /// The joining user.
    #[serde(alias = "user_id")]
    pub player_id: Uuid,
    /// DM or PL; PL when omitted.
    #[serde(default)]
    pub role: Option<PlayerRole>,
}

/// Response body for POST /games/{game_id}/players.
#[derive(Debug, Serialize)]
pub struct PlayerAddedResponse {
    /// The game.
    pub game_id: Uuid,
    /// The user.
    pub player_id: Uuid,
    /// Granted role.
    pub role: PlayerRole,
}

/// Request body for POST /games/{game_id}/regions.
#[derive(Debug, Deserialize)]
pub struct CreateRegionRequest {
    /// Short code, unique within the game.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Listing order.
    #[serde(default)]
    pub sort_order: i32,
}

/// Response body for POST /games/{game_id}/regions.
#[derive(Debug, Serialize)]
pub struct RegionCreatedResponse {
    /// New region identifier.
    pub region_id: Uuid,
    /// Short code.
    pub code: String,
    /// Display name.
    pub name: String,
}

/// Response body for GET /games/{game_id}/regions.
#[derive(Debug, Serialize)]
pub struct RegionsResponse {
    /// Regions ordered by sort order, then code.
    pub regions: Vec<Region>,
}

/// Request body for POST /regions/{region_id}/locations.
#[derive(Debug, Deserialize)]
pub struct CreateLocationRequest {
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: Option<String>,
    /// Free-form content shown to players.
    #[serde(default)]
    pub content: Option<String>,
    /// Listing order.
    #[serde(default)]
    pub sort_order: i32,
}

/// Response body for POST /regions/{region_id}/locations.
#[derive(Debug, Serialize)]
pub struct LocationCreatedResponse {
    /// New location identifier.
    pub location_id: Uuid,
    /// Containing region.
    pub region_id: Uuid,
    /// Display name.
    pub name: String,
}

/// Response body for GET /regions/{region_id}/locations.
#[derive(Debug, Serialize)]
pub struct LocationsResponse {
    /// Locations ordered by sort order, then name.
    pub locations: Vec<Location>,
}

/// Request body for POST /characters/patient.
#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    /// The owning user.
    #[serde(alias = "user_id")]
    pub player_id: Uuid,
    /// The game.
    pub game_id: Uuid,
    /// Display name.
    pub name: String,
    /// Soul color.
    pub soul_color: SoulColor,
    /// Gender.
    #[serde(default)]
    pub gender: Option<String>,
    /// Age.
    #[serde(default)]
    pub age: Option<i32>,
    /// Social identity.
    #[serde(default)]
    pub identity: Option<String>,
    /// Portrait image.
    #[serde(default)]
    pub portrait_url: Option<String>,
    /// Archive text per color.
    #[serde(default, alias = "archives")]
    pub personality_archives: Archives,
    /// Ideal projection.
    #[serde(default)]
    pub ideal_projection: Option<String>,
    /// Starting region.
    #[serde(default)]
    pub current_region_id: Option<Uuid>,
    /// Starting location.
    #[serde(default)]
    pub current_location_id: Option<Uuid>,
}

/// Response body for POST /characters/patient.
#[derive(Debug, Serialize)]
pub struct PatientCreatedResponse {
    /// New patient identifier.
    pub patient_id: Uuid,
    /// Display name.
    pub name: String,
    /// The patient's SWAP file.
    pub swap_file: SwapFile,
}

/// Request body for POST /characters/ghost.
#[derive(Debug, Deserialize)]
pub struct CreateGhostRequest {
    /// The game.
    pub game_id: Uuid,
    /// Display name.
    pub name: String,
    /// Patient the ghost comes from and inhabits, unless overridden below.
    #[serde(default)]
    pub patient_id: Option<Uuid>,
    /// Patient the ghost inhabits.
    #[serde(default)]
    pub current_patient_id: Option<Uuid>,
    /// Patient the ghost was made from.
    #[serde(default)]
    pub origin_patient_id: Option<Uuid>,
    /// The creating user.
    #[serde(default, alias = "creator_user_id")]
    pub creator_player_id: Option<Uuid>,
    /// Soul color; taken from the origin patient when omitted.
    #[serde(default)]
    pub soul_color: Option<SoulColor>,
    /// Appearance.
    #[serde(default)]
    pub appearance: Option<String>,
    /// Personality.
    #[serde(default)]
    pub personality: Option<String>,
    /// Attribute override.
    #[serde(default)]
    pub cmyk: Option<Cmyk>,
    /// Current HP.
    #[serde(default)]
    pub hp: Option<i32>,
    /// Maximum HP.
    #[serde(default)]
    pub hp_max: Option<i32>,
    /// Current MP.
    #[serde(default)]
    pub mp: Option<i32>,
    /// Maximum MP.
    #[serde(default)]
    pub mp_max: Option<i32>,
    /// Starting abilities.
    #[serde(default, alias = "abilities")]
    pub print_abilities: Vec<NewAbility>,
}

/// Response body for POST /characters/ghost.
#[derive(Debug, Serialize)]
pub struct GhostCreatedResponse {
    /// New ghost identifier.
    pub ghost_id: Uuid,
    /// Display name.
    pub name: String,
    /// Attribute vector.
    pub cmyk: Cmyk,
    /// Current HP.
    pub hp: i32,
    /// Maximum HP.
    pub hp_max: i32,
    /// Current MP.
    pub mp: i32,
    /// Maximum MP.
    pub mp_max: i32,
    /// Abilities with their new identifiers.
    pub print_abilities: Vec<PrintAbility>,
}

/// POST /games
#[instrument(skip(state, request), fields(created_by = %request.created_by))]
async fn create_game(
    State(state): State<AppState>,
    Json(request): Json<CreateGameRequest>,
) -> Result<Json<GameCreatedResponse>, ApiError> {
    let command = CreateGame {
        correlation_id: Uuid::new_v4(),
        name: request.name,
        created_by: request.created_by,
        config: request.config,
    };

    let (game, dm) =
        command_handlers::handle_create_game(&command, state.clock.as_ref(), &*state.store)
            .await?;

    Ok(Json(GameCreatedResponse {
        game_id: game.id,
        name: game.name,
        status: game.status,
        created_by: dm.user_id,
        config: game.config,
    }))
}

/// POST /games/{game_id}/players
#[instrument(skip(state, request), fields(player_id = %request.player_id))]
async fn add_player(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<AddPlayerRequest>,
) -> Result<Json<PlayerAddedResponse>, ApiError> {
    let command = AddPlayer {
        correlation_id: Uuid::new_v4(),
        game_id,
        user_id: request.player_id,
        role: request.role.unwrap_or(PlayerRole::Pl),
    };

    info!(correlation_id = %command.correlation_id, "handling add_player command");

    let player =
        command_handlers::handle_add_player(&command, state.clock.as_ref(), &*state.store)
            .await?;

    Ok(Json(PlayerAddedResponse {
        game_id: player.game_id,
        player_id: player.user_id,
        role: player.role,
    }))
}

/// POST /games/{game_id}/regions
#[instrument(skip(state, request), fields(code = %request.code))]
async fn create_region(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
    Json(request): Json<CreateRegionRequest>,
) -> Result<Json<RegionCreatedResponse>, ApiError> {
    let command = CreateRegion {
        correlation_id: Uuid::new_v4(),
        game_id,
        code: request.code,
        name: request.name,
        description: request.description,
        sort_order: request.sort_order,
    };

    let region =
        command_handlers::handle_create_region(&command, state.clock.as_ref(), &*state.store)
            .await?;

    Ok(Json(RegionCreatedResponse {
        region_id: region.id,
        code: region.code,
        name: region.name,
    }))
}

/// GET /games/{game_id}/regions
#[instrument(skip(state))]
async fn list_regions(
    State(state): State<AppState>,
    Path(game_id): Path<Uuid>,
) -> Result<Json<RegionsResponse>, ApiError> {
    let regions = query_handlers::list_regions(&*state.store, game_id).await?;
    Ok(Json(RegionsResponse { regions }))
}

/// POST /regions/{region_id}/locations
#[instrument(skip(state, request))]
async fn create_location(
    State(state): State<AppState>,
    Path(region_id): Path<Uuid>,
    Json(request): Json<CreateLocationRequest>,
) -> Result<Json<LocationCreatedResponse>, ApiError> {
    let command = CreateLocation {
        correlation_id: Uuid::new_v4(),
        region_id,
        name: request.name,
        description: request.description,
        content: request.content,
        sort_order: request.sort_order,
    };

    let location =
        command_handlers::handle_create_location(&command, state.clock.as_ref(), &*state.store)
            .await?;

    Ok(Json(LocationCreatedResponse {
        location_id: location.id,
        region_id: location.region_id,
        name: location.name,
    }))
}

/// GET /regions/{region_id}/locations
#[instrument(skip(state))]
async fn list_locations(
    State(state): State<AppState>,
    Path(region_id): Path<Uuid>,
) -> Result<Json<LocationsResponse>, ApiError> {
    let locations = query_handlers::list_locations(&*state.store, region_id).await?;
    Ok(Json(LocationsResponse { locations }))
}

/// POST /characters/patient
#[instrument(skip(state, request), fields(game_id = %request.game_id))]
async fn create_patient(
    State(state): State<AppState>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Json<PatientCreatedResponse>, ApiError> {
    let command = CreatePatient {
        correlation_id: Uuid::new_v4(),
        game_id: request.game_id,
        user_id: request.player_id,
        name: request.name,
        gender: request.gender,
        age: request.age,
        identity: request.identity,
        portrait_url: request.portrait_url,
        soul_color: request.soul_color,
        archives: request.personality_archives,
        ideal_projection: request.ideal_projection,
        current_region_id: request.current_region_id,
        current_location_id: request.current_location_id,
    };

    let (patient, swap_file) =
        command_handlers::handle_create_patient(&command, state.clock.as_ref(), &*state.store)
            .await?;

    Ok(Json(PatientCreatedResponse {
        patient_id: patient.id,
        name: patient.name,
        swap_file,
    }))
}

/// POST /characters/ghost
#[instrument(skip(state, request), fields(game_id = %request.game_id))]
async fn create_ghost(
    State(state): State<AppState>,
    Json(request): Json<CreateGhostRequest>,
) -> Result<Json<GhostCreatedResponse>, ApiError> {
    let command = CreateGhost {
        correlation_id: Uuid::new_v4(),
        game_id: request.game_id,
        creator_user_id: request.creator_player_id,
        name: request.name,
        appearance: request.appearance,
        personality: request.personality,
        current_patient_id: request.current_patient_id.or(request.patient_id),
        origin_patient_id: request.origin_patient_id.or(request.patient_id),
        soul_color: request.soul_color,
        cmyk: request.cmyk,
        hp: request.hp,
        hp_max: request.hp_max,
        mp: request.mp,
        mp_max: request.mp_max,
        abilities: request.print_abilities,
    };

    let ghost =
        command_handlers::handle_create_ghost(&command, state.clock.as_ref(), &*state.store)
            .await?;

    Ok(Json(GhostCreatedResponse {
        ghost_id: ghost.id,
        name: ghost.name,
        cmyk: ghost.cmyk,
        hp: ghost.hp,
        hp_max: ghost.hp_max,
        mp: ghost.mp,
        mp_max: ghost.mp_max,
        print_abilities: ghost.abilities,
    }))
}

/// GET /characters/{character_id}
#[instrument(skip(state))]
async fn get_character(
    State(state): State<AppState>,
    Path(character_id): Path<Uuid>,
) -> Result<Json<CharacterView>, ApiError> {
    Ok(Json(
        query_handlers::get_character(&*state.store, character_id).await?,
    ))
}

/// Returns the admin router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/games", post(create_game))
        .route("/games/{game_id}/players", post(add_player))
        .route(
            "/games/{game_id}/regions",
            post(create_region).get(list_regions),
        )
        .route(
            "/regions/{region_id}/locations",
            post(create_location).get(list_locations),
        )
        .route("/characters/patient", post(create_patient))
        .route("/characters/ghost", post(create_ghost))
        .route("/characters/{character_id}", get(get_character))
}
