//! Integration tests for `PgStore`. They need a live database:
//! `DATABASE_URL=postgres://... cargo test -p dg-store -- --ignored`.

use std::sync::{Arc, Mutex};

use dg_core::error::DomainError;
use dg_core::rng::DeterministicRng;
use dg_core::timeline::{Page, TimelineEvent};
use dg_dispatch::application::command_handlers::{handle_add_player, handle_create_game};
use dg_dispatch::application::dispatcher::Dispatcher;
use dg_dispatch::domain::events::GameEvent;
use dg_dispatch::store::Store;
use dg_game::domain::aggregates::{Game, PlayerRole};
use dg_game::domain::commands::{AddPlayer, CreateGame};
use dg_store::pg_store::PgStore;
use dg_test_support::{FixedClock, MockRng, fixed_now};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

fn timeline_event(game_id: Uuid, seq: i64) -> TimelineEvent {
    TimelineEvent {
        id: Uuid::new_v4(),
        game_id,
        session_id: None,
        seq,
        event_type: "game_start".to_owned(),
        actor_id: None,
        data: json!({ "event_type": "game_start" }),
        result: json!({}),
        narrative: None,
        created_at: fixed_now(),
    }
}

async fn seed_game(store: &PgStore) -> Game {
    let game = Game::new(Uuid::new_v4(), "Grey Hill".to_owned(), None, None, fixed_now());
    let mut uow = store.begin().await.unwrap();
    uow.insert_game(&game).await.unwrap();
    uow.commit().await.unwrap();
    game
}

// --- games ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_game_round_trip(pool: PgPool) {
    let store = PgStore::new(pool);
    let game = seed_game(&store).await;

    let mut uow = store.begin().await.unwrap();
    let loaded = uow.lock_game(game.id).await.unwrap();
    uow.rollback().await.unwrap();

    assert_eq!(loaded, game);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_lock_game_reports_missing_game(pool: PgPool) {
    let store = PgStore::new(pool);

    let mut uow = store.begin().await.unwrap();
    let result = uow.lock_game(Uuid::new_v4()).await;

    assert!(matches!(result, Err(DomainError::NotFound { entity: "game", .. })));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_duplicate_player_is_conflict(pool: PgPool) {
    let store = PgStore::new(pool);
    let clock = FixedClock::default();
    let dm = Uuid::new_v4();
    let (game, _) = handle_create_game(
        &CreateGame {
            correlation_id: Uuid::new_v4(),
            name: "Grey Hill".to_owned(),
            created_by: dm,
            config: None,
        },
        &clock,
        &store,
    )
    .await
    .unwrap();

    let result = handle_add_player(
        &AddPlayer {
            correlation_id: Uuid::new_v4(),
            game_id: game.id,
            user_id: dm,
            role: PlayerRole::Pl,
        },
        &clock,
        &store,
    )
    .await;

    assert!(matches!(result, Err(DomainError::Conflict(_))));
}

// --- timeline ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_sequence_is_unique_per_stream(pool: PgPool) {
    let store = PgStore::new(pool);
    let game = seed_game(&store).await;

    let mut uow = store.begin().await.unwrap();
    uow.append_timeline(&timeline_event(game.id, 1)).await.unwrap();
    let duplicate = uow.append_timeline(&timeline_event(game.id, 1)).await;

    assert!(matches!(duplicate, Err(DomainError::Conflict(_))));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_rollback_discards_timeline_entries(pool: PgPool) {
    let store = PgStore::new(pool);
    let game = seed_game(&store).await;

    let mut uow = store.begin().await.unwrap();
    uow.append_timeline(&timeline_event(game.id, 1)).await.unwrap();
    uow.rollback().await.unwrap();

    let mut uow = store.begin().await.unwrap();
    assert_eq!(uow.last_seq(game.id).await.unwrap(), None);
    let events = uow
        .game_timeline(game.id, Page::new(100, 0).unwrap())
        .await
        .unwrap();
    assert!(events.is_empty());
}

// --- dispatcher over postgres ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires DATABASE_URL"]
async fn test_dispatcher_sequences_game_stream(pool: PgPool) {
    let store = Arc::new(PgStore::new(pool));
    let clock = FixedClock::default();
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> = Arc::new(Mutex::new(MockRng));
    let dispatcher = Dispatcher::new(store.clone(), Arc::new(clock), rng);
    let dm = Uuid::new_v4();
    let (game, _) = handle_create_game(
        &CreateGame {
            correlation_id: Uuid::new_v4(),
            name: "Grey Hill".to_owned(),
            created_by: dm,
            config: None,
        },
        &clock,
        &*store,
    )
    .await
    .unwrap();
    let event = |event_type: &str| GameEvent {
        game_id: game.id,
        session_id: None,
        player_id: Some(dm),
        payload: json!({ "event_type": event_type }),
        narrative: None,
        correlation_id: Uuid::new_v4(),
    };

    dispatcher.dispatch(event("game_start")).await.unwrap();
    dispatcher.dispatch(event("game_pause")).await.unwrap();
    let session = dispatcher.dispatch(event("session_start")).await;

    assert!(matches!(session, Err(DomainError::InvalidTransition { .. })));
    let mut uow = store.begin().await.unwrap();
    let events = uow
        .game_timeline(game.id, Page::new(100, 0).unwrap())
        .await
        .unwrap();
    let seqs: Vec<i64> = events.iter().map(|e| e.seq).collect();
    assert_eq!(seqs, vec![1, 2]);
}
