//! dg rules engine API server entry point.

use std::error::Error;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use dg_api::config::ServerConfig;
use dg_api::error::AppError;
use dg_api::state::AppState;
use dg_api::{app, telemetry};
use dg_core::clock::SystemClock;
use dg_core::rng::{DeterministicRng, StdRngSource};
use dg_dispatch::memory::InMemoryStore;
use dg_dispatch::store::Store;
use dg_store::pg_store::PgStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = ServerConfig::from_env()?;
    let tracer_provider = telemetry::init(config.otlp_endpoint.as_deref())?;

    tracing::info!("Starting dg rules engine API server");

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections).await?;
            store.migrate().await?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; state is kept in memory and lost on exit");
            Arc::new(InMemoryStore::new())
        }
    };
    let rng: Arc<Mutex<dyn DeterministicRng + Send>> =
        Arc::new(Mutex::new(StdRngSource::from_os_rng()));
    let app_state = AppState::new(store, Arc::new(SystemClock), rng);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(AppError::Server)?;
    axum::serve(listener, app(app_state))
        .await
        .map_err(AppError::Server)?;

    telemetry::shutdown(tracer_provider);
    Ok(())
}
