//! Shared application state.

use std::sync::{Arc, Mutex};

use dg_core::clock::Clock;
use dg_core::rng::DeterministicRng;
use dg_dispatch::application::dispatcher::Dispatcher;
use dg_dispatch::store::Store;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Routes bot events.
    pub dispatcher: Dispatcher,
    /// Persistence for admin commands and queries.
    pub store: Arc<dyn Store>,
    /// Clock for admin commands.
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        rng: Arc<Mutex<dyn DeterministicRng + Send>>,
    ) -> Self {
        let dispatcher = Dispatcher::new(Arc::clone(&store), Arc::clone(&clock), rng);
        Self {
            dispatcher,
            store,
            clock,
        }
    }
}
