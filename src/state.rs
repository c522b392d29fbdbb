//! Shared application state handed to every handler.

use std::sync::Arc;

use axum::extract::FromRef;

use crate::config::Config;
use crate::db::DbPool;
use crate::services::event_bus::EventBus;

/// Everything a handler may need, cloned per request.
///
/// Handlers that only touch the database can keep extracting
/// `State<DbPool>` thanks to the `FromRef` implementation below.
#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub events: EventBus,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(pool: DbPool, events: EventBus, config: Config) -> Self {
        Self {
            pool,
            events,
            config: Arc::new(config),
        }
    }
}

impl FromRef<AppState> for DbPool {
    fn from_ref(state: &AppState) -> Self {
        state.pool.clone()
    }
}
