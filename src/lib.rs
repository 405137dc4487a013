pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod response;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod state;
pub mod workers;

use std::sync::Arc;

use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::{Config, StoreBackend};
use crate::db::{ReviewStateStore, SqliteStore, StoreError};
use crate::services::ReviewStateService;
use crate::state::AppState;

pub fn create_app(service: Arc<ReviewStateService>) -> axum::Router {
    routes::router(AppState::new(service))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

pub async fn open_store(config: &Config) -> Result<ReviewStateStore, StoreError> {
    match config.store_backend {
        StoreBackend::Memory => Ok(ReviewStateStore::memory()),
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&config.sqlite_path).await?;
            Ok(ReviewStateStore::Sqlite(store))
        }
    }
}
