//! HTTP API layer

mod error;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::client::TorrentClient;
use crate::config::{ConfigError, Settings};

pub use error::AppError;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    backends: Arc<BTreeMap<String, Arc<dyn TorrentClient>>>,
}

impl AppState {
    /// Build one client per configured backend
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        let clients = settings
            .backends
            .iter()
            .map(|backend| backend.create_client())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self::from_clients(clients))
    }

    pub fn from_clients(clients: impl IntoIterator<Item = Arc<dyn TorrentClient>>) -> Self {
        let backends = clients
            .into_iter()
            .map(|client| (client.name().to_string(), client))
            .collect();

        Self {
            backends: Arc::new(backends),
        }
    }

    /// Look up a backend by its configured name
    pub fn backend(&self, name: &str) -> Result<&Arc<dyn TorrentClient>, AppError> {
        self.backends
            .get(name)
            .ok_or_else(|| AppError::not_found(format!("Unknown backend: {}", name)))
    }

    pub fn backends(&self) -> impl Iterator<Item = &Arc<dyn TorrentClient>> {
        self.backends.values()
    }
}

/// Create the application router
pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Health check
        .route("/health", get(handlers::health))

        // Backends
        .route("/backends", get(handlers::backend::list))
        .route("/backends/{name}/test", post(handlers::backend::test))

        // Torrents
        .route(
            "/backends/{name}/torrents",
            get(handlers::torrent::list).post(handlers::torrent::add),
        )
        .route(
            "/backends/{name}/torrents/{id}",
            get(handlers::torrent::get_one).delete(handlers::torrent::remove),
        )
        .route("/backends/{name}/torrents/{id}/start", post(handlers::torrent::start))
        .route("/backends/{name}/torrents/{id}/pause", post(handlers::torrent::pause))
        .route("/backends/{name}/torrent-info", post(handlers::torrent::info));

    Router::new()
        .nest("/api", api_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
