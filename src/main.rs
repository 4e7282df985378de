//! torrent-bridge - serve a uniform HTTP API over Deluge and Transmission daemons

use anyhow::{Context, Result};
use tracing::{info, warn};

use torrent_bridge::api::{self, AppState};
use torrent_bridge::config::Settings;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "torrent_bridge=info,tower_http=info".into()),
        )
        .init();

    info!("Starting torrent-bridge v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let settings = Settings::load()?;
    info!("Configuration loaded from {:?}", settings.config_path());

    if settings.backends.is_empty() {
        warn!("No backends configured");
    }
    for backend in &settings.backends {
        info!(
            "Backend {} ({}) at {}:{}, session {:?}",
            backend.name, backend.kind, backend.host, backend.port, backend.session
        );
    }

    let state = AppState::new(&settings).context("Failed to create backend clients")?;

    // Build router
    let app = api::create_router(state);

    // Start server
    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
