//! # ember-server
//!
//! Backend for the Ember matching app.
//!
//! This binary provides:
//! - **REST API** (axum) for swipes, the candidate feed, the match list,
//!   and direct messaging with seen-state reconciliation
//! - **WebSocket push** for `newMatch` / `newMessage` events, backed by an
//!   in-memory presence registry (best-effort, at-most-once delivery)
//! - **SQLite persistence** via `ember-store`

mod api;
mod config;
mod dispatch;
mod error;
mod presence;
mod ws;

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ember_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;
use crate::dispatch::Dispatcher;
use crate::presence::PresenceRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ember_server=debug")),
        )
        .init();

    info!("Starting Ember server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let db = match &config.db_path {
        Some(path) => Database::open_at(path)?,
        None => Database::new()?,
    };

    let presence = PresenceRegistry::new();
    let dispatcher = Dispatcher::new(presence.clone());

    let http_addr = config.http_addr;
    let state = AppState {
        db: Arc::new(Mutex::new(db)),
        presence,
        dispatcher,
        config: Arc::new(config),
    };

    // -----------------------------------------------------------------------
    // 4. Run the HTTP/WebSocket server (blocks until shutdown)
    // -----------------------------------------------------------------------
    // tokio::select! ensures that if either the HTTP server or a shutdown
    // signal arrives, we exit cleanly.
    tokio::select! {
        result = api::serve(state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
