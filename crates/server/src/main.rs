//! Server binary: wire the built-in commands to the HTTP transport.

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use textline_engine::{CommandRegistry, Store};
use textline_server::{router, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();

    let store = Store::open(&config.db)?;
    let mut registry = CommandRegistry::new();
    textline_commands::register_all(&mut registry)?;
    let state = AppState::new(Arc::new(registry), store.clone());

    let listener = tokio::net::TcpListener::bind(config.listen).await?;
    info!(addr = %config.listen, db = %config.db.display(), "server listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The debounced flush may still be pending; write synchronously
    // before exit.
    store.flush_now()?;
    info!("state flushed, shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("shutdown signal received");
}
