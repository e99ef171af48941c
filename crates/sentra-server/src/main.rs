//! Sentra server - standalone entry point for the compliance backend API
//!
//! This crate is a thin wrapper around `sentra-api` providing a runnable
//! binary for deployments without modifying the library crate.

use anyhow::Result;
use sentra_api::{SentraServer, ServerConfig};

#[tokio::main]
async fn main() -> Result<()> {
    sentra_api::init_tracing();

    tracing::info!("Starting Sentra compliance backend...");

    // PaaS compatibility: map a bare $PORT to SENTRA_PORT
    if let Ok(port) = std::env::var("PORT") {
        if std::env::var("SENTRA_PORT").is_err() {
            std::env::set_var("SENTRA_PORT", port);
        }
    }

    let config = ServerConfig::from_env();

    let server = SentraServer::new(config).await.map_err(|e| {
        tracing::error!("Failed to initialize server: {}", e);
        anyhow::anyhow!(e.to_string())
    })?;

    server.run().await.map_err(|e| {
        tracing::error!("Server error during execution: {}", e);
        anyhow::anyhow!(e.to_string())
    })?;

    Ok(())
}
