//! Event Processor
//!
//! Listens to PostgreSQL NOTIFY events and runs them through the
//! event-action evaluation core.

use anyhow::{Context, Result};
use shared::{db, Config};
use tokio::signal;

mod bin_support;
mod listener;

#[tokio::main]
async fn main() -> Result<()> {
    shared::init_tracing();

    tracing::info!("Starting Event Processor...");

    let config = Config::from_env().context("Failed to load configuration")?;

    let db_pool = db::create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;

    db::check_health(&db_pool)
        .await
        .context("Database health check failed")?;

    let listener_handle = tokio::spawn({
        let db_pool = db_pool.clone();
        async move { listener::start_listening(db_pool).await }
    });

    tokio::select! {
        result = signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            tracing::info!("Shutdown signal received, stopping Event Processor...");
        }
        result = listener_handle => {
            match result {
                Ok(Ok(())) => {
                    tracing::warn!("Listener exited cleanly (unexpected)");
                }
                Ok(Err(e)) => {
                    tracing::error!("Listener failed: {:#}", e);
                    return Err(e.context("Event listener failed"));
                }
                Err(e) => {
                    tracing::error!("Listener task panicked: {}", e);
                    anyhow::bail!("Event listener task panicked: {}", e);
                }
            }
        }
    }

    Ok(())
}
