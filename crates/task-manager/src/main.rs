//! Task Manager
//!
//! Periodically processes the `task` queue — currently only
//! `CLOSE_PROBLEM` tasks raised by event acknowledgment actions — on a
//! 5-second wall-clock cadence.

use anyhow::{Context, Result};
use close_problem::DbProblemCloser;
use shared::{db, Config};
use std::time::Duration;
use tokio::signal;
use trigger_lock::RedisTriggerLock;

mod close_problem;
mod error;
mod tasks;
mod trigger_lock;

const TASKMANAGER_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    shared::init_tracing();

    tracing::info!("Starting Task Manager...");

    let config = Config::from_env().context("Failed to load configuration")?;

    let db_pool = db::create_pool(&config.database)
        .await
        .context("Failed to create database pool")?;

    db::check_health(&db_pool)
        .await
        .context("Database health check failed")?;

    let redis_client = redis::Client::open(config.trigger_lock.connection_url())
        .context("Failed to create trigger-lock Redis client")?;
    let trigger_lock = RedisTriggerLock::new(redis_client, config.trigger_lock.lock_ttl_ms);
    let problem_closer = DbProblemCloser::new(db_pool.clone());

    tracing::info!("Task Manager ready, polling every {:?}", TASKMANAGER_TIMEOUT);

    let mut sighup = hangup_signal()?;
    let mut ticker = aligned_ticker(TASKMANAGER_TIMEOUT);

    loop {
        tokio::select! {
            result = signal::ctrl_c() => {
                result.context("Failed to listen for shutdown signal")?;
                tracing::info!("Shutdown signal received, stopping Task Manager...");
                break;
            }
            _ = sighup.recv() => {
                tracing::info!("SIGHUP received, reloading logging filter");
                shared::init_tracing();
            }
            _ = ticker.tick() => {
                let started = std::time::Instant::now();
                match tasks::tm_process_tasks(&db_pool, &trigger_lock, &problem_closer).await {
                    Ok(processed) => {
                        tracing::info!(
                            processed,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "processed {} task(s)", processed
                        );
                    }
                    Err(e) => {
                        tracing::error!("Error processing tasks: {}", e);
                    }
                }
            }
        }
    }

    Ok(())
}

/// A ticker aligned to wall-clock multiples of `period`, matching the
/// original's `sleeptime = TIMEOUT - now % TIMEOUT` alignment so polls
/// land on the same clock boundaries across restarts.
fn aligned_ticker(period: Duration) -> tokio::time::Interval {
    let period_secs = period.as_secs();
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let initial_delay = period_secs - now % period_secs;

    let start = tokio::time::Instant::now() + Duration::from_secs(initial_delay);
    tokio::time::interval_at(start, period)
}

#[cfg(unix)]
fn hangup_signal() -> Result<tokio::signal::unix::Signal> {
    tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
        .context("Failed to install SIGHUP handler")
}

#[cfg(not(unix))]
fn hangup_signal() -> Result<NeverFires> {
    Ok(NeverFires)
}

#[cfg(not(unix))]
struct NeverFires;

#[cfg(not(unix))]
impl NeverFires {
    async fn recv(&mut self) -> Option<()> {
        std::future::pending().await
    }
}
