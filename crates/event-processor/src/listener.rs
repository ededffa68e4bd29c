//! PostgreSQL NOTIFY/LISTEN implementation.
//!
//! Collects eventids notified on the `new_event` channel into small
//! batches (bounded by either a time window or a size cap, whichever
//! comes first) and hands each batch to `process_actions` as a unit —
//! matching the batch-oriented, N+1-avoiding loading style the original
//! event processing loop uses.

use crate::bin_support::loader;
use anyhow::{Context, Result};
use event_processor::conditions::{AlwaysInPeriod, EvalContext, FlatHostGroupCache, NoopMacroSubstitutor};
use event_processor::process_actions;
use shared::DbPool;
use sqlx::postgres::PgListener;
use std::time::Duration;

const BATCH_WINDOW: Duration = Duration::from_millis(200);
const BATCH_MAX: usize = 500;

/// Host-operations sink used when no real configuration-cache RPC client
/// is wired up; logs the operation instead of performing it.
struct LoggingHostOperations;

#[async_trait::async_trait]
impl event_processor::HostOperations for LoggingHostOperations {
    async fn host_add(&self, hostid: i64) -> anyhow::Result<()> {
        tracing::info!(hostid, "op: host_add");
        Ok(())
    }
    async fn host_remove(&self, hostid: i64) -> anyhow::Result<()> {
        tracing::info!(hostid, "op: host_remove");
        Ok(())
    }
    async fn host_enable(&self, hostid: i64) -> anyhow::Result<()> {
        tracing::info!(hostid, "op: host_enable");
        Ok(())
    }
    async fn host_disable(&self, hostid: i64) -> anyhow::Result<()> {
        tracing::info!(hostid, "op: host_disable");
        Ok(())
    }
    async fn host_inventory_mode(&self, hostid: i64, mode: i32) -> anyhow::Result<()> {
        tracing::info!(hostid, mode, "op: host_inventory_mode");
        Ok(())
    }
    async fn groups_add(&self, hostid: i64, groupids: &[i64]) -> anyhow::Result<()> {
        tracing::info!(hostid, ?groupids, "op: groups_add");
        Ok(())
    }
    async fn groups_remove(&self, hostid: i64, groupids: &[i64]) -> anyhow::Result<()> {
        tracing::info!(hostid, ?groupids, "op: groups_remove");
        Ok(())
    }
    async fn templates_add(&self, hostid: i64, templateids: &[i64]) -> anyhow::Result<()> {
        tracing::info!(hostid, ?templateids, "op: templates_add");
        Ok(())
    }
    async fn templates_remove(&self, hostid: i64, templateids: &[i64]) -> anyhow::Result<()> {
        tracing::info!(hostid, ?templateids, "op: templates_remove");
        Ok(())
    }
}

/// Start listening to PostgreSQL NOTIFY events on the `new_event` channel.
pub async fn start_listening(db_pool: DbPool) -> Result<()> {
    let mut listener = PgListener::connect_with(&db_pool)
        .await
        .context("Failed to create PostgreSQL listener")?;

    listener
        .listen("new_event")
        .await
        .context("Failed to listen to 'new_event' channel")?;

    tracing::info!("Listening for PostgreSQL NOTIFY events on channel 'new_event'");

    let mut pending: Vec<i64> = Vec::new();

    loop {
        match tokio::time::timeout(BATCH_WINDOW, listener.recv()).await {
            Ok(Ok(notification)) => {
                if let Ok(eventid) = notification.payload().parse::<i64>() {
                    pending.push(eventid);
                } else {
                    tracing::warn!(payload = notification.payload(), "non-numeric event id in notification");
                }
                if pending.len() < BATCH_MAX {
                    continue;
                }
            }
            Ok(Err(e)) => {
                tracing::error!("Error receiving notification: {}", e);
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
            Err(_) => {
                // Batch window elapsed; fall through and flush whatever we have.
            }
        }

        if pending.is_empty() {
            continue;
        }

        let batch = std::mem::take(&mut pending);
        if let Err(e) = process_batch(&db_pool, &batch).await {
            tracing::error!("Error processing event batch {:?}: {:#}", batch, e);
        }
    }
}

async fn process_batch(db_pool: &DbPool, eventids: &[i64]) -> Result<()> {
    let events = loader::fetch_events(db_pool, eventids).await?;
    if events.is_empty() {
        return Ok(());
    }

    let sources: Vec<_> = {
        let mut s: Vec<_> = events.iter().map(|e| e.source).collect();
        s.dedup_by_key(|source| i16::from(*source));
        s
    };
    let actions = loader::fetch_actions_for_sources(db_pool, &sources).await?;
    let closed_events = loader::fetch_closed_events(db_pool, &events).await?;

    let host_groups = FlatHostGroupCache;
    let time_periods = AlwaysInPeriod;
    let macros = NoopMacroSubstitutor;
    let ctx = EvalContext {
        pool: db_pool,
        host_groups: &host_groups,
        time_periods: &time_periods,
        macros: &macros,
    };
    let host_ops = LoggingHostOperations;

    process_actions(&ctx, &host_ops, &events, &actions, &closed_events).await?;
    tracing::info!(count = events.len(), "processed event batch");
    Ok(())
}
