//! Action metadata lookup.
//!
//! Supplements the evaluation core with a read-only view of configured
//! actions (name, status, recovery mode) for callers such as an escalator
//! that need to describe an action without re-deriving its configuration.
//! Does not participate in condition/action evaluation.

use shared::models::{ActionInfoRow, ActionRecoveryMode, EventSource};

#[derive(Debug, Clone)]
pub struct ActionInfo {
    pub actionid: i64,
    pub name: String,
    pub status: i16,
    pub eventsource: EventSource,
    pub esc_period: String,
    pub recovery: ActionRecoveryMode,
}

/// Load metadata for the given actions. Rows with an undecodable
/// `eventsource`/`recovery` are skipped with a warning rather than
/// failing the whole lookup.
pub async fn get_actions_info(
    pool: &sqlx::PgPool,
    actionids: &[i64],
) -> anyhow::Result<Vec<ActionInfo>> {
    if actionids.is_empty() {
        return Ok(vec![]);
    }

    let rows: Vec<ActionInfoRow> = sqlx::query_as(
        r#"
        SELECT actionid, name, status, eventsource AS eventsource_raw, esc_period, recovery AS recovery_raw
        FROM actions
        WHERE actionid = ANY($1)
        "#,
    )
    .bind(actionids)
    .fetch_all(pool)
    .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let (Ok(eventsource), Ok(recovery)) = (
            EventSource::try_from(row.eventsource_raw),
            ActionRecoveryMode::try_from(row.recovery_raw),
        ) else {
            tracing::warn!(actionid = row.actionid, "skipping action with undecodable metadata");
            continue;
        };
        out.push(ActionInfo {
            actionid: row.actionid,
            name: row.name,
            status: row.status,
            eventsource,
            esc_period: row.esc_period,
            recovery,
        });
    }
    Ok(out)
}
