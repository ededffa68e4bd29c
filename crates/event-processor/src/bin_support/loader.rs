//! Loads events, actions and closed-event pairs for a batch of event ids.
//!
//! This is the plumbing the real configuration cache and event table would
//! provide; it exists so `main`/`listener` have something concrete to call
//! `process_actions` with. Schema details here are illustrative of what a
//! configuration cache already knows, not part of the evaluation core.

use event_processor::is_recovery_event;
use shared::models::{
    ActionEval, Condition, ClosedEventPair, Event, EventObject, EventSource, EventTag,
    EventTriggerInfo,
};
use sqlx::PgPool;
use std::collections::HashMap;

pub async fn fetch_events(pool: &PgPool, eventids: &[i64]) -> anyhow::Result<Vec<Event>> {
    if eventids.is_empty() {
        return Ok(vec![]);
    }

    #[derive(sqlx::FromRow)]
    struct Row {
        eventid: i64,
        source_raw: i16,
        object_raw: i16,
        objectid: i64,
        value: i32,
        clock: i64,
        flags: i32,
        acknowledged: bool,
    }

    let rows: Vec<Row> = sqlx::query_as(
        r#"
        SELECT eventid, source AS source_raw, object AS object_raw, objectid, value, clock, flags, acknowledged
        FROM events
        WHERE eventid = ANY($1)
        ORDER BY eventid
        "#,
    )
    .bind(eventids)
    .fetch_all(pool)
    .await?;

    let tags: Vec<(i64, EventTag)> = sqlx::query_as(
        "SELECT eventid, tag, value FROM event_tag WHERE eventid = ANY($1)",
    )
    .bind(eventids)
    .fetch_all(pool)
    .await?;
    let mut tags_by_event: HashMap<i64, Vec<EventTag>> = HashMap::new();
    for (eventid, tag) in tags {
        tags_by_event.entry(eventid).or_default().push(tag);
    }

    let mut events = Vec::with_capacity(rows.len());
    for row in rows {
        let Ok(source) = EventSource::try_from(row.source_raw) else {
            tracing::error!(eventid = row.eventid, "unknown event source, dropping event");
            continue;
        };
        let Ok(object) = EventObject::try_from(row.object_raw) else {
            tracing::error!(eventid = row.eventid, "unknown event object, dropping event");
            continue;
        };

        let trigger = if object == EventObject::Trigger {
            sqlx::query_as::<_, EventTriggerInfo>(
                "SELECT description, priority FROM triggers WHERE triggerid = $1",
            )
            .bind(row.objectid)
            .fetch_optional(pool)
            .await?
        } else {
            None
        };

        events.push(Event {
            eventid: row.eventid,
            source,
            object,
            objectid: row.objectid,
            value: row.value,
            clock: row.clock,
            flags: row.flags,
            acknowledged: row.acknowledged,
            tags: tags_by_event.remove(&row.eventid).unwrap_or_default(),
            trigger,
        });
    }

    Ok(events)
}

pub async fn fetch_actions_for_sources(
    pool: &PgPool,
    sources: &[EventSource],
) -> anyhow::Result<Vec<ActionEval>> {
    if sources.is_empty() {
        return Ok(vec![]);
    }
    let source_values: Vec<i16> = sources.iter().map(|s| i16::from(*s)).collect();

    #[derive(sqlx::FromRow)]
    struct ActionRow {
        actionid: i64,
        eventsource_raw: i16,
        evaltype_raw: i16,
        formula: String,
    }

    let action_rows: Vec<ActionRow> = sqlx::query_as(
        r#"
        SELECT actionid, eventsource AS eventsource_raw, evaltype AS evaltype_raw, formula
        FROM actions
        WHERE status = 0 AND eventsource = ANY($1)
        "#,
    )
    .bind(&source_values)
    .fetch_all(pool)
    .await?;

    if action_rows.is_empty() {
        return Ok(vec![]);
    }
    let actionids: Vec<i64> = action_rows.iter().map(|a| a.actionid).collect();

    let mut conditions: Vec<Condition> = sqlx::query_as(
        r#"
        SELECT conditionid, actionid, conditiontype AS conditiontype_raw, operator AS operator_raw, value, value2
        FROM conditions
        WHERE actionid = ANY($1)
        ORDER BY actionid, conditiontype_raw
        "#,
    )
    .bind(&actionids)
    .fetch_all(pool)
    .await?;

    let mut conditions_by_action: HashMap<i64, Vec<Condition>> = HashMap::new();
    for condition in conditions.drain(..) {
        conditions_by_action
            .entry(condition.actionid)
            .or_default()
            .push(condition);
    }

    let mut actions = Vec::with_capacity(action_rows.len());
    for row in action_rows {
        let (Ok(eventsource), Ok(evaltype)) = (
            shared::models::EventSource::try_from(row.eventsource_raw),
            shared::models::EvalType::try_from(row.evaltype_raw),
        ) else {
            tracing::error!(actionid = row.actionid, "skipping action with undecodable metadata");
            continue;
        };
        actions.push(ActionEval {
            actionid: row.actionid,
            eventsource,
            evaltype,
            formula: row.formula,
            conditions: conditions_by_action.remove(&row.actionid).unwrap_or_default(),
        });
    }

    Ok(actions)
}

/// Pairs up recovery events present in this batch with the problem events
/// they resolve, for `process_actions`'s `closed_events` argument. Sorted
/// ascending by `problem_eventid`, satisfying `process_actions`'s
/// precondition.
pub async fn fetch_closed_events(
    pool: &PgPool,
    events: &[Event],
) -> anyhow::Result<Vec<ClosedEventPair>> {
    let recovery_eventids: Vec<i64> = events
        .iter()
        .filter(|e| is_recovery_event(e))
        .map(|e| e.eventid)
        .collect();
    if recovery_eventids.is_empty() {
        return Ok(vec![]);
    }

    let mut pairs: Vec<ClosedEventPair> = sqlx::query_as(
        r#"
        SELECT eventid AS problem_eventid, r_eventid AS recovery_eventid
        FROM event_recovery
        WHERE r_eventid = ANY($1)
        "#,
    )
    .bind(&recovery_eventids)
    .fetch_all(pool)
    .await?;

    pairs.sort_unstable_by_key(|p| p.problem_eventid);
    Ok(pairs)
}
