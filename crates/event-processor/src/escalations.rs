//! Escalation bookkeeper and the `process_actions` batch driver.

use crate::action_eval::check_action_conditions;
use crate::conditions::EvalContext;
use crate::operations::{execute_operations, HostOperations};
use shared::models::{
    event_flags, internal_state, trigger_value, ActionEval, ClosedEventPair, EscalationRow,
    EscalationStatus, Event, EventObject, EventSource, OperationRecord, OperationType,
};
use std::collections::HashMap;

/// True when `event` is a recovery (problem-resolved) event rather than a
/// problem event — recovery events never trigger their own escalations.
pub fn is_recovery_event(event: &Event) -> bool {
    match event.source {
        EventSource::Triggers => {
            event.object == EventObject::Trigger && event.value == trigger_value::OK
        }
        EventSource::Internal => match event.object {
            EventObject::Trigger | EventObject::Item | EventObject::LldRule => {
                event.value == internal_state::NORMAL
            }
            _ => false,
        },
        _ => false,
    }
}

struct NewEscalation {
    actionid: i64,
    eventid: i64,
    triggerid: Option<i64>,
    itemid: Option<i64>,
}

async fn load_operations(
    pool: &sqlx::PgPool,
    actionid: i64,
) -> anyhow::Result<Vec<OperationRecord>> {
    #[derive(sqlx::FromRow)]
    struct Row {
        operationtype_raw: i16,
        groupid: Option<i64>,
        templateid: Option<i64>,
        inventory_mode: Option<i32>,
    }

    let rows: Vec<Row> = sqlx::query_as(
        r#"
        SELECT o.operationtype AS operationtype_raw, og.groupid, ot.templateid, oi.inventory_mode
        FROM operations o
        LEFT JOIN opgroup og ON og.operationid = o.operationid
        LEFT JOIN optemplate ot ON ot.operationid = o.operationid
        LEFT JOIN opinventory oi ON oi.operationid = o.operationid
        WHERE o.actionid = $1
        "#,
    )
    .bind(actionid)
    .fetch_all(pool)
    .await?;

    let mut operations = Vec::with_capacity(rows.len());
    for row in rows {
        match OperationType::try_from(row.operationtype_raw) {
            Ok(operationtype) => operations.push(OperationRecord {
                operationtype,
                groupid: row.groupid,
                templateid: row.templateid,
                inventory_mode: row.inventory_mode,
            }),
            Err(_) => tracing::warn!(
                actionid,
                operationtype = row.operationtype_raw,
                "unknown operationtype, skipping operation"
            ),
        }
    }
    Ok(operations)
}

/// The escalation bookkeeper and action-evaluation batch driver.
///
/// `actions` should cover every action whose `eventsource` appears among
/// `events`; actions are filtered per-event by source inside the loop.
/// `closed_events` must be sorted ascending by `problem_eventid`.
pub async fn process_actions(
    ctx: &EvalContext<'_>,
    host_ops: &dyn HostOperations,
    events: &[Event],
    actions: &[ActionEval],
    closed_events: &[ClosedEventPair],
) -> anyhow::Result<()> {
    debug_assert!(
        closed_events
            .windows(2)
            .all(|w| w[0].problem_eventid <= w[1].problem_eventid),
        "closed_events must be sorted by problem_eventid"
    );

    let mut new_escalations = Vec::new();

    for event in events {
        if is_recovery_event(event) {
            continue;
        }
        if !event.has_flag(event_flags::CREATE) || event.has_flag(event_flags::NO_ACTION) {
            continue;
        }

        for action in actions.iter().filter(|a| a.eventsource == event.source) {
            match check_action_conditions(ctx, event, action).await {
                Ok(true) => {}
                Ok(false) => continue,
                Err(err) => {
                    tracing::error!(
                        actionid = action.actionid,
                        eventid = event.eventid,
                        error = %err,
                        "failed to evaluate action conditions, skipping this action for this event"
                    );
                    continue;
                }
            }

            let (triggerid, itemid) = match event.object {
                EventObject::Trigger => (Some(event.objectid), None),
                EventObject::Item | EventObject::LldRule => (None, Some(event.objectid)),
                _ => (None, None),
            };
            new_escalations.push(NewEscalation {
                actionid: action.actionid,
                eventid: event.eventid,
                triggerid,
                itemid,
            });

            if matches!(
                event.source,
                EventSource::Discovery | EventSource::AutoRegistration
            ) {
                match load_operations(ctx.pool, action.actionid).await {
                    Ok(operations) => {
                        if let Err(err) =
                            execute_operations(ctx.pool, host_ops, event, &operations).await
                        {
                            tracing::error!(
                                actionid = action.actionid,
                                eventid = event.eventid,
                                error = %err,
                                "immediate operations execution failed"
                            );
                        }
                    }
                    Err(err) => tracing::error!(
                        actionid = action.actionid,
                        error = %err,
                        "failed to load operations for action"
                    ),
                }
            }
        }
    }

    let mut recovery_updates: HashMap<i64, Vec<i64>> = HashMap::new();
    if !closed_events.is_empty() {
        let problem_eventids: Vec<i64> =
            closed_events.iter().map(|p| p.problem_eventid).collect();
        let escalations: Vec<EscalationRow> = sqlx::query_as(
            "SELECT escalationid, actionid, eventid FROM escalations WHERE eventid = ANY($1)",
        )
        .bind(&problem_eventids)
        .fetch_all(ctx.pool)
        .await?;

        for row in escalations {
            match closed_events.binary_search_by_key(&row.eventid, |p| p.problem_eventid) {
                Ok(idx) => {
                    let recovery_eventid = closed_events[idx].recovery_eventid;
                    recovery_updates
                        .entry(recovery_eventid)
                        .or_default()
                        .push(row.escalationid);
                }
                Err(_) => {
                    tracing::error!(
                        sentinel = "THIS_SHOULD_NEVER_HAPPEN",
                        eventid = row.eventid,
                        "escalation references a problem eventid missing from closed_events"
                    );
                }
            }
        }
    }

    if recovery_updates.is_empty() && new_escalations.is_empty() {
        return Ok(());
    }

    let mut tx = ctx.pool.begin().await?;

    for (recovery_eventid, escalationids) in &recovery_updates {
        sqlx::query("UPDATE escalations SET r_eventid = $1 WHERE escalationid = ANY($2)")
            .bind(recovery_eventid)
            .bind(escalationids)
            .execute(&mut *tx)
            .await?;
    }

    for esc in &new_escalations {
        sqlx::query(
            r#"
            INSERT INTO escalations (actionid, triggerid, itemid, eventid, r_eventid, status)
            VALUES ($1, $2, $3, $4, 0, $5)
            "#,
        )
        .bind(esc.actionid)
        .bind(esc.triggerid)
        .bind(esc.itemid)
        .bind(esc.eventid)
        .bind(i16::from(EscalationStatus::Active))
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger_event(value: i32) -> Event {
        Event {
            eventid: 1,
            source: EventSource::Triggers,
            object: EventObject::Trigger,
            objectid: 1,
            value,
            clock: 0,
            flags: event_flags::CREATE,
            acknowledged: false,
            tags: vec![],
            trigger: None,
        }
    }

    #[test]
    fn recovery_event_trigger_source() {
        assert!(is_recovery_event(&trigger_event(trigger_value::OK)));
        assert!(!is_recovery_event(&trigger_event(trigger_value::PROBLEM)));
    }

    #[test]
    fn recovery_event_internal_source_item() {
        let mut event = trigger_event(internal_state::NORMAL);
        event.source = EventSource::Internal;
        event.object = EventObject::Item;
        assert!(is_recovery_event(&event));
        event.value = internal_state::NOT_SUPPORTED;
        assert!(!is_recovery_event(&event));
    }

    #[test]
    fn no_action_flag_is_respected_by_caller_filter() {
        let mut event = trigger_event(trigger_value::PROBLEM);
        event.flags = event_flags::CREATE | event_flags::NO_ACTION;
        assert!(event.has_flag(event_flags::NO_ACTION));
    }
}
