//! `EVENT_SOURCE_TRIGGERS` condition evaluation.

use super::{string_matches, EvalContext};
use shared::models::{Condition, ConditionType, Event};

pub async fn check_trigger_condition(
    ctx: &EvalContext<'_>,
    event: &Event,
    condition: &Condition,
) -> anyhow::Result<bool> {
    let Some(conditiontype) = ConditionType::from_trigger_source(condition.conditiontype_raw)
    else {
        tracing::error!(
            sentinel = "THIS_SHOULD_NEVER_HAPPEN",
            conditiontype = condition.conditiontype_raw,
            "unsupported conditiontype for trigger-source condition"
        );
        return Ok(false);
    };
    let op = match condition.operator() {
        Ok(op) => op,
        Err(_) => {
            tracing::warn!(
                operator = condition.operator_raw,
                "unsupported operator on trigger condition, treating as no-match"
            );
            return Ok(false);
        }
    };

    match conditiontype {
        ConditionType::HostGroup => check_host_group(ctx, event, &condition.value, op).await,
        ConditionType::Host => check_host(ctx, event, &condition.value, op).await,
        ConditionType::Trigger => check_trigger(ctx, event, &condition.value, op).await,
        ConditionType::HostTemplate => check_host_template(ctx, event, &condition.value, op).await,
        ConditionType::TriggerName => check_trigger_name(ctx, event, &condition.value, op),
        ConditionType::TriggerSeverity => check_trigger_severity(event, &condition.value, op),
        ConditionType::TriggerValue => check_trigger_value(event, &condition.value, op),
        ConditionType::TimePeriod => {
            Ok(ctx
                .time_periods
                .check_time_period(&condition.value, event.clock)
                .await?)
        }
        ConditionType::Maintenance => check_maintenance(ctx, event).await,
        ConditionType::EventAcknowledged => Ok(check_event_acknowledged(event, &condition.value)),
        ConditionType::ApplicationCond => {
            check_application(ctx, event, &condition.value, op).await
        }
        ConditionType::EventTagCond => Ok(check_event_tag(event, &condition.value, op)),
        ConditionType::EventTagValue => {
            Ok(check_event_tag_value(event, &condition.value, &condition.value2, op))
        }
        other => {
            tracing::error!(
                sentinel = "THIS_SHOULD_NEVER_HAPPEN",
                conditiontype = ?other,
                "conditiontype decoded but not handled for trigger source"
            );
            Ok(false)
        }
    }
}

async fn check_host_group(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    let groupid: i64 = match value.parse() {
        Ok(v) => v,
        Err(_) => return Ok(false),
    };

    // NOT_EQUAL intentionally does not expand nested groups: only the
    // exact group is checked on the negative side, matching the original
    // implementation's asymmetric behavior.
    let groupids = match op {
        NotEqual => vec![groupid],
        _ => ctx.host_groups.get_nested_hostgroupids(&[groupid]).await?,
    };
    if groupids.is_empty() {
        return Ok(matches!(op, NotEqual));
    }

    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM functions f
            JOIN items i ON i.itemid = f.itemid
            JOIN hosts_groups hg ON hg.hostid = i.hostid
            WHERE f.triggerid = $1 AND hg.groupid = ANY($2)
        )
        "#,
    )
    .bind(event.objectid)
    .bind(&groupids)
    .fetch_one(ctx.pool)
    .await?;

    Ok(match op {
        Equal => exists,
        NotEqual => !exists,
        _ => false,
    })
}

async fn check_host(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    let hostid: i64 = match value.parse() {
        Ok(v) => v,
        Err(_) => return Ok(false),
    };

    let exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM functions f
            JOIN items i ON i.itemid = f.itemid
            WHERE f.triggerid = $1 AND i.hostid = $2
        )
        "#,
    )
    .bind(event.objectid)
    .bind(hostid)
    .fetch_one(ctx.pool)
    .await?;

    Ok(match op {
        Equal => exists,
        NotEqual => !exists,
        _ => false,
    })
}

async fn check_trigger(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    let triggerid: i64 = match value.parse() {
        Ok(v) => v,
        Err(_) => return Ok(false),
    };

    // A trigger created from a template matches the condition if its own
    // id or any ancestor templateid equals the configured value.
    let matches: bool = sqlx::query_scalar(
        r#"
        WITH RECURSIVE lineage AS (
            SELECT triggerid, templateid FROM triggers WHERE triggerid = $1
            UNION ALL
            SELECT t.triggerid, t.templateid
            FROM triggers t
            JOIN lineage l ON t.triggerid = l.templateid
        )
        SELECT EXISTS(SELECT 1 FROM lineage WHERE triggerid = $2)
        "#,
    )
    .bind(event.objectid)
    .bind(triggerid)
    .fetch_one(ctx.pool)
    .await?;

    Ok(match op {
        Equal => matches,
        NotEqual => !matches,
        _ => false,
    })
}

/// Walks from the trigger's own discovery parent up through `templateid`
/// to see whether the configured template is an ancestor.
async fn check_host_template(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    let templateid: i64 = match value.parse() {
        Ok(v) => v,
        Err(_) => return Ok(false),
    };

    let parent: Option<i64> = sqlx::query_scalar(
        "SELECT parent_triggerid FROM trigger_discovery WHERE triggerid = $1",
    )
    .bind(event.objectid)
    .fetch_optional(ctx.pool)
    .await?;

    let found = match parent {
        Some(parent_triggerid) => {
            let found: bool = sqlx::query_scalar(
                r#"
                WITH RECURSIVE lineage AS (
                    SELECT triggerid, templateid FROM triggers WHERE triggerid = $1
                    UNION ALL
                    SELECT t.triggerid, t.templateid
                    FROM triggers t
                    JOIN lineage l ON t.triggerid = l.templateid
                )
                SELECT EXISTS(SELECT 1 FROM lineage WHERE triggerid = $2)
                "#,
            )
            .bind(parent_triggerid)
            .bind(templateid)
            .fetch_one(ctx.pool)
            .await?;
            found
        }
        None => false,
    };

    Ok(match op {
        Equal => found,
        NotEqual => !found,
        _ => false,
    })
}

fn check_trigger_name(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    let Some(info) = &event.trigger else {
        return Ok(false);
    };
    let expanded = ctx.macros.substitute_simple_macros(&info.description, event);
    Ok(string_matches(op, &expanded, value))
}

fn check_trigger_severity(
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    let Some(info) = &event.trigger else {
        return Ok(false);
    };
    let threshold: i32 = match value.parse() {
        Ok(v) => v,
        Err(_) => return Ok(false),
    };
    Ok(match op {
        Equal => info.priority == threshold,
        NotEqual => info.priority != threshold,
        MoreEqual => info.priority >= threshold,
        LessEqual => info.priority <= threshold,
        _ => false,
    })
}

fn check_trigger_value(
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    let expected: i32 = match value.parse() {
        Ok(v) => v,
        Err(_) => return Ok(false),
    };
    Ok(match op {
        Equal => event.value == expected,
        NotEqual => event.value != expected,
        _ => false,
    })
}

async fn check_maintenance(ctx: &EvalContext<'_>, event: &Event) -> anyhow::Result<bool> {
    const HOST_MAINTENANCE_STATUS_ON: i32 = 1;
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*)
        FROM functions f
        JOIN items i ON i.itemid = f.itemid
        JOIN hosts h ON h.hostid = i.hostid
        WHERE f.triggerid = $1 AND h.maintenance_status = $2
        "#,
    )
    .bind(event.objectid)
    .bind(HOST_MAINTENANCE_STATUS_ON)
    .fetch_one(ctx.pool)
    .await?;
    Ok(count > 0)
}

fn check_event_acknowledged(event: &Event, value: &str) -> bool {
    match value {
        "0" => !event.acknowledged,
        "1" => event.acknowledged,
        _ => false,
    }
}

async fn check_application(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    let names: Vec<String> = sqlx::query_scalar(
        r#"
        SELECT DISTINCT a.name
        FROM functions f
        JOIN items_applications ia ON ia.itemid = f.itemid
        JOIN applications a ON a.applicationid = ia.applicationid
        WHERE f.triggerid = $1
        "#,
    )
    .bind(event.objectid)
    .fetch_all(ctx.pool)
    .await?;

    // NOT_LIKE against zero application rows is true (there's nothing to
    // substring-match against, so nothing contradicts it); every other
    // operator fails against an empty set.
    if names.is_empty() {
        return Ok(matches!(op, NotLike));
    }

    Ok(names.iter().any(|n| string_matches(op, n, value)))
}

fn check_event_tag(event: &Event, tag: &str, op: shared::models::ConditionOperator) -> bool {
    use shared::models::ConditionOperator::*;
    let found = event.tags.iter().any(|t| string_matches(op, &t.tag, tag));
    match op {
        Equal | Like => found,
        NotEqual | NotLike => !found,
        _ => false,
    }
}

fn check_event_tag_value(
    event: &Event,
    tag: &str,
    value: &str,
    op: shared::models::ConditionOperator,
) -> bool {
    use shared::models::ConditionOperator::*;
    let found = event
        .tags
        .iter()
        .any(|t| t.tag == tag && string_matches(op, &t.value, value));
    match op {
        Equal | Like => found,
        NotEqual | NotLike => !found,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{ConditionOperator, EventObject, EventSource, EventTag};

    fn event_with_tags(tags: Vec<EventTag>) -> Event {
        Event {
            eventid: 1,
            source: EventSource::Triggers,
            object: EventObject::Trigger,
            objectid: 100,
            value: 1,
            clock: 0,
            flags: 0,
            acknowledged: false,
            tags,
            trigger: None,
        }
    }

    #[test]
    fn event_tag_equal_matches_tag_name_only() {
        let event = event_with_tags(vec![EventTag {
            tag: "scope".into(),
            value: "availability".into(),
        }]);
        assert!(check_event_tag(&event, "scope", ConditionOperator::Equal));
        assert!(!check_event_tag(&event, "severity", ConditionOperator::Equal));
    }

    #[test]
    fn event_tag_value_requires_both_tag_and_value() {
        let event = event_with_tags(vec![EventTag {
            tag: "scope".into(),
            value: "availability".into(),
        }]);
        assert!(check_event_tag_value(
            &event,
            "scope",
            "availability",
            ConditionOperator::Equal
        ));
        assert!(!check_event_tag_value(
            &event,
            "scope",
            "notification",
            ConditionOperator::Equal
        ));
    }

    #[test]
    fn event_acknowledged_condition() {
        let mut event = event_with_tags(vec![]);
        event.acknowledged = true;
        assert!(check_event_acknowledged(&event, "1"));
        assert!(!check_event_acknowledged(&event, "0"));
    }
}
