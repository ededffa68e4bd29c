//! `EVENT_SOURCE_INTERNAL` condition evaluation.
//!
//! Only valid for `event.object` in `{Trigger, Item, LldRule}` — any other
//! object short-circuits to no-match, matching the original's object-class
//! gate at the top of `check_internal_condition`.

use super::EvalContext;
use shared::models::{internal_state, Condition, ConditionType, Event, EventObject};

pub async fn check_internal_condition(
    ctx: &EvalContext<'_>,
    event: &Event,
    condition: &Condition,
) -> anyhow::Result<bool> {
    if !matches!(
        event.object,
        EventObject::Trigger | EventObject::Item | EventObject::LldRule
    ) {
        return Ok(false);
    }

    let Some(conditiontype) = ConditionType::from_internal_source(condition.conditiontype_raw)
    else {
        tracing::error!(
            sentinel = "THIS_SHOULD_NEVER_HAPPEN",
            conditiontype = condition.conditiontype_raw,
            "unsupported conditiontype for internal-source condition"
        );
        return Ok(false);
    };
    let op = match condition.operator() {
        Ok(op) => op,
        Err(_) => return Ok(false),
    };

    match conditiontype {
        ConditionType::EventType => Ok(check_event_type(event, &condition.value)),
        ConditionType::HostGroup => check_host_group(ctx, event, &condition.value, op).await,
        ConditionType::HostTemplate => check_host_template(ctx, event, &condition.value, op).await,
        ConditionType::Host => check_host(ctx, event, &condition.value, op).await,
        ConditionType::ApplicationCond => {
            check_application(ctx, event, &condition.value, op).await
        }
        other => {
            tracing::error!(
                sentinel = "THIS_SHOULD_NEVER_HAPPEN",
                conditiontype = ?other,
                "conditiontype decoded but not handled for internal source"
            );
            Ok(false)
        }
    }
}

/// `EVENT_TYPE_ITEM_NOTSUPPORTED` / `EVENT_TYPE_TRIGGER_UNKNOWN` /
/// `EVENT_TYPE_LLDRULE_NOTSUPPORTED`, classified from `event.object` and
/// `event.value`.
fn check_event_type(event: &Event, value: &str) -> bool {
    const EVENT_TYPE_ITEM_NOTSUPPORTED: &str = "0";
    const EVENT_TYPE_TRIGGER_UNKNOWN: &str = "1";
    const EVENT_TYPE_LLDRULE_NOTSUPPORTED: &str = "2";

    match (event.object, value) {
        (EventObject::Item, EVENT_TYPE_ITEM_NOTSUPPORTED) => {
            event.value == internal_state::NOT_SUPPORTED
        }
        (EventObject::Trigger, EVENT_TYPE_TRIGGER_UNKNOWN) => {
            event.value != internal_state::NORMAL
        }
        (EventObject::LldRule, EVENT_TYPE_LLDRULE_NOTSUPPORTED) => {
            event.value == internal_state::NOT_SUPPORTED
        }
        _ => false,
    }
}

fn object_table_and_function_column(object: EventObject) -> Option<(&'static str, &'static str)> {
    match object {
        EventObject::Trigger => Some(("functions", "triggerid")),
        _ => None,
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
    let groupids = match op {
        NotEqual => vec![groupid],
        _ => ctx.host_groups.get_nested_hostgroupids(&[groupid]).await?,
    };
    if groupids.is_empty() {
        return Ok(matches!(op, NotEqual));
    }

    let exists = if let Some((table, join_col)) = object_table_and_function_column(event.object) {
        sqlx::query_scalar(&format!(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM {table} f
                JOIN items i ON i.itemid = f.itemid
                JOIN hosts_groups hg ON hg.hostid = i.hostid
                WHERE f.{join_col} = $1 AND hg.groupid = ANY($2)
            )
            "#
        ))
        .bind(event.objectid)
        .bind(&groupids)
        .fetch_one(ctx.pool)
        .await?
    } else {
        sqlx::query_scalar(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM items i
                JOIN hosts_groups hg ON hg.hostid = i.hostid
                WHERE i.itemid = $1 AND hg.groupid = ANY($2)
            )
            "#,
        )
        .bind(event.objectid)
        .bind(&groupids)
        .fetch_one(ctx.pool)
        .await?
    };

    Ok(match op {
        Equal => exists,
        NotEqual => !exists,
        _ => false,
    })
}

/// Walks from the event's discovery source up through `templateid` to see
/// whether the configured template is an ancestor. For non-trigger
/// objects, only LLD-created items are followed — a plain item stops the
/// walk immediately, matching the original's `ZBX_FLAG_DISCOVERY_CREATED`
/// gate.
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

    let found = match event.object {
        EventObject::Trigger => {
            let parent: Option<i64> = sqlx::query_scalar(
                "SELECT parent_triggerid FROM trigger_discovery WHERE triggerid = $1",
            )
            .bind(event.objectid)
            .fetch_optional(ctx.pool)
            .await?;
            match parent {
                Some(parent_triggerid) => {
                    walk_trigger_templates(ctx, parent_triggerid, templateid).await?
                }
                None => false,
            }
        }
        EventObject::Item | EventObject::LldRule => {
            const ZBX_FLAG_DISCOVERY_CREATED: i32 = 0x04;
            let discovery_flag: Option<i32> =
                sqlx::query_scalar("SELECT flags FROM items WHERE itemid = $1")
                    .bind(event.objectid)
                    .fetch_optional(ctx.pool)
                    .await?;
            match discovery_flag {
                Some(flags) if flags & ZBX_FLAG_DISCOVERY_CREATED != 0 => {
                    let parent: Option<i64> = sqlx::query_scalar(
                        "SELECT parent_itemid FROM item_discovery WHERE itemid = $1",
                    )
                    .bind(event.objectid)
                    .fetch_optional(ctx.pool)
                    .await?;
                    match parent {
                        Some(parent_itemid) => {
                            walk_item_templates(ctx, parent_itemid, templateid).await?
                        }
                        None => false,
                    }
                }
                _ => false,
            }
        }
        _ => false,
    };

    Ok(match op {
        Equal => found,
        NotEqual => !found,
        _ => false,
    })
}

async fn walk_trigger_templates(
    ctx: &EvalContext<'_>,
    start_triggerid: i64,
    templateid: i64,
) -> anyhow::Result<bool> {
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
    .bind(start_triggerid)
    .bind(templateid)
    .fetch_one(ctx.pool)
    .await?;
    Ok(found)
}

async fn walk_item_templates(
    ctx: &EvalContext<'_>,
    start_itemid: i64,
    templateid: i64,
) -> anyhow::Result<bool> {
    let found: bool = sqlx::query_scalar(
        r#"
        WITH RECURSIVE lineage AS (
            SELECT itemid, templateid FROM items WHERE itemid = $1
            UNION ALL
            SELECT i.itemid, i.templateid
            FROM items i
            JOIN lineage l ON i.itemid = l.templateid
        )
        SELECT EXISTS(SELECT 1 FROM lineage WHERE itemid = $2)
        "#,
    )
    .bind(start_itemid)
    .bind(templateid)
    .fetch_one(ctx.pool)
    .await?;
    Ok(found)
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

    let exists = if let Some((table, join_col)) = object_table_and_function_column(event.object) {
        sqlx::query_scalar(&format!(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM {table} f
                JOIN items i ON i.itemid = f.itemid
                WHERE f.{join_col} = $1 AND i.hostid = $2
            )
            "#
        ))
        .bind(event.objectid)
        .bind(hostid)
        .fetch_one(ctx.pool)
        .await?
    } else {
        sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM items WHERE itemid = $1 AND hostid = $2)")
            .bind(event.objectid)
            .bind(hostid)
            .fetch_one(ctx.pool)
            .await?
    };

    Ok(match op {
        Equal => exists,
        NotEqual => !exists,
        _ => false,
    })
}

async fn check_application(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    let names: Vec<String> = if let Some((table, join_col)) =
        object_table_and_function_column(event.object)
    {
        sqlx::query_scalar(&format!(
            r#"
            SELECT DISTINCT a.name
            FROM {table} f
            JOIN items_applications ia ON ia.itemid = f.itemid
            JOIN applications a ON a.applicationid = ia.applicationid
            WHERE f.{join_col} = $1
            "#
        ))
        .bind(event.objectid)
        .fetch_all(ctx.pool)
        .await?
    } else {
        sqlx::query_scalar(
            r#"
            SELECT DISTINCT a.name
            FROM items_applications ia
            JOIN applications a ON a.applicationid = ia.applicationid
            WHERE ia.itemid = $1
            "#,
        )
        .bind(event.objectid)
        .fetch_all(ctx.pool)
        .await?
    };

    if names.is_empty() {
        return Ok(matches!(op, NotLike));
    }
    Ok(names
        .iter()
        .any(|n| super::string_matches(op, n, value)))
}
