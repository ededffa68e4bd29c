//! `EVENT_SOURCE_AUTO_REGISTRATION` condition evaluation.

use super::{string_matches, EvalContext};
use shared::models::{Condition, ConditionType, Event};

pub async fn check_auto_registration_condition(
    ctx: &EvalContext<'_>,
    event: &Event,
    condition: &Condition,
) -> anyhow::Result<bool> {
    let Some(conditiontype) =
        ConditionType::from_auto_registration_source(condition.conditiontype_raw)
    else {
        tracing::error!(
            sentinel = "THIS_SHOULD_NEVER_HAPPEN",
            conditiontype = condition.conditiontype_raw,
            "unsupported conditiontype for auto-registration-source condition"
        );
        return Ok(false);
    };
    let op = match condition.operator() {
        Ok(op) => op,
        Err(_) => return Ok(false),
    };

    let row: Option<(String, String, i64)> = sqlx::query_as(
        "SELECT host, host_metadata, proxy_hostid FROM autoreg_host WHERE autoreg_hostid = $1",
    )
    .bind(event.objectid)
    .fetch_optional(ctx.pool)
    .await?;
    let Some((host, metadata, proxy_hostid)) = row else {
        return Ok(false);
    };

    match conditiontype {
        ConditionType::HostName => Ok(string_matches(op, &host, &condition.value)),
        ConditionType::HostMetadata => Ok(string_matches(op, &metadata, &condition.value)),
        ConditionType::ProxyCond => {
            let target: i64 = match condition.value.parse() {
                Ok(v) => v,
                Err(_) => return Ok(false),
            };
            use shared::models::ConditionOperator::*;
            Ok(match op {
                Equal => proxy_hostid == target,
                NotEqual => proxy_hostid != target,
                _ => false,
            })
        }
        other => {
            tracing::error!(
                sentinel = "THIS_SHOULD_NEVER_HAPPEN",
                conditiontype = ?other,
                "conditiontype decoded but not handled for auto-registration source"
            );
            Ok(false)
        }
    }
}
