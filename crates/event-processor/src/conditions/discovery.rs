//! `EVENT_SOURCE_DISCOVERY` condition evaluation.
//!
//! Each check is a small, targeted query keyed on whether the discovered
//! object is a host (`event.object == DHost`) or a service
//! (`event.object == DService`).

use super::EvalContext;
use shared::models::{Condition, ConditionType, Event, EventObject};

pub async fn check_discovery_condition(
    ctx: &EvalContext<'_>,
    event: &Event,
    condition: &Condition,
) -> anyhow::Result<bool> {
    let Some(conditiontype) = ConditionType::from_discovery_source(condition.conditiontype_raw)
    else {
        tracing::error!(
            sentinel = "THIS_SHOULD_NEVER_HAPPEN",
            conditiontype = condition.conditiontype_raw,
            "unsupported conditiontype for discovery-source condition"
        );
        return Ok(false);
    };
    let op = match condition.operator() {
        Ok(op) => op,
        Err(_) => return Ok(false),
    };
    let value = condition.value.as_str();

    match conditiontype {
        ConditionType::DRule => check_eq_i64(ctx, event, value, op, "drule", "dhost.druleid").await,
        ConditionType::DCheck => check_dcheck(ctx, event, value, op).await,
        ConditionType::DObject => check_dobject(event, value, op),
        ConditionType::ProxyCond => check_proxy(ctx, event, value, op).await,
        ConditionType::DValue => check_dvalue(ctx, event, value, op).await,
        ConditionType::DHostIp => check_host_ip(ctx, event, value, op).await,
        ConditionType::DServiceType => check_service_type(ctx, event, value, op).await,
        ConditionType::DStatus => check_status(ctx, event, value, op).await,
        ConditionType::DUptime => check_uptime(ctx, event, value, op).await,
        ConditionType::DServicePort => check_service_port(ctx, event, value, op).await,
        other => {
            tracing::error!(
                sentinel = "THIS_SHOULD_NEVER_HAPPEN",
                conditiontype = ?other,
                "conditiontype decoded but not handled for discovery source"
            );
            Ok(false)
        }
    }
}

async fn check_eq_i64(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
    _table: &str,
    _column: &str,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    let target: i64 = match value.parse() {
        Ok(v) => v,
        Err(_) => return Ok(false),
    };
    let druleid: Option<i64> = match event.object {
        EventObject::DHost => {
            sqlx::query_scalar("SELECT druleid FROM dhosts WHERE dhostid = $1")
                .bind(event.objectid)
                .fetch_optional(ctx.pool)
                .await?
        }
        EventObject::DService => {
            sqlx::query_scalar(
                "SELECT dh.druleid FROM dservices ds JOIN dhosts dh ON dh.dhostid = ds.dhostid WHERE ds.dserviceid = $1",
            )
            .bind(event.objectid)
            .fetch_optional(ctx.pool)
            .await?
        }
        _ => None,
    };
    let Some(druleid) = druleid else { return Ok(false) };
    Ok(match op {
        Equal => druleid == target,
        NotEqual => druleid != target,
        _ => false,
    })
}

async fn check_dcheck(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    if event.object != EventObject::DService {
        return Ok(false);
    }
    let target: i64 = match value.parse() {
        Ok(v) => v,
        Err(_) => return Ok(false),
    };
    let dcheckid: Option<i64> =
        sqlx::query_scalar("SELECT dcheckid FROM dservices WHERE dserviceid = $1")
            .bind(event.objectid)
            .fetch_optional(ctx.pool)
            .await?;
    let Some(dcheckid) = dcheckid else { return Ok(false) };
    Ok(match op {
        Equal => dcheckid == target,
        NotEqual => dcheckid != target,
        _ => false,
    })
}

fn check_dobject(
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    let target: i32 = match value.parse() {
        Ok(v) => v,
        Err(_) => return Ok(false),
    };
    let actual = match event.object {
        EventObject::DHost => 1,
        EventObject::DService => 2,
        _ => return Ok(false),
    };
    Ok(match op {
        Equal => actual == target,
        NotEqual => actual != target,
        _ => false,
    })
}

async fn check_proxy(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    let target: i64 = match value.parse() {
        Ok(v) => v,
        Err(_) => return Ok(false),
    };
    let proxy_hostid: Option<i64> = match event.object {
        EventObject::DHost => {
            sqlx::query_scalar(
                "SELECT dr.proxy_hostid FROM dhosts dh JOIN drules dr ON dr.druleid = dh.druleid WHERE dh.dhostid = $1",
            )
            .bind(event.objectid)
            .fetch_optional(ctx.pool)
            .await?
        }
        EventObject::DService => {
            sqlx::query_scalar(
                r#"
                SELECT dr.proxy_hostid
                FROM dservices ds
                JOIN dhosts dh ON dh.dhostid = ds.dhostid
                JOIN drules dr ON dr.druleid = dh.druleid
                WHERE ds.dserviceid = $1
                "#,
            )
            .bind(event.objectid)
            .fetch_optional(ctx.pool)
            .await?
        }
        _ => None,
    };
    let proxy_hostid = proxy_hostid.unwrap_or(0);
    Ok(match op {
        Equal => proxy_hostid == target,
        NotEqual => proxy_hostid != target,
        _ => false,
    })
}

async fn check_dvalue(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    if event.object != EventObject::DService {
        return Ok(false);
    }
    let stored: Option<String> =
        sqlx::query_scalar("SELECT value FROM dservices WHERE dserviceid = $1")
            .bind(event.objectid)
            .fetch_optional(ctx.pool)
            .await?;
    let Some(stored) = stored else { return Ok(false) };
    Ok(match op {
        Equal => stored == value,
        NotEqual => stored != value,
        Like => value.is_empty() || stored.contains(value),
        NotLike => value.is_empty() || !stored.contains(value),
        _ => false,
    })
}

/// `DHOST_IP`: `condition.value` is a comma-separated list of IPs/ranges,
/// checked against every `dservices.ip` for the discovered host (or the one
/// row for a discovered service) — a `DHost` can have several services each
/// reporting their own address, so any matching row satisfies `EQUAL`.
async fn check_host_ip(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    if !matches!(op, Equal | NotEqual) {
        return Ok(false);
    }

    let ips: Vec<String> = match event.object {
        EventObject::DHost => {
            sqlx::query_scalar("SELECT DISTINCT ip FROM dservices WHERE dhostid = $1")
                .bind(event.objectid)
                .fetch_all(ctx.pool)
                .await?
        }
        EventObject::DService => {
            sqlx::query_scalar("SELECT ip FROM dservices WHERE dserviceid = $1")
                .bind(event.objectid)
                .fetch_all(ctx.pool)
                .await?
        }
        _ => return Ok(false),
    };

    let any_in_list = ips.iter().any(|ip| ip_in_list(value, ip));
    Ok(match op {
        Equal => any_in_list,
        NotEqual => !any_in_list,
        _ => false,
    })
}

/// `DSERVICE_PORT`: only meaningful for a discovered service (the original
/// never queries this for a `DHost` object); `condition.value` is a
/// comma-separated list of ports/ranges.
async fn check_service_port(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    if event.object != EventObject::DService || !matches!(op, Equal | NotEqual) {
        return Ok(false);
    }

    let port: Option<i32> = sqlx::query_scalar("SELECT port FROM dservices WHERE dserviceid = $1")
        .bind(event.objectid)
        .fetch_optional(ctx.pool)
        .await?;
    let Some(port) = port else { return Ok(false) };

    let in_list = int_in_list(value, port);
    Ok(match op {
        Equal => in_list,
        NotEqual => !in_list,
        _ => false,
    })
}

/// Comma-separated list of exact IPs or `a.b.c.start-end` last-octet
/// ranges, as accepted by a `DHOST_IP` condition's `condition.value`.
fn ip_in_list(list: &str, ip: &str) -> bool {
    let Some((ip_prefix, ip_last)) = ip.rsplit_once('.') else {
        return list.split(',').map(str::trim).any(|entry| entry == ip);
    };
    let Ok(ip_last): Result<u8, _> = ip_last.parse() else {
        return list.split(',').map(str::trim).any(|entry| entry == ip);
    };

    list.split(',').map(str::trim).any(|entry| {
        let Some((prefix, range)) = entry.rsplit_once('.') else {
            return entry == ip;
        };
        if prefix != ip_prefix {
            return false;
        }
        match range.split_once('-') {
            Some((start, end)) => match (start.parse::<u8>(), end.parse::<u8>()) {
                (Ok(start), Ok(end)) => (start..=end).contains(&ip_last),
                _ => false,
            },
            None => range.parse::<u8>() == Ok(ip_last),
        }
    })
}

/// Comma-separated list of exact integers or `start-end` ranges, as
/// accepted by a `DSERVICE_PORT` condition's `condition.value`.
fn int_in_list(list: &str, value: i32) -> bool {
    list.split(',').map(str::trim).any(|entry| match entry.split_once('-') {
        Some((start, end)) => match (start.parse::<i32>(), end.parse::<i32>()) {
            (Ok(start), Ok(end)) => (start..=end).contains(&value),
            _ => false,
        },
        None => entry.parse::<i32>() == Ok(value),
    })
}

async fn check_service_type(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    if event.object != EventObject::DService {
        return Ok(false);
    }
    let target: i32 = match value.parse() {
        Ok(v) => v,
        Err(_) => return Ok(false),
    };
    let service_type: Option<i32> = sqlx::query_scalar(
        r#"
        SELECT dc.type FROM dservices ds JOIN dchecks dc ON dc.dcheckid = ds.dcheckid
        WHERE ds.dserviceid = $1
        "#,
    )
    .bind(event.objectid)
    .fetch_optional(ctx.pool)
    .await?;
    let Some(service_type) = service_type else { return Ok(false) };
    Ok(match op {
        Equal => service_type == target,
        NotEqual => service_type != target,
        _ => false,
    })
}

async fn check_status(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    let target: i32 = match value.parse() {
        Ok(v) => v,
        Err(_) => return Ok(false),
    };
    let table = match event.object {
        EventObject::DHost => "dhosts",
        EventObject::DService => "dservices",
        _ => return Ok(false),
    };
    let id_col = match event.object {
        EventObject::DHost => "dhostid",
        _ => "dserviceid",
    };
    let query = format!("SELECT status FROM {table} WHERE {id_col} = $1");
    let status: Option<i32> = sqlx::query_scalar(&query)
        .bind(event.objectid)
        .fetch_optional(ctx.pool)
        .await?;
    let Some(status) = status else { return Ok(false) };
    Ok(match op {
        Equal => status == target,
        NotEqual => status != target,
        _ => false,
    })
}

const DOBJECT_STATUS_UP: i32 = 0;

async fn check_uptime(
    ctx: &EvalContext<'_>,
    event: &Event,
    value: &str,
    op: shared::models::ConditionOperator,
) -> anyhow::Result<bool> {
    use shared::models::ConditionOperator::*;
    let threshold: i64 = match value.parse() {
        Ok(v) => v,
        Err(_) => return Ok(false),
    };
    let table = match event.object {
        EventObject::DHost => "dhosts",
        EventObject::DService => "dservices",
        _ => return Ok(false),
    };
    let id_col = match event.object {
        EventObject::DHost => "dhostid",
        _ => "dserviceid",
    };
    let query = format!("SELECT status, lastup, lastdown FROM {table} WHERE {id_col} = $1");
    let row: Option<(i32, i64, i64)> = sqlx::query_as(&query)
        .bind(event.objectid)
        .fetch_optional(ctx.pool)
        .await?;
    let Some((status, lastup, lastdown)) = row else { return Ok(false) };

    let since = if status == DOBJECT_STATUS_UP { lastup } else { lastdown };
    if since == 0 {
        return Ok(false);
    }
    let uptime = event.clock - since;

    Ok(match op {
        MoreEqual => uptime >= threshold,
        LessEqual => uptime <= threshold,
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ip_in_list_matches_exact_address() {
        assert!(ip_in_list("10.0.0.1,10.0.0.2", "10.0.0.2"));
        assert!(!ip_in_list("10.0.0.1,10.0.0.2", "10.0.0.3"));
    }

    #[test]
    fn ip_in_list_matches_last_octet_range() {
        assert!(ip_in_list("192.168.1.10-20", "192.168.1.15"));
        assert!(!ip_in_list("192.168.1.10-20", "192.168.1.25"));
        assert!(!ip_in_list("192.168.1.10-20", "192.168.2.15"));
    }

    #[test]
    fn int_in_list_matches_exact_and_range() {
        assert!(int_in_list("80,443", 443));
        assert!(!int_in_list("80,443", 8080));
        assert!(int_in_list("1000-2000", 1500));
        assert!(!int_in_list("1000-2000", 2500));
    }
}
