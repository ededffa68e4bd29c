//! Immediate operations executor.
//!
//! Runs the host-management operations configured directly on an action
//! (host add/remove, enable/disable, group/template membership, inventory
//! mode) against the event's host, without going through the escalator.

use async_trait::async_trait;
use shared::models::{Event, EventObject, OperationRecord, OperationType};
use sqlx::PgPool;

/// The host-management collaborator (the "external operations interface").
/// A real implementation would be a thin wrapper over the configuration
/// cache's host-management RPCs; tests use a recording fake.
#[async_trait]
pub trait HostOperations: Send + Sync {
    async fn host_add(&self, hostid: i64) -> anyhow::Result<()>;
    async fn host_remove(&self, hostid: i64) -> anyhow::Result<()>;
    async fn host_enable(&self, hostid: i64) -> anyhow::Result<()>;
    async fn host_disable(&self, hostid: i64) -> anyhow::Result<()>;
    async fn host_inventory_mode(&self, hostid: i64, mode: i32) -> anyhow::Result<()>;
    async fn groups_add(&self, hostid: i64, groupids: &[i64]) -> anyhow::Result<()>;
    async fn groups_remove(&self, hostid: i64, groupids: &[i64]) -> anyhow::Result<()>;
    async fn templates_add(&self, hostid: i64, templateids: &[i64]) -> anyhow::Result<()>;
    async fn templates_remove(&self, hostid: i64, templateids: &[i64]) -> anyhow::Result<()>;
}

/// Resolve the host id an immediate operation applies to: the discovered
/// host directly, or the host behind a discovered service.
async fn resolve_hostid(pool: &PgPool, event: &Event) -> anyhow::Result<Option<i64>> {
    match event.object {
        EventObject::DHost => Ok(Some(
            sqlx::query_scalar("SELECT hostid FROM dhosts WHERE dhostid = $1")
                .bind(event.objectid)
                .fetch_optional(pool)
                .await?
                .unwrap_or(event.objectid),
        )),
        EventObject::DService | EventObject::AutoRegHost => Ok(sqlx::query_scalar(
            "SELECT hostid FROM dhosts dh JOIN dservices ds ON ds.dhostid = dh.dhostid WHERE ds.dserviceid = $1",
        )
        .bind(event.objectid)
        .fetch_optional(pool)
        .await?),
        _ => Ok(None),
    }
}

/// Execute every configured operation for `actionid` against `event`'s
/// host. Group/template additions and removals across operations of the
/// same kind are batched into one bulk call each, after dedup, mirroring
/// the original's accumulate-then-flush structure.
pub async fn execute_operations(
    pool: &PgPool,
    host_ops: &dyn HostOperations,
    event: &Event,
    operations: &[OperationRecord],
) -> anyhow::Result<()> {
    let Some(hostid) = resolve_hostid(pool, event).await? else {
        tracing::warn!(
            eventid = event.eventid,
            "could not resolve host for immediate operation, skipping"
        );
        return Ok(());
    };

    let mut groups_to_add = Vec::new();
    let mut groups_to_remove = Vec::new();
    let mut templates_to_add = Vec::new();
    let mut templates_to_remove = Vec::new();

    for op in operations {
        match op.operationtype {
            OperationType::HostAdd => host_ops.host_add(hostid).await?,
            OperationType::HostRemove => host_ops.host_remove(hostid).await?,
            OperationType::HostEnable => host_ops.host_enable(hostid).await?,
            OperationType::HostDisable => host_ops.host_disable(hostid).await?,
            OperationType::HostInventoryMode => {
                if let Some(mode) = op.inventory_mode {
                    host_ops.host_inventory_mode(hostid, mode).await?;
                }
            }
            OperationType::GroupAdd => {
                if let Some(groupid) = op.groupid {
                    groups_to_add.push(groupid);
                }
            }
            OperationType::GroupRemove => {
                if let Some(groupid) = op.groupid {
                    groups_to_remove.push(groupid);
                }
            }
            OperationType::TemplateAdd => {
                if let Some(templateid) = op.templateid {
                    templates_to_add.push(templateid);
                }
            }
            OperationType::TemplateRemove => {
                if let Some(templateid) = op.templateid {
                    templates_to_remove.push(templateid);
                }
            }
        }
    }

    dedup_sorted(&mut groups_to_add);
    dedup_sorted(&mut groups_to_remove);
    dedup_sorted(&mut templates_to_add);
    dedup_sorted(&mut templates_to_remove);

    if !groups_to_add.is_empty() {
        host_ops.groups_add(hostid, &groups_to_add).await?;
    }
    if !groups_to_remove.is_empty() {
        host_ops.groups_remove(hostid, &groups_to_remove).await?;
    }
    if !templates_to_add.is_empty() {
        host_ops.templates_add(hostid, &templates_to_add).await?;
    }
    if !templates_to_remove.is_empty() {
        host_ops.templates_remove(hostid, &templates_to_remove).await?;
    }

    Ok(())
}

fn dedup_sorted(ids: &mut Vec<i64>) {
    ids.sort_unstable();
    ids.dedup();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHostOperations {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HostOperations for RecordingHostOperations {
        async fn host_add(&self, hostid: i64) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("host_add({hostid})"));
            Ok(())
        }
        async fn host_remove(&self, hostid: i64) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("host_remove({hostid})"));
            Ok(())
        }
        async fn host_enable(&self, hostid: i64) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("host_enable({hostid})"));
            Ok(())
        }
        async fn host_disable(&self, hostid: i64) -> anyhow::Result<()> {
            self.calls.lock().unwrap().push(format!("host_disable({hostid})"));
            Ok(())
        }
        async fn host_inventory_mode(&self, hostid: i64, mode: i32) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("host_inventory_mode({hostid},{mode})"));
            Ok(())
        }
        async fn groups_add(&self, hostid: i64, groupids: &[i64]) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("groups_add({hostid},{groupids:?})"));
            Ok(())
        }
        async fn groups_remove(&self, hostid: i64, groupids: &[i64]) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("groups_remove({hostid},{groupids:?})"));
            Ok(())
        }
        async fn templates_add(&self, hostid: i64, templateids: &[i64]) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("templates_add({hostid},{templateids:?})"));
            Ok(())
        }
        async fn templates_remove(&self, hostid: i64, templateids: &[i64]) -> anyhow::Result<()> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("templates_remove({hostid},{templateids:?})"));
            Ok(())
        }
    }

    #[test]
    fn dedup_sorted_removes_duplicates_and_sorts() {
        let mut ids = vec![3, 1, 2, 1, 3];
        dedup_sorted(&mut ids);
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
