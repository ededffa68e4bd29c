//! Best-effort advisory lock serializing problem-close operations per
//! trigger, so two task-manager instances (or a task-manager racing an
//! escalator) can't both close the same problem concurrently.
//!
//! Redis `SET key NX PX <ttl>` is the standard non-blocking try-lock
//! pattern: it acquires only if the key is absent, and the `PX` expiry
//! bounds how long a holder that crashes without unlocking can block the
//! trigger.

use crate::error::{WorkerError, WorkerResult};
use async_trait::async_trait;
use redis::AsyncCommands;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TriggerLock: Send + Sync {
    /// Attempt to acquire the lock for `triggerid`. Returns `false`,
    /// without blocking, if another holder already has it.
    async fn try_lock(&self, triggerid: i64) -> WorkerResult<bool>;

    /// Release a previously-acquired lock. A no-op if nothing is held.
    async fn unlock(&self, triggerid: i64) -> WorkerResult<()>;
}

pub struct RedisTriggerLock {
    client: redis::Client,
    ttl_ms: u64,
}

impl RedisTriggerLock {
    pub fn new(client: redis::Client, ttl_ms: u64) -> Self {
        Self { client, ttl_ms }
    }

    fn key(triggerid: i64) -> String {
        format!("zbx:trigger_lock:{triggerid}")
    }
}

#[async_trait]
impl TriggerLock for RedisTriggerLock {
    async fn try_lock(&self, triggerid: i64) -> WorkerResult<bool> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(WorkerError::Redis)?;

        let acquired: Option<String> = redis::cmd("SET")
            .arg(Self::key(triggerid))
            .arg(1)
            .arg("NX")
            .arg("PX")
            .arg(self.ttl_ms)
            .query_async(&mut conn)
            .await
            .map_err(WorkerError::Redis)?;

        Ok(acquired.is_some())
    }

    async fn unlock(&self, triggerid: i64) -> WorkerResult<()> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(WorkerError::Redis)?;
        let _: () = conn.del(Self::key(triggerid)).await.map_err(WorkerError::Redis)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Simulates the contention scenario `tm_try_task_close_problem` relies
    /// on: a second caller's `try_lock` for a trigger another holder has
    /// must come back `false` without blocking, so the task is deferred to
    /// the next poll tick instead of double-closing the problem.
    #[tokio::test]
    async fn second_try_lock_for_held_trigger_defers_instead_of_blocking() {
        let mut lock = MockTriggerLock::new();
        lock.expect_try_lock()
            .withf(|&triggerid| triggerid == 42)
            .times(1)
            .returning(|_| Ok(true));
        lock.expect_try_lock()
            .withf(|&triggerid| triggerid == 42)
            .times(1)
            .returning(|_| Ok(false));

        assert!(lock.try_lock(42).await.unwrap());
        assert!(!lock.try_lock(42).await.unwrap());
    }

    #[tokio::test]
    async fn unlock_allows_a_subsequent_caller_to_acquire() {
        let mut lock = MockTriggerLock::new();
        lock.expect_try_lock().returning(|_| Ok(true));
        lock.expect_unlock().returning(|_| Ok(()));

        assert!(lock.try_lock(42).await.unwrap());
        lock.unlock(42).await.unwrap();
        assert!(lock.try_lock(42).await.unwrap());
    }

    #[tokio::test]
    async fn different_triggers_lock_independently() {
        let mut lock = MockTriggerLock::new();
        lock.expect_try_lock().returning(|_| Ok(true));

        assert!(lock.try_lock(1).await.unwrap());
        assert!(lock.try_lock(2).await.unwrap());
    }
}
