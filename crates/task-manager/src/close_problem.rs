//! The "close problem" collaborator: the one database write the task
//! manager itself is responsible for when a `CLOSE_PROBLEM` task resolves.
//! The rest of a close's side effects (writing `event_recovery`, updating
//! dependent escalations) belong to the escalator and are out of scope
//! here — this only flips the `problem` row and its `events` counterpart.

use async_trait::async_trait;
use sqlx::PgPool;

#[async_trait]
pub trait ProblemCloser: Send + Sync {
    async fn close_problem(&self, triggerid: i64, eventid: i64, userid: i64) -> crate::error::WorkerResult<()>;
}

pub struct DbProblemCloser {
    pool: PgPool,
}

impl DbProblemCloser {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProblemCloser for DbProblemCloser {
    async fn close_problem(&self, triggerid: i64, eventid: i64, userid: i64) -> crate::error::WorkerResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE problem
            SET r_eventid = $1, userid = $2
            WHERE eventid = $1 AND triggerid = $3 AND r_eventid IS NULL
            "#,
        )
        .bind(eventid)
        .bind(userid)
        .bind(triggerid)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE events
            SET value = 0
            WHERE eventid = $1 AND source = 0 AND object = 0
            "#,
        )
        .bind(eventid)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct RecordingProblemCloser {
        pub calls: Mutex<Vec<(i64, i64, i64)>>,
    }

    #[async_trait]
    impl ProblemCloser for RecordingProblemCloser {
        async fn close_problem(&self, triggerid: i64, eventid: i64, userid: i64) -> crate::error::WorkerResult<()> {
            self.calls.lock().unwrap().push((triggerid, eventid, userid));
            Ok(())
        }
    }

    #[tokio::test]
    async fn recording_closer_records_arguments() {
        let closer = RecordingProblemCloser::default();
        closer.close_problem(1, 2, 3).await.unwrap();
        assert_eq!(closer.calls.lock().unwrap().as_slice(), &[(1, 2, 3)]);
    }
}
