//! Core task-dispatch logic: `tm_process_tasks` and its `CLOSE_PROBLEM`
//! collaborator `tm_try_task_close_problem`. Split out from `main.rs` so
//! both can be unit-tested with in-memory `TriggerLock`/`ProblemCloser`
//! fakes instead of a live database.

use crate::close_problem::ProblemCloser;
use crate::error::WorkerResult;
use crate::trigger_lock::TriggerLock;
use shared::models::{TaskCloseProblemJoin, TaskRow, TaskType};
use sqlx::PgPool;

/// Attempt to close the problem a `CLOSE_PROBLEM` task points at.
///
/// Joins `task_close_problem` -> `acknowledges` -> `events`. A missing
/// join (the acknowledge or its event was deleted before this task ran)
/// means the task is stale: it's removed with no further action. Otherwise
/// the source trigger is locked via `trigger_lock` before touching
/// `problem`, so two processes can't race to close the same problem; on
/// lock failure the task is left for the next tick. The lock is always
/// released once the attempt (successful or not) is done.
pub async fn tm_try_task_close_problem(
    pool: &PgPool,
    trigger_lock: &dyn TriggerLock,
    problem_closer: &dyn ProblemCloser,
    taskid: i64,
) -> WorkerResult<bool> {
    let join: Option<TaskCloseProblemJoin> = sqlx::query_as(
        r#"
        SELECT tcp.taskid, tcp.acknowledgeid, e.objectid AS triggerid, a.eventid, a.userid
        FROM task_close_problem tcp
        LEFT JOIN acknowledges a ON a.acknowledgeid = tcp.acknowledgeid
        LEFT JOIN events e ON e.eventid = a.eventid
        WHERE tcp.taskid = $1
        "#,
    )
    .bind(taskid)
    .fetch_optional(pool)
    .await?;

    let Some(join) = join else {
        tracing::warn!(taskid, "task_close_problem row missing, removing task");
        delete_task(pool, taskid).await?;
        return Ok(true);
    };

    let (Some(eventid), Some(userid), Some(triggerid)) = (join.eventid, join.userid, join.triggerid)
    else {
        tracing::debug!(taskid, "related event or acknowledge deleted, removing task");
        delete_task(pool, taskid).await?;
        return Ok(true);
    };

    if !trigger_lock.try_lock(triggerid).await? {
        tracing::debug!(taskid, triggerid, "trigger already locked, deferring task");
        return Ok(false);
    }

    let result = tm_execute_task_close_problem(pool, problem_closer, triggerid, eventid, userid).await;
    trigger_lock.unlock(triggerid).await?;
    result?;

    delete_task(pool, taskid).await?;
    Ok(true)
}

/// Close the problem at `eventid` unless another process already closed
/// it (`problem.r_eventid` no longer `NULL`) while this task waited in
/// the queue.
async fn tm_execute_task_close_problem(
    pool: &PgPool,
    problem_closer: &dyn ProblemCloser,
    triggerid: i64,
    eventid: i64,
    userid: i64,
) -> WorkerResult<()> {
    let still_open: Option<(i64,)> = sqlx::query_as(
        "SELECT eventid FROM problem WHERE eventid = $1 AND r_eventid IS NULL",
    )
    .bind(eventid)
    .fetch_optional(pool)
    .await?;

    if still_open.is_some() {
        problem_closer.close_problem(triggerid, eventid, userid).await?;
    }

    Ok(())
}

async fn delete_task(pool: &PgPool, taskid: i64) -> WorkerResult<()> {
    sqlx::query("DELETE FROM task WHERE taskid = $1")
        .bind(taskid)
        .execute(pool)
        .await?;
    Ok(())
}

/// Process every queued task in `taskid` order, dispatching `CLOSE_PROBLEM`
/// tasks to `tm_try_task_close_problem` and logging-and-skipping anything
/// else (a task type this build doesn't know how to handle should never
/// appear; the original reaches for `THIS_SHOULD_NEVER_HAPPEN` here).
///
/// Returns the count of tasks that were actually processed (executed or
/// found stale and removed) — unlike the original C implementation, which
/// accumulates this into a local `processed_num` but then discards it and
/// unconditionally `return`s 0, a dead-code bug preserved bug-for-bug would
/// make the "processed N task(s)" log line always print 0. This
/// reimplementation returns the real count.
pub async fn tm_process_tasks(
    pool: &PgPool,
    trigger_lock: &dyn TriggerLock,
    problem_closer: &dyn ProblemCloser,
) -> WorkerResult<u32> {
    let tasks: Vec<TaskRow> = sqlx::query_as(
        "SELECT taskid, type AS task_type_raw FROM task ORDER BY taskid",
    )
    .fetch_all(pool)
    .await?;

    let mut processed_num = 0u32;

    for task in tasks {
        let task_type = match task.task_type() {
            Ok(t) => t,
            Err(_) => {
                tracing::error!(
                    taskid = task.taskid,
                    task_type_raw = task.task_type_raw,
                    sentinel = "THIS_SHOULD_NEVER_HAPPEN",
                    "unknown task type"
                );
                continue;
            }
        };

        let processed = match task_type {
            TaskType::CloseProblem => {
                tm_try_task_close_problem(pool, trigger_lock, problem_closer, task.taskid).await?
            }
        };

        if processed {
            processed_num += 1;
        }
    }

    Ok(processed_num)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_type_close_problem_decodes() {
        let row = TaskRow {
            taskid: 1,
            task_type_raw: 1,
        };
        assert_eq!(row.task_type().unwrap(), TaskType::CloseProblem);
    }

    #[test]
    fn task_type_unknown_raw_errors() {
        let row = TaskRow {
            taskid: 1,
            task_type_raw: 99,
        };
        assert!(row.task_type().is_err());
    }
}
