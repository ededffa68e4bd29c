//! Action-level evaluator: combines an action's conditions per its
//! `evaltype` (AND, OR, AND_OR, EXPRESSION) into a single match/no-match
//! verdict.

use crate::conditions::{check_action_condition, EvalContext};
use crate::expression::evaluate_formula;
use shared::models::{ActionEval, EvalType, Event};

/// Evaluate whether `action`'s conditions match `event`.
pub async fn check_action_conditions(
    ctx: &EvalContext<'_>,
    event: &Event,
    action: &ActionEval,
) -> anyhow::Result<bool> {
    match action.evaltype {
        EvalType::And => check_and(ctx, event, action).await,
        EvalType::Or => check_or(ctx, event, action).await,
        EvalType::AndOr => check_and_or(ctx, event, action).await,
        EvalType::Expression => check_expression(ctx, event, action).await,
    }
}

async fn check_and(
    ctx: &EvalContext<'_>,
    event: &Event,
    action: &ActionEval,
) -> anyhow::Result<bool> {
    if action.conditions.is_empty() {
        return Ok(true);
    }
    for condition in &action.conditions {
        if !check_action_condition(ctx, event, condition).await? {
            return Ok(false);
        }
    }
    Ok(true)
}

async fn check_or(
    ctx: &EvalContext<'_>,
    event: &Event,
    action: &ActionEval,
) -> anyhow::Result<bool> {
    if action.conditions.is_empty() {
        return Ok(true);
    }
    for condition in &action.conditions {
        if check_action_condition(ctx, event, condition).await? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// AND between condition-type groups, OR within a group. Requires
/// `action.conditions` sorted ascending by `conditiontype_raw`
/// (precondition documented on `ActionEval`).
async fn check_and_or(
    ctx: &EvalContext<'_>,
    event: &Event,
    action: &ActionEval,
) -> anyhow::Result<bool> {
    if action.conditions.is_empty() {
        return Ok(true);
    }

    debug_assert!(
        action
            .conditions
            .windows(2)
            .all(|w| w[0].conditiontype_raw <= w[1].conditiontype_raw),
        "AND_OR evaluation requires conditions sorted by conditiontype"
    );

    let mut current_type: Option<i16> = None;
    let mut current_group_matched = false;

    for condition in &action.conditions {
        if current_type != Some(condition.conditiontype_raw) {
            // Entering a new group: the previous group (if any) must have
            // matched, or the whole AND_OR fails immediately.
            if current_type.is_some() && !current_group_matched {
                return Ok(false);
            }
            current_type = Some(condition.conditiontype_raw);
            current_group_matched = false;
        }

        if current_group_matched {
            // Already satisfied this OR-group; no need to evaluate more
            // conditions of the same type.
            continue;
        }

        if check_action_condition(ctx, event, condition).await? {
            current_group_matched = true;
        }
    }

    Ok(current_group_matched)
}

async fn check_expression(
    ctx: &EvalContext<'_>,
    event: &Event,
    action: &ActionEval,
) -> anyhow::Result<bool> {
    let mut results = std::collections::HashMap::with_capacity(action.conditions.len());
    for condition in &action.conditions {
        let matched = check_action_condition(ctx, event, condition).await?;
        results.insert(condition.conditionid, matched);
    }
    match evaluate_formula(&action.formula, &results) {
        Ok(value) => Ok(value),
        Err(err) => {
            tracing::warn!(
                actionid = action.actionid,
                formula = %action.formula,
                error = %err,
                "failed to evaluate EXPRESSION formula, treating as no-match"
            );
            Ok(false)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{Condition, EventObject, EventSource};

    fn condition(id: i64, conditiontype_raw: i16) -> Condition {
        Condition {
            conditionid: id,
            actionid: 1,
            conditiontype_raw,
            operator_raw: 0,
            value: String::new(),
            value2: String::new(),
        }
    }

    fn sample_event() -> Event {
        Event {
            eventid: 1,
            source: EventSource::Triggers,
            object: EventObject::Trigger,
            objectid: 1,
            value: 1,
            clock: 0,
            flags: 0,
            acknowledged: false,
            tags: vec![],
            trigger: None,
        }
    }

    #[test]
    fn and_or_groups_sorted_by_conditiontype() {
        let conditions = vec![condition(1, 3), condition(2, 3), condition(3, 4)];
        assert!(conditions
            .windows(2)
            .all(|w| w[0].conditiontype_raw <= w[1].conditiontype_raw));
    }

    #[test]
    fn action_with_no_conditions_is_constructible() {
        let action = ActionEval {
            actionid: 1,
            eventsource: EventSource::Triggers,
            evaltype: EvalType::And,
            formula: String::new(),
            conditions: vec![],
        };
        assert!(action.conditions.is_empty());
        let _ = sample_event();
    }
}
