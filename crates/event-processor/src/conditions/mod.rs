//! Condition evaluator: decides whether one stored condition matches one event.
//!
//! Dispatches on `event.source` to the per-source evaluator. Configuration
//! errors (unsupported conditiontype/operator combinations, bad `value`
//! strings) never propagate as `Err` — they are logged and treated as a
//! non-match, so one malformed condition can't abort a batch.

pub mod auto_registration;
pub mod discovery;
pub mod internal;
pub mod trigger;

use async_trait::async_trait;
use shared::models::{Condition, Event, EventSource};
use sqlx::PgPool;

/// The configuration-cache collaborator. The real configuration cache
/// (out of scope here) knows the full host group hierarchy; this is the
/// one query the evaluator needs from it.
#[async_trait]
pub trait HostGroupCache: Send + Sync {
    /// Returns `groupids` plus every subgroup nested under them.
    async fn get_nested_hostgroupids(&self, groupids: &[i64]) -> anyhow::Result<Vec<i64>>;
}

/// A `HostGroupCache` that performs no nested-group expansion, suitable
/// when host groups in use have no nesting (`group/subgroup` naming).
pub struct FlatHostGroupCache;

#[async_trait]
impl HostGroupCache for FlatHostGroupCache {
    async fn get_nested_hostgroupids(&self, groupids: &[i64]) -> anyhow::Result<Vec<i64>> {
        Ok(groupids.to_vec())
    }
}

/// The time-period collaborator (out of scope to design here): given a
/// time-period specification and a unix timestamp, says whether the
/// timestamp falls inside it.
#[async_trait]
pub trait TimePeriodChecker: Send + Sync {
    async fn check_time_period(&self, period_spec: &str, clock: i64) -> anyhow::Result<bool>;
}

/// Always-match implementation, useful when no time restrictions are
/// configured or in tests that don't exercise `TIME_PERIOD`.
pub struct AlwaysInPeriod;

#[async_trait]
impl TimePeriodChecker for AlwaysInPeriod {
    async fn check_time_period(&self, _period_spec: &str, _clock: i64) -> anyhow::Result<bool> {
        Ok(true)
    }
}

/// The macro-substitution collaborator (out of scope to design here):
/// expands `{HOST.NAME}`-style macros in a template string for a given
/// event.
pub trait MacroSubstitutor: Send + Sync {
    fn substitute_simple_macros(&self, template: &str, event: &Event) -> String;
}

/// No-op substitutor: returns the template unchanged. Adequate for
/// trigger names that carry no macros.
pub struct NoopMacroSubstitutor;

impl MacroSubstitutor for NoopMacroSubstitutor {
    fn substitute_simple_macros(&self, template: &str, _event: &Event) -> String {
        template.to_string()
    }
}

/// Shared evaluation context passed down to every condition check.
pub struct EvalContext<'a> {
    pub pool: &'a PgPool,
    pub host_groups: &'a dyn HostGroupCache,
    pub time_periods: &'a dyn TimePeriodChecker,
    pub macros: &'a dyn MacroSubstitutor,
}

/// Check a single condition against a single event.
pub async fn check_action_condition(
    ctx: &EvalContext<'_>,
    event: &Event,
    condition: &Condition,
) -> anyhow::Result<bool> {
    match event.source {
        EventSource::Triggers => trigger::check_trigger_condition(ctx, event, condition).await,
        EventSource::Discovery => discovery::check_discovery_condition(ctx, event, condition).await,
        EventSource::AutoRegistration => {
            auto_registration::check_auto_registration_condition(ctx, event, condition).await
        }
        EventSource::Internal => internal::check_internal_condition(ctx, event, condition).await,
    }
}

/// String comparison semantics shared by every condition type that
/// compares an event-derived string against `condition.value`.
pub(crate) fn string_matches(
    op: shared::models::ConditionOperator,
    haystack: &str,
    needle: &str,
) -> bool {
    use shared::models::ConditionOperator::*;
    match op {
        Equal => haystack == needle,
        NotEqual => haystack != needle,
        Like => needle.is_empty() || haystack.contains(needle),
        NotLike => needle.is_empty() || !haystack.contains(needle),
        MoreEqual => haystack >= needle,
        LessEqual => haystack <= needle,
        In | NotIn => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::ConditionOperator;

    #[test]
    fn like_empty_needle_is_always_true() {
        assert!(string_matches(ConditionOperator::Like, "anything", ""));
    }

    #[test]
    fn not_like_empty_needle_is_always_true() {
        assert!(string_matches(ConditionOperator::NotLike, "anything", ""));
    }

    #[test]
    fn like_is_substring() {
        assert!(string_matches(ConditionOperator::Like, "host01.example.com", "host01"));
        assert!(!string_matches(ConditionOperator::Like, "host02.example.com", "host01"));
    }
}
