//! Data model for events, conditions, actions, operations and escalations.
//!
//! These types mirror the columns of the originating schema (`events`,
//! `conditions`, `actions`, `operations`, `escalations`, `task`,
//! `task_close_problem`) closely enough that `sqlx::FromRow` can decode
//! query results directly into them.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// `events.source`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventSource {
    Triggers,
    Discovery,
    AutoRegistration,
    Internal,
}

impl TryFrom<i16> for EventSource {
    type Error = crate::error::Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Triggers),
            1 => Ok(Self::Discovery),
            2 => Ok(Self::AutoRegistration),
            3 => Ok(Self::Internal),
            other => Err(crate::error::Error::config(format!(
                "unknown event source: {other}"
            ))),
        }
    }
}

impl From<EventSource> for i16 {
    fn from(value: EventSource) -> Self {
        match value {
            EventSource::Triggers => 0,
            EventSource::Discovery => 1,
            EventSource::AutoRegistration => 2,
            EventSource::Internal => 3,
        }
    }
}

/// `events.object`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventObject {
    Trigger,
    DHost,
    DService,
    AutoRegHost,
    Item,
    LldRule,
}

impl TryFrom<i16> for EventObject {
    type Error = crate::error::Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Trigger),
            1 => Ok(Self::DHost),
            2 => Ok(Self::DService),
            3 => Ok(Self::AutoRegHost),
            4 => Ok(Self::Item),
            5 => Ok(Self::LldRule),
            other => Err(crate::error::Error::config(format!(
                "unknown event object: {other}"
            ))),
        }
    }
}

impl From<EventObject> for i16 {
    fn from(value: EventObject) -> Self {
        match value {
            EventObject::Trigger => 0,
            EventObject::DHost => 1,
            EventObject::DService => 2,
            EventObject::AutoRegHost => 3,
            EventObject::Item => 4,
            EventObject::LldRule => 5,
        }
    }
}

/// Bitset values for `events.flags`.
pub mod event_flags {
    /// The event was created and should be evaluated (as opposed to a
    /// synthetic recovery marker with no action side effects).
    pub const CREATE: i32 = 0x01;
    /// Action evaluation is suppressed for this event even though it was
    /// created (e.g. generated during a maintenance window).
    pub const NO_ACTION: i32 = 0x02;
}

/// Trigger value constants relevant to recovery detection.
pub mod trigger_value {
    pub const OK: i32 = 0;
    pub const PROBLEM: i32 = 1;
}

/// Internal-source event value constants.
pub mod internal_state {
    pub const NORMAL: i32 = 0;
    pub const NOT_SUPPORTED: i32 = 1;
}

/// Trigger severity constants, used by `TRIGGER_SEVERITY` conditions.
pub mod trigger_severity {
    pub const NOT_CLASSIFIED: i32 = 0;
    pub const INFORMATION: i32 = 1;
    pub const WARNING: i32 = 2;
    pub const AVERAGE: i32 = 3;
    pub const HIGH: i32 = 4;
    pub const DISASTER: i32 = 5;
}

/// A tag attached to an event, consumed by `EVENT_TAG`/`EVENT_TAG_VALUE`
/// conditions. Loaded separately from the `events` row (`event_tag` table)
/// and attached to `Event::tags` by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct EventTag {
    pub tag: String,
    pub value: String,
}

/// Trigger metadata needed by `TRIGGER_NAME`/`TRIGGER_SEVERITY` conditions,
/// present only when `event.object == Trigger`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTriggerInfo {
    pub description: String,
    pub priority: i32,
}

/// An event as seen by the condition and action evaluators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub eventid: i64,
    pub source: EventSource,
    pub object: EventObject,
    pub objectid: i64,
    pub value: i32,
    pub clock: i64,
    pub flags: i32,
    pub acknowledged: bool,
    pub tags: Vec<EventTag>,
    pub trigger: Option<EventTriggerInfo>,
}

impl Event {
    pub fn has_flag(&self, flag: i32) -> bool {
        self.flags & flag == flag
    }
}

/// A condition type, scoped to the event source it is valid for. Plain
/// enum with no explicit discriminants: the underlying `conditions.type`
/// column reuses small integers across event sources (e.g. `13` means
/// `HOST_TEMPLATE` for internal events but `DVALUE` for discovery events),
/// so decoding is done through the per-source `from_*_source` functions
/// below rather than a single `TryFrom<i16>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConditionType {
    HostGroup,
    Host,
    Trigger,
    TriggerName,
    TriggerSeverity,
    TriggerValue,
    TimePeriod,
    DHostIp,
    DServicePort,
    DServiceType,
    DStatus,
    DUptime,
    DValue,
    HostTemplate,
    EventAcknowledged,
    ApplicationCond,
    Maintenance,
    DRule,
    DCheck,
    ProxyCond,
    DObject,
    HostName,
    EventType,
    HostMetadata,
    EventTagCond,
    EventTagValue,
}

impl ConditionType {
    pub fn from_trigger_source(value: i16) -> Option<Self> {
        match value {
            0 => Some(Self::HostGroup),
            1 => Some(Self::Host),
            2 => Some(Self::Trigger),
            3 => Some(Self::TriggerName),
            4 => Some(Self::TriggerSeverity),
            5 => Some(Self::TriggerValue),
            6 => Some(Self::TimePeriod),
            13 => Some(Self::HostTemplate),
            14 => Some(Self::EventAcknowledged),
            15 => Some(Self::ApplicationCond),
            16 => Some(Self::Maintenance),
            25 => Some(Self::EventTagCond),
            26 => Some(Self::EventTagValue),
            _ => None,
        }
    }

    pub fn from_discovery_source(value: i16) -> Option<Self> {
        match value {
            18 => Some(Self::DRule),
            19 => Some(Self::DCheck),
            21 => Some(Self::DObject),
            20 => Some(Self::ProxyCond),
            13 => Some(Self::DValue),
            7 => Some(Self::DHostIp),
            10 => Some(Self::DServiceType),
            11 => Some(Self::DStatus),
            12 => Some(Self::DUptime),
            9 => Some(Self::DServicePort),
            _ => None,
        }
    }

    pub fn from_auto_registration_source(value: i16) -> Option<Self> {
        match value {
            22 => Some(Self::HostName),
            24 => Some(Self::HostMetadata),
            20 => Some(Self::ProxyCond),
            _ => None,
        }
    }

    pub fn from_internal_source(value: i16) -> Option<Self> {
        match value {
            23 => Some(Self::EventType),
            0 => Some(Self::HostGroup),
            13 => Some(Self::HostTemplate),
            1 => Some(Self::Host),
            15 => Some(Self::ApplicationCond),
            _ => None,
        }
    }

    /// Raw discriminant as stored, scoped to the event source it came
    /// from. Needed because `HostTemplate` and `DValue` share the same
    /// on-the-wire value (`13`) in different sources.
    pub fn discriminant(self) -> i16 {
        match self {
            Self::HostGroup => 0,
            Self::Host => 1,
            Self::Trigger => 2,
            Self::TriggerName => 3,
            Self::TriggerSeverity => 4,
            Self::TriggerValue => 5,
            Self::TimePeriod => 6,
            Self::DHostIp => 7,
            Self::DServicePort => 9,
            Self::DServiceType => 10,
            Self::DStatus => 11,
            Self::DUptime => 12,
            Self::DValue | Self::HostTemplate => 13,
            Self::EventAcknowledged => 14,
            Self::ApplicationCond => 15,
            Self::Maintenance => 16,
            Self::DRule => 18,
            Self::DCheck => 19,
            Self::ProxyCond => 20,
            Self::DObject => 21,
            Self::HostName => 22,
            Self::EventType => 23,
            Self::HostMetadata => 24,
            Self::EventTagCond => 25,
            Self::EventTagValue => 26,
        }
    }
}

/// `conditions.operator`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperator {
    Equal,
    NotEqual,
    Like,
    NotLike,
    In,
    NotIn,
    MoreEqual,
    LessEqual,
}

impl TryFrom<i16> for ConditionOperator {
    type Error = crate::error::Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Equal),
            1 => Ok(Self::NotEqual),
            2 => Ok(Self::Like),
            3 => Ok(Self::NotLike),
            4 => Ok(Self::In),
            5 => Ok(Self::NotIn),
            8 => Ok(Self::MoreEqual),
            9 => Ok(Self::LessEqual),
            other => Err(crate::error::Error::config(format!(
                "unknown condition operator: {other}"
            ))),
        }
    }
}

/// A stored condition row (`conditions` table). `conditiontype`/`operator`
/// are kept as raw `i16`s here; decoding into `ConditionType` happens in
/// the evaluator, which knows the event source to disambiguate against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Condition {
    pub conditionid: i64,
    pub actionid: i64,
    pub conditiontype_raw: i16,
    pub operator_raw: i16,
    pub value: String,
    pub value2: String,
}

impl Condition {
    pub fn operator(&self) -> crate::error::Result<ConditionOperator> {
        ConditionOperator::try_from(self.operator_raw)
    }
}

/// `actions.evaltype`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalType {
    AndOr,
    And,
    Or,
    Expression,
}

impl TryFrom<i16> for EvalType {
    type Error = crate::error::Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::AndOr),
            1 => Ok(Self::And),
            2 => Ok(Self::Or),
            3 => Ok(Self::Expression),
            other => Err(crate::error::Error::config(format!(
                "unknown eval type: {other}"
            ))),
        }
    }
}

/// An action together with the conditions that gate it.
///
/// Precondition: when `evaltype == EvalType::AndOr`, `conditions` must be
/// sorted ascending by `conditiontype_raw` — the AND/OR combinator groups
/// adjacent same-type conditions and relies on this ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionEval {
    pub actionid: i64,
    pub eventsource: EventSource,
    pub evaltype: EvalType,
    pub formula: String,
    pub conditions: Vec<Condition>,
}

/// `operations.operationtype`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    HostAdd,
    HostRemove,
    GroupAdd,
    GroupRemove,
    TemplateAdd,
    TemplateRemove,
    HostEnable,
    HostDisable,
    HostInventoryMode,
}

impl TryFrom<i16> for OperationType {
    type Error = crate::error::Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(Self::HostAdd),
            3 => Ok(Self::HostRemove),
            4 => Ok(Self::GroupAdd),
            5 => Ok(Self::GroupRemove),
            6 => Ok(Self::TemplateAdd),
            7 => Ok(Self::TemplateRemove),
            9 => Ok(Self::HostEnable),
            10 => Ok(Self::HostDisable),
            11 => Ok(Self::HostInventoryMode),
            other => Err(crate::error::Error::config(format!(
                "unknown operation type: {other}"
            ))),
        }
    }
}

/// One row of `operations` (plus whatever `opgroup`/`optemplate`/
/// `opinventory` join supplied), scoped to a single action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationRecord {
    pub operationtype: OperationType,
    pub groupid: Option<i64>,
    pub templateid: Option<i64>,
    pub inventory_mode: Option<i32>,
}

/// A pair of (problem event, recovery event) ids, as passed into
/// `process_actions`'s closed-events argument.
///
/// Precondition: the caller-supplied slice must be sorted ascending by
/// `problem_eventid` — the bookkeeper binary-searches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosedEventPair {
    pub problem_eventid: i64,
    pub recovery_eventid: i64,
}

/// `escalations.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscalationStatus {
    Active,
    Sleep,
    SuperSeded,
}

impl From<EscalationStatus> for i16 {
    fn from(value: EscalationStatus) -> Self {
        match value {
            EscalationStatus::Active => 0,
            EscalationStatus::Sleep => 1,
            EscalationStatus::SuperSeded => 2,
        }
    }
}

/// A row of `escalations`, as read back when reconciling closed events.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct EscalationRow {
    pub escalationid: i64,
    pub actionid: i64,
    pub eventid: i64,
    #[sqlx(default)]
    pub r_eventid: i64,
}

/// `task.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    CloseProblem,
}

impl TryFrom<i16> for TaskType {
    type Error = crate::error::Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::CloseProblem),
            other => Err(crate::error::Error::config(format!(
                "unknown task type: {other}"
            ))),
        }
    }
}

/// A row of `task`, as read by the task manager's polling loop.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskRow {
    pub taskid: i64,
    pub task_type_raw: i16,
}

impl TaskRow {
    pub fn task_type(&self) -> crate::error::Result<TaskType> {
        TaskType::try_from(self.task_type_raw)
    }
}

/// The `task_close_problem` -> `acknowledges` -> `events` join result for a
/// single `CLOSE_PROBLEM` task. `None` fields mean the join's right side
/// (acknowledge or event) is missing, and the task is stale.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TaskCloseProblemJoin {
    pub taskid: i64,
    pub acknowledgeid: i64,
    pub triggerid: Option<i64>,
    pub eventid: Option<i64>,
    pub userid: Option<i64>,
}

/// Recovery-operations flag on a configured action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionRecoveryMode {
    None,
    Operations,
}

impl TryFrom<i16> for ActionRecoveryMode {
    type Error = crate::error::Error;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::None),
            1 => Ok(Self::Operations),
            other => Err(crate::error::Error::config(format!(
                "unknown action recovery mode: {other}"
            ))),
        }
    }
}

/// Action metadata row returned by `actions_info::get_actions_info`.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ActionInfoRow {
    pub actionid: i64,
    pub name: String,
    pub status: i16,
    pub eventsource_raw: i16,
    pub esc_period: String,
    pub recovery_raw: i16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_flags_roundtrip() {
        let flags = event_flags::CREATE | event_flags::NO_ACTION;
        let event = Event {
            eventid: 1,
            source: EventSource::Triggers,
            object: EventObject::Trigger,
            objectid: 10,
            value: trigger_value::PROBLEM,
            clock: 0,
            flags,
            acknowledged: false,
            tags: vec![],
            trigger: None,
        };
        assert!(event.has_flag(event_flags::CREATE));
        assert!(event.has_flag(event_flags::NO_ACTION));
    }

    #[test]
    fn condition_type_discriminant_namespace_overlap() {
        assert_eq!(
            ConditionType::from_discovery_source(13),
            Some(ConditionType::DValue)
        );
        assert_eq!(
            ConditionType::from_internal_source(13),
            Some(ConditionType::HostTemplate)
        );
    }
}
