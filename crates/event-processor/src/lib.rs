//! Event-action evaluation core.
//!
//! Evaluates events against stored conditions and actions, executes
//! immediate operations, and keeps the escalations table in sync.

pub mod action_eval;
pub mod actions_info;
pub mod conditions;
pub mod escalations;
pub mod expression;
pub mod operations;

pub use action_eval::check_action_conditions;
pub use conditions::{check_action_condition, EvalContext, HostGroupCache};
pub use escalations::{is_recovery_event, process_actions};
pub use operations::{execute_operations, HostOperations};
