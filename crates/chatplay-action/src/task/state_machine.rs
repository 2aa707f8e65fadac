//! Task state machine with validated transitions.
//!
//! Running -> Completed | Crashed. Terminal states never change again.

use crate::error::TaskError;
use crate::types::TaskStatus;

/// Validate that a status transition is allowed.
///
/// Valid transitions:
/// - Running -> Completed
/// - Running -> Crashed
pub fn validate_transition(from: TaskStatus, to: TaskStatus) -> Result<(), TaskError> {
    let valid = matches!(
        (from, to),
        (TaskStatus::Running, TaskStatus::Completed) | (TaskStatus::Running, TaskStatus::Crashed)
    );

    if valid {
        Ok(())
    } else {
        Err(TaskError::InvalidTransition(from, to))
    }
}
