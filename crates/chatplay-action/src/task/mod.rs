//! Task lifecycle: one admitted run of one action.

pub mod state_machine;

use std::fmt;

use chatplay_core::Timestamp;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::error::TaskError;
use crate::governor::AdmissionTicket;
use crate::task::state_machine::validate_transition;
use crate::types::{AuthorizationDecision, ErrorOutcome, TaskStatus};

/// A running unit of work. Owns the admission ticket, so the governor slot
/// stays taken until the task is dropped after completion delivery.
#[derive(Debug)]
pub struct Task {
    pub id: Uuid,
    pub tag: String,
    pub owner: String,
    pub channel: String,
    pub elevated: bool,
    pub started_at: Timestamp,
    status: TaskStatus,
    _ticket: AdmissionTicket,
}

impl Task {
    pub fn start(decision: &AuthorizationDecision, ticket: AdmissionTicket) -> Self {
        Self {
            id: Uuid::new_v4(),
            tag: decision.tag.clone(),
            owner: decision.owner.clone(),
            channel: decision.channel.clone(),
            elevated: decision.elevated,
            started_at: Timestamp::now(),
            status: TaskStatus::Running,
            _ticket: ticket,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Move to `to`, rejecting anything but Running -> terminal.
    pub fn transition(&mut self, to: TaskStatus) -> Result<(), TaskError> {
        validate_transition(self.status, to)?;
        self.status = to;
        Ok(())
    }

    /// Freeze the task into its completion record.
    pub fn complete(&self, outcome: ErrorOutcome, fault: Option<String>) -> Completion {
        Completion {
            task_id: self.id,
            tag: self.tag.clone(),
            owner: self.owner.clone(),
            channel: self.channel.clone(),
            elevated: self.elevated,
            started_at: self.started_at,
            finished_at: Timestamp::now(),
            status: self.status,
            outcome,
            fault,
        }
    }
}

/// Everything known about a finished task.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub task_id: Uuid,
    pub tag: String,
    pub owner: String,
    pub channel: String,
    pub elevated: bool,
    pub started_at: Timestamp,
    pub finished_at: Timestamp,
    pub status: TaskStatus,
    pub outcome: ErrorOutcome,
    /// Panic message, when the action crashed.
    pub fault: Option<String>,
}

impl Completion {
    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Completed && self.outcome.is_success()
    }

    /// Line shown to the operator when the task finishes.
    pub fn status_line(&self) -> String {
        if self.is_success() {
            format!("Done '{}' from {}", self.tag, self.owner)
        } else {
            format!("Failed '{}' from {} ({})", self.tag, self.owner, self.outcome)
        }
    }
}

impl fmt::Display for Completion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_line())
    }
}

/// Returned by a successful submit. `wait` resolves once the completion
/// callback has run.
#[derive(Debug)]
pub struct TaskHandle {
    pub id: Uuid,
    pub tag: String,
    pub owner: String,
    pub started_at: Timestamp,
    pub(crate) done: oneshot::Receiver<Completion>,
}

impl TaskHandle {
    /// Wait for the task's completion. `None` if the engine shut down first.
    pub async fn wait(self) -> Option<Completion> {
        self.done.await.ok()
    }
}
