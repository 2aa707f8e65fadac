//! Core types and value objects for the dispatch engine.
//!
//! Defines action outcomes, command entries, authorization decisions and
//! the task lifecycle enumeration.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chatplay_core::Privilege;
use serde::{Deserialize, Serialize};

use crate::handler::ChatAction;

/// Tag granted to bot accounts whose messages match no alias.
pub const RANDOM_TAG: &str = "random";

// =============================================================================
// Outcomes
// =============================================================================

/// One named reason an action did not fully succeed.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureFlag {
    /// The action panicked instead of returning an outcome.
    Panic,
    /// The action requires a superuser invocation.
    NotPermitted,
    /// There was nothing for the action to do.
    NothingToRun,
    /// An external process could not be started.
    SpawnFailed,
    /// An external process exited unsuccessfully.
    ProcessFailed,
    /// The action gave up after its deadline.
    TimedOut,
    /// The task was cancelled by the runtime before finishing.
    Cancelled,
    /// Action-specific failure.
    Custom(String),
}

impl fmt::Display for FailureFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureFlag::Panic => write!(f, "panic"),
            FailureFlag::NotPermitted => write!(f, "not_permitted"),
            FailureFlag::NothingToRun => write!(f, "nothing_to_run"),
            FailureFlag::SpawnFailed => write!(f, "spawn_failed"),
            FailureFlag::ProcessFailed => write!(f, "process_failed"),
            FailureFlag::TimedOut => write!(f, "timed_out"),
            FailureFlag::Cancelled => write!(f, "cancelled"),
            FailureFlag::Custom(name) => write!(f, "{}", name),
        }
    }
}

/// Result of running an action: a set of failure flags. Empty means success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorOutcome {
    flags: BTreeSet<FailureFlag>,
}

impl ErrorOutcome {
    pub fn success() -> Self {
        Self::default()
    }

    pub fn failure(flag: FailureFlag) -> Self {
        Self::success().with(flag)
    }

    pub fn with(mut self, flag: FailureFlag) -> Self {
        self.flags.insert(flag);
        self
    }

    pub fn insert(&mut self, flag: FailureFlag) {
        self.flags.insert(flag);
    }

    /// Merge another outcome's flags into this one.
    pub fn extend(&mut self, other: ErrorOutcome) {
        self.flags.extend(other.flags);
    }

    pub fn is_success(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn contains(&self, flag: &FailureFlag) -> bool {
        self.flags.contains(flag)
    }

    pub fn flags(&self) -> impl Iterator<Item = &FailureFlag> {
        self.flags.iter()
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }
}

impl FromIterator<FailureFlag> for ErrorOutcome {
    fn from_iter<I: IntoIterator<Item = FailureFlag>>(iter: I) -> Self {
        Self {
            flags: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for ErrorOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.flags.is_empty() {
            return write!(f, "ok");
        }
        let names: Vec<String> = self.flags.iter().map(|flag| flag.to_string()).collect();
        write!(f, "{}", names.join(", "))
    }
}

// =============================================================================
// Task lifecycle
// =============================================================================

/// Task lifecycle states. Submission and start are the same step: a task is
/// `Running` from the moment the engine accepts it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Running,
    Completed,
    Crashed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Crashed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Crashed => write!(f, "crashed"),
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(TaskStatus::Running),
            "completed" => Ok(TaskStatus::Completed),
            "crashed" => Ok(TaskStatus::Crashed),
            _ => Err(format!("Unknown task status: {}", s)),
        }
    }
}

// =============================================================================
// Commands and decisions
// =============================================================================

/// One controllable action in the table.
#[derive(Clone)]
pub struct CommandEntry {
    /// Unique key, as configured.
    pub tag: String,
    /// Lowercase trigger strings; the first is the one shown to viewers.
    pub aliases: Vec<String>,
    pub privilege: Privilege,
    /// Handler kind the action was built from.
    pub kind: String,
    pub action: Arc<dyn ChatAction>,
}

impl CommandEntry {
    pub fn canonical_alias(&self) -> &str {
        self.aliases.first().map(String::as_str).unwrap_or(&self.tag)
    }
}

impl fmt::Debug for CommandEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandEntry")
            .field("tag", &self.tag)
            .field("aliases", &self.aliases)
            .field("privilege", &self.privilege)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Permission to run one action for one message.
#[derive(Clone)]
pub struct AuthorizationDecision {
    pub action: Arc<dyn ChatAction>,
    pub tag: String,
    pub elevated: bool,
    /// Sender as received.
    pub owner: String,
    pub channel: String,
}

impl fmt::Debug for AuthorizationDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthorizationDecision")
            .field("tag", &self.tag)
            .field("elevated", &self.elevated)
            .field("owner", &self.owner)
            .field("channel", &self.channel)
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
