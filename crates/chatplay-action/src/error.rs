//! Error types for the dispatch engine.

use std::path::PathBuf;
use std::time::Duration;

use crate::types::TaskStatus;

/// Errors raised while building the action table. All of them are fatal at
/// startup.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("Alias '{alias}' is used by both '{first}' and '{second}'")]
    DuplicateAlias {
        alias: String,
        first: String,
        second: String,
    },
    #[error("Tag '{0}' is defined more than once")]
    DuplicateTag(String),
    #[error("Command '{tag}' uses unknown action '{kind}'")]
    UnknownAction { tag: String, kind: String },
    #[error("Command '{tag}' has invalid parameters: {reason}")]
    InvalidParams { tag: String, reason: String },
    #[error("Command '{0}' has no aliases")]
    EmptyAliases(String),
    #[error("Command '{tag}' uses action '{kind}', but tag 'random' and action 'random' only go together")]
    ReservedRandom { tag: String, kind: String },
}

/// Why the governor refused to start a task.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("Overloaded: {in_flight} of {limit} tasks already running")]
    Overloaded { in_flight: usize, limit: usize },
    #[error("Too soon: next dispatch allowed in {}ms", .retry_in.as_millis())]
    TooSoon { retry_in: Duration },
}

/// Errors from task submission.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("Worker pool saturated ({pool_size} workers busy)")]
    PoolSaturated { pool_size: usize },
}

/// Errors from task lifecycle management.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("Invalid state transition: {0} -> {1}")]
    InvalidTransition(TaskStatus, TaskStatus),
}

/// Errors from blocklist storage.
#[derive(Debug, thiserror::Error)]
pub enum BlocklistError {
    #[error("Failed to read blocklist {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_error_display() {
        let err = TableError::DuplicateAlias {
            alias: "jump".to_string(),
            first: "hop".to_string(),
            second: "leap".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Alias 'jump' is used by both 'hop' and 'leap'"
        );

        let err = TableError::UnknownAction {
            tag: "fly".to_string(),
            kind: "teleport".to_string(),
        };
        assert_eq!(err.to_string(), "Command 'fly' uses unknown action 'teleport'");

        let err = TableError::EmptyAliases("fly".to_string());
        assert_eq!(err.to_string(), "Command 'fly' has no aliases");

        let err = TableError::ReservedRandom {
            tag: "chaos".to_string(),
            kind: "random".to_string(),
        };
        assert!(err.to_string().starts_with("Command 'chaos' uses action 'random'"));
    }

    #[test]
    fn test_rejection_display() {
        let err = Rejection::Overloaded {
            in_flight: 2,
            limit: 2,
        };
        assert_eq!(err.to_string(), "Overloaded: 2 of 2 tasks already running");

        let err = Rejection::TooSoon {
            retry_in: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "Too soon: next dispatch allowed in 250ms");
    }

    #[test]
    fn test_engine_error_display() {
        let err = EngineError::PoolSaturated { pool_size: 4 };
        assert_eq!(err.to_string(), "Worker pool saturated (4 workers busy)");
    }

    #[test]
    fn test_task_error_display() {
        let err = TaskError::InvalidTransition(TaskStatus::Completed, TaskStatus::Running);
        assert_eq!(err.to_string(), "Invalid state transition: completed -> running");
    }

    #[test]
    fn test_blocklist_error_keeps_source() {
        let err = BlocklistError::Read {
            path: PathBuf::from("/tmp/blocked.txt"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("/tmp/blocked.txt"));
        assert!(std::error::Error::source(&err).is_some());
    }
}
