//! The presentation layer seen from the dispatch loop: a status sink with an
//! exit signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

/// Consumes status lines; owns the exit signal. Never schedules work.
pub trait Presentation: Send + Sync {
    /// Called once per dispatch iteration.
    fn tick(&self) {}

    fn exit_requested(&self) -> bool;

    /// Show one human-readable status line.
    fn status(&self, line: &str);
}

/// Keeps every status line in memory. Used for tests and headless runs.
#[derive(Debug, Default)]
pub struct StatusLog {
    lines: Mutex<Vec<String>>,
    exit: AtomicBool,
}

impl StatusLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_exit(&self) {
        self.exit.store(true, Ordering::Release);
    }

    /// Snapshot of the lines so far.
    pub fn lines(&self) -> Vec<String> {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn contains(&self, line: &str) -> bool {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|l| l == line)
    }
}

impl Presentation for StatusLog {
    fn exit_requested(&self) -> bool {
        self.exit.load(Ordering::Acquire)
    }

    fn status(&self, line: &str) {
        self.lines
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());
    }
}
