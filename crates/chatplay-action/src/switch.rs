//! Global on/off switch for chat commands.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared flag gating every chat command.
///
/// Read by the resolver on each message and flipped rarely, either by the
/// operator console or by a privileged action running on a worker.
#[derive(Debug, Clone)]
pub struct CommandSwitch {
    enabled: Arc<AtomicBool>,
}

impl CommandSwitch {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: Arc::new(AtomicBool::new(enabled)),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    /// Flip the switch and return the new state.
    pub fn toggle(&self) -> bool {
        !self.enabled.fetch_xor(true, Ordering::AcqRel)
    }
}

impl Default for CommandSwitch {
    fn default() -> Self {
        Self::new(true)
    }
}
