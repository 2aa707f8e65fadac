//! Command switch toggle handler.

use async_trait::async_trait;

use crate::handler::ChatAction;
use crate::switch::CommandSwitch;
use crate::types::{ErrorOutcome, FailureFlag};

/// Flips the global command switch. Superuser invocations only.
///
/// Runs on a worker, so the write goes through the switch's atomic.
pub struct ToggleCommandsAction {
    switch: CommandSwitch,
}

impl ToggleCommandsAction {
    pub const KIND: &'static str = "toggle_commands";

    pub fn new(switch: CommandSwitch) -> Self {
        Self { switch }
    }
}

#[async_trait]
impl ChatAction for ToggleCommandsAction {
    fn kind(&self) -> &'static str {
        Self::KIND
    }

    async fn run(&self, force: bool) -> ErrorOutcome {
        if !force {
            return ErrorOutcome::failure(FailureFlag::NotPermitted);
        }
        let enabled = self.switch.toggle();
        tracing::info!(enabled, "Chat commands toggled");
        ErrorOutcome::success()
    }

    fn describe(&self) -> String {
        "Toggle chat commands".to_string()
    }
}
